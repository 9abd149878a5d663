//! Scoped configuration objects and the provider that hands them out.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ContextError, ContextResult};

/// Storefront settings scope.
pub const FRONTEND: &str = "frontend";
/// Administration settings scope.
pub const BACKEND: &str = "backend";

/// Settings tree of one scope, addressed by slash-separated paths such as
/// `"resource/db/adapter"`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    scope: String,
    values: Value,
}

impl Config {
    pub fn new(scope: impl Into<String>, values: Value) -> Self {
        Self {
            scope: scope.into(),
            values,
        }
    }

    /// Scope this configuration was resolved for.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn as_value(&self) -> &Value {
        &self.values
    }

    /// Look up a value. Empty path segments are ignored, so `"/a//b"` equals `"a/b"`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        path.split('/')
            .filter(|seg| !seg.is_empty())
            .try_fold(&self.values, |node, seg| node.as_object()?.get(seg))
    }

    /// String value at `path`, or `default` when absent or not a string.
    pub fn get_str(&self, path: &str, default: &str) -> String {
        self.get(path)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    pub fn get_i64(&self, path: &str) -> Option<i64> {
        self.get(path).and_then(Value::as_i64)
    }

    /// Deserialize the subtree at `path`. `Ok(None)` when the path is absent.
    pub fn get_typed<T: DeserializeOwned>(&self, path: &str) -> ContextResult<Option<T>> {
        match self.get(path) {
            None => Ok(None),
            Some(v) => serde_json::from_value(v.clone())
                .map(Some)
                .map_err(|e| ContextError::invalid_config(path, e.to_string())),
        }
    }
}

/// Shared, atomically swappable configuration reference.
///
/// The context and every service bound to it hold clones of the same cell,
/// so a refresh is visible to all of them at once.
#[derive(Clone)]
pub struct ConfigCell(Arc<ArcSwap<Config>>);

impl ConfigCell {
    pub fn new(config: Arc<Config>) -> Self {
        Self(Arc::new(ArcSwap::new(config)))
    }

    pub fn load(&self) -> Arc<Config> {
        self.0.load_full()
    }

    pub fn store(&self, config: Arc<Config>) {
        self.0.store(config);
    }
}

impl std::fmt::Debug for ConfigCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ConfigCell")
            .field(&self.0.load().scope())
            .finish()
    }
}

/// Resolves the configuration of a scope.
///
/// Implementations decide which scopes exist; unknown scopes are reported
/// as [`ContextError::ConfigurationMissing`].
pub trait ConfigProvider: Send + Sync {
    fn get(&self, scope: &str) -> ContextResult<Arc<Config>>;
}

/// In-memory provider with replaceable scopes.
#[derive(Default)]
pub struct StaticConfigProvider {
    scopes: ArcSwap<HashMap<String, Arc<Config>>>,
}

impl StaticConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(self, scope: &str, values: Value) -> Self {
        self.set_scope(scope, values);
        self
    }

    /// Add or replace a scope; later `get` calls return the new tree.
    pub fn set_scope(&self, scope: &str, values: Value) {
        let config = Arc::new(Config::new(scope, values));
        self.scopes.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(scope.to_string(), config.clone());
            next
        });
    }
}

impl ConfigProvider for StaticConfigProvider {
    fn get(&self, scope: &str) -> ContextResult<Arc<Config>> {
        self.scopes
            .load()
            .get(scope)
            .cloned()
            .ok_or_else(|| ContextError::configuration_missing(scope))
    }
}
