use crate::config::AppConfig;
use arc_swap::ArcSwap;
use std::sync::Arc;

/// Configuration provider trait for scoped shop settings
pub trait ConfigProvider: Send + Sync {
    /// Get the effective settings tree of a scope ("frontend", "backend", ...)
    fn get_scope_config(&self, scope: &str) -> Option<serde_json::Value>;
}

/// ConfigProvider backed by an `AppConfig` that can be swapped at runtime.
///
/// Readers always see a complete config: either the old or the new one.
pub struct AppConfigProvider(ArcSwap<AppConfig>);

impl AppConfigProvider {
    pub fn new(config: AppConfig) -> Self {
        Self(ArcSwap::from_pointee(config))
    }

    /// Snapshot of the current configuration.
    pub fn current(&self) -> Arc<AppConfig> {
        self.0.load_full()
    }

    /// Install a new configuration; subsequent lookups use it.
    pub fn replace(&self, config: AppConfig) {
        tracing::info!(scopes = ?config.scope_names(), "Replacing application configuration");
        self.0.store(Arc::new(config));
    }
}

impl ConfigProvider for AppConfigProvider {
    fn get_scope_config(&self, scope: &str) -> Option<serde_json::Value> {
        self.0.load().scope_settings(scope)
    }
}
