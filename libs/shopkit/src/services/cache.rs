//! Cache handed out by the context.
//!
//! `madmin/cache/manager/name` selects the backend: `None` disables caching,
//! anything else keeps entries in process memory.

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::ConfigCell;

/// Config path naming the cache backend ("None" disables caching).
pub const CACHE_NAME_PATH: &str = "madmin/cache/manager/name";

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String, ttl: Option<Duration>);
    fn delete(&self, key: &str);
    fn clear(&self);
    /// Short backend name for diagnostics.
    fn backend(&self) -> &'static str;
}

/// Cache that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl Cache for NoCache {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: String, _ttl: Option<Duration>) {}

    fn delete(&self, _key: &str) {}

    fn clear(&self) {}

    fn backend(&self) -> &'static str {
        "none"
    }
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires: Option<Instant>,
}

/// In-process cache with optional per-entry expiry.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let hit = self.entries.get(key).map(|e| (e.expires, e.value.clone()));
        match hit {
            Some((Some(expires), _)) if expires <= now => {
                self.entries.remove(key);
                None
            }
            Some((_, value)) => Some(value),
            None => None,
        }
    }

    fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        let expires = ttl.map(|d| Instant::now() + d);
        self.entries.insert(key.to_string(), Entry { value, expires });
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// Cache bound to a context's configuration.
///
/// The backend is chosen from the configuration current at first use and
/// kept afterwards.
pub struct CacheProxy {
    config: ConfigCell,
    inner: OnceLock<Arc<dyn Cache>>,
}

impl CacheProxy {
    pub fn new(config: ConfigCell) -> Self {
        Self {
            config,
            inner: OnceLock::new(),
        }
    }

    fn inner(&self) -> &Arc<dyn Cache> {
        self.inner.get_or_init(|| {
            let cfg = self.config.load();
            let name = cfg.get_str(CACHE_NAME_PATH, "Standard");
            tracing::debug!(scope = cfg.scope(), backend = %name, "Creating cache backend");
            if name.eq_ignore_ascii_case("none") {
                Arc::new(NoCache)
            } else {
                Arc::new(MemoryCache::new())
            }
        })
    }
}

impl Cache for CacheProxy {
    fn get(&self, key: &str) -> Option<String> {
        self.inner().get(key)
    }

    fn set(&self, key: &str, value: String, ttl: Option<Duration>) {
        self.inner().set(key, value, ttl)
    }

    fn delete(&self, key: &str) {
        self.inner().delete(key)
    }

    fn clear(&self) {
        self.inner().clear()
    }

    fn backend(&self) -> &'static str {
        self.inner().backend()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use serde_json::json;

    fn cell(name: &str) -> ConfigCell {
        ConfigCell::new(Arc::new(Config::new(
            "frontend",
            json!({ "madmin": { "cache": { "manager": { "name": name } } } }),
        )))
    }

    #[test]
    fn memory_cache_roundtrip_and_expiry() {
        let cache = MemoryCache::new();
        cache.set("product:1", "shirt".into(), None);
        cache.set("product:2", "shoe".into(), Some(Duration::ZERO));

        assert_eq!(cache.get("product:1").as_deref(), Some("shirt"));
        assert!(cache.get("product:2").is_none());

        cache.delete("product:1");
        assert!(cache.get("product:1").is_none());

        cache.set("product:3", "hat".into(), Some(Duration::from_secs(60)));
        cache.clear();
        assert!(cache.get("product:3").is_none());
    }

    #[test]
    fn proxy_picks_backend_lazily() {
        let config = cell("Standard");
        let proxy = CacheProxy::new(config.clone());

        // Switch before first use: the proxy honours the current config
        config.store(Arc::new(Config::new(
            "backend",
            json!({ "madmin": { "cache": { "manager": { "name": "None" } } } }),
        )));

        proxy.set("k", "v".into(), None);
        assert_eq!(proxy.backend(), "none");
        assert!(proxy.get("k").is_none());
    }

    #[test]
    fn proxy_memory_backend() {
        let proxy = CacheProxy::new(cell("Standard"));
        proxy.set("k", "v".into(), None);
        assert_eq!(proxy.backend(), "memory");
        assert_eq!(proxy.get("k").as_deref(), Some("v"));
    }
}
