//! Visitor session storage.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value;

/// Per-visitor key/value storage.
pub trait Session: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value);
    fn remove(&self, key: &str) -> Option<Value>;
}

/// Default in-process session.
#[derive(Debug, Default)]
pub struct MemorySession {
    values: RwLock<HashMap<String, Value>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Session for MemorySession {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) {
        self.values.write().insert(key.to_string(), value);
    }

    fn remove(&self, key: &str) -> Option<Value> {
        self.values.write().remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_get_remove() {
        let session = MemorySession::new();
        assert!(session.get("basket").is_none());

        session.set("basket", json!({ "items": 2 }));
        assert_eq!(session.get("basket"), Some(json!({ "items": 2 })));

        session.set("basket", json!({ "items": 3 }));
        assert_eq!(session.remove("basket"), Some(json!({ "items": 3 })));
        assert!(session.get("basket").is_none());
    }
}
