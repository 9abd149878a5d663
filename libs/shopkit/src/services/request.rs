//! The request being served, as far as context construction needs it.

use std::collections::HashMap;

/// Request attribute holding the client address.
pub const IP_ADDRESS: &str = "ip_address";

/// Read-only view of the request currently being served.
pub trait RequestInfo: Send + Sync {
    fn attribute(&self, name: &str) -> Option<String>;
}

/// Request built from a fixed attribute map.
#[derive(Debug, Clone, Default)]
pub struct StaticRequest {
    attributes: HashMap<String, String>,
}

impl StaticRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_ip(self, ip: impl Into<String>) -> Self {
        self.with_attribute(IP_ADDRESS, ip)
    }
}

impl RequestInfo for StaticRequest {
    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.get(name).cloned()
    }
}
