//! Named in-process message queues.

use std::collections::VecDeque;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{ContextError, ContextResult};

const SERVICE: &str = "message queue";

/// A named FIFO of string messages.
pub trait Queue: Send + Sync {
    fn push(&self, message: String);
    fn pop(&self) -> Option<String>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait QueueManager: Send + Sync {
    /// Queue `name` of message-queue resource `resource` ("mq", "mq-email", ...).
    fn queue(&self, resource: &str, name: &str) -> ContextResult<Arc<dyn Queue>>;
}

#[derive(Debug, Default)]
pub struct MemoryQueue {
    messages: Mutex<VecDeque<String>>,
}

impl Queue for MemoryQueue {
    fn push(&self, message: String) {
        self.messages.lock().push_back(message);
    }

    fn pop(&self) -> Option<String> {
        self.messages.lock().pop_front()
    }

    fn len(&self) -> usize {
        self.messages.lock().len()
    }
}

/// In-process queues, created on first access and shared afterwards.
#[derive(Default)]
pub struct MemoryQueueManager {
    queues: DashMap<(String, String), Arc<MemoryQueue>>,
}

impl MemoryQueueManager {
    /// Accepts `resource/mq/adapter` values "Standard" and "memory" (the default).
    pub fn from_config(cfg: &Config) -> ContextResult<Self> {
        let adapter = cfg.get_str("resource/mq/adapter", "Standard");
        if !matches!(adapter.to_ascii_lowercase().as_str(), "standard" | "memory") {
            return Err(ContextError::service_unavailable(
                SERVICE,
                format!("unsupported adapter '{adapter}'"),
            ));
        }
        Ok(Self::default())
    }
}

impl QueueManager for MemoryQueueManager {
    fn queue(&self, resource: &str, name: &str) -> ContextResult<Arc<dyn Queue>> {
        if name.is_empty() {
            return Err(ContextError::service_unavailable(SERVICE, "queue name must not be empty"));
        }
        let queue: Arc<dyn Queue> = self
            .queues
            .entry((resource.to_string(), name.to_string()))
            .or_default()
            .clone();
        Ok(queue)
    }
}
