//! Construction of the services a context is assembled from.

use std::sync::Arc;

use crate::config::Config;
use crate::context::ContextBuilder;
use crate::error::ContextResult;
use crate::services::{
    Cache, CacheProxy, ConfiguredDbManager, DatabaseManager, FilesystemManager,
    LocalFilesystemManager, Logger, Mail, MailTransport, Mailer, MemoryQueueManager,
    MemorySession, QueueManager, Session, TracingLogger,
};

/// One method per construction step of a context.
///
/// Hosts replace individual services by implementing this trait; the
/// assembler decides the order in which the methods run.
pub trait ServiceFactory: Send + Sync {
    fn database_manager(&self, config: &Config) -> ContextResult<Arc<dyn DatabaseManager>>;

    fn filesystem_manager(&self, config: &Config) -> ContextResult<Arc<dyn FilesystemManager>>;

    fn queue_manager(&self, config: &Config) -> ContextResult<Arc<dyn QueueManager>>;

    /// Logger bound to the configuration cell of the context being built.
    fn logger(&self, builder: &ContextBuilder) -> ContextResult<Arc<dyn Logger>>;

    /// Cache bound to the configuration cell of the context being built.
    fn cache(&self, builder: &ContextBuilder) -> ContextResult<Arc<dyn Cache>>;

    fn mail(&self, mailer: Arc<dyn Mailer>) -> ContextResult<Arc<dyn Mail>>;

    fn session(&self) -> ContextResult<Arc<dyn Session>>;
}

/// Builds the in-process services of [`crate::services`].
#[derive(Debug, Default, Clone)]
pub struct StandardServiceFactory {
    sender: Option<String>,
}

impl StandardServiceFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default sender address for outgoing mail.
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }
}

impl ServiceFactory for StandardServiceFactory {
    fn database_manager(&self, config: &Config) -> ContextResult<Arc<dyn DatabaseManager>> {
        Ok(Arc::new(ConfiguredDbManager::from_config(config)?))
    }

    fn filesystem_manager(&self, config: &Config) -> ContextResult<Arc<dyn FilesystemManager>> {
        Ok(Arc::new(LocalFilesystemManager::from_config(config)?))
    }

    fn queue_manager(&self, config: &Config) -> ContextResult<Arc<dyn QueueManager>> {
        Ok(Arc::new(MemoryQueueManager::from_config(config)?))
    }

    fn logger(&self, builder: &ContextBuilder) -> ContextResult<Arc<dyn Logger>> {
        Ok(Arc::new(TracingLogger::new(builder.config_cell().clone())))
    }

    fn cache(&self, builder: &ContextBuilder) -> ContextResult<Arc<dyn Cache>> {
        Ok(Arc::new(CacheProxy::new(builder.config_cell().clone())))
    }

    fn mail(&self, mailer: Arc<dyn Mailer>) -> ContextResult<Arc<dyn Mail>> {
        let transport = match &self.sender {
            Some(sender) => MailTransport::new(mailer).with_sender(sender.clone()),
            None => MailTransport::new(mailer),
        };
        Ok(Arc::new(transport))
    }

    fn session(&self) -> ContextResult<Arc<dyn Session>> {
        Ok(Arc::new(MemorySession::new()))
    }
}
