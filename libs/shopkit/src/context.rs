//! The context aggregate handed to request-handling code.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use parking_lot::RwLock;

use crate::config::{Config, ConfigCell};
use crate::error::{ContextError, ContextResult};
use crate::services::{
    Cache, DatabaseManager, FilesystemManager, I18n, LocaleItem, Logger, Mail, QueueManager,
    Session,
};

/// Bundle of per-scope services.
///
/// Service slots are fixed at construction. Configuration, locale and i18n
/// can be replaced on a shared context; each replacement is atomic on its own.
pub struct Context {
    config: ConfigCell,
    database: Arc<dyn DatabaseManager>,
    filesystem: Arc<dyn FilesystemManager>,
    queue: Arc<dyn QueueManager>,
    logger: Arc<dyn Logger>,
    cache: Arc<dyn Cache>,
    mail: Arc<dyn Mail>,
    session: Arc<dyn Session>,
    editor: String,
    locale: ArcSwapOption<LocaleItem>,
    i18n: RwLock<Option<Arc<dyn I18n>>>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("scope", &self.config.load().scope())
            .field("editor", &self.editor)
            .field("locale", &self.locale.load_full())
            .field("has_i18n", &self.i18n.read().is_some())
            .finish()
    }
}

impl Context {
    pub fn config(&self) -> Arc<Config> {
        self.config.load()
    }

    /// Cell shared with services bound to this context's configuration.
    pub fn config_cell(&self) -> &ConfigCell {
        &self.config
    }

    pub fn set_config(&self, config: Arc<Config>) {
        self.config.store(config);
    }

    pub fn database_manager(&self) -> Arc<dyn DatabaseManager> {
        Arc::clone(&self.database)
    }

    pub fn filesystem_manager(&self) -> Arc<dyn FilesystemManager> {
        Arc::clone(&self.filesystem)
    }

    pub fn queue_manager(&self) -> Arc<dyn QueueManager> {
        Arc::clone(&self.queue)
    }

    pub fn logger(&self) -> Arc<dyn Logger> {
        Arc::clone(&self.logger)
    }

    pub fn cache(&self) -> Arc<dyn Cache> {
        Arc::clone(&self.cache)
    }

    pub fn mail(&self) -> Arc<dyn Mail> {
        Arc::clone(&self.mail)
    }

    pub fn session(&self) -> Arc<dyn Session> {
        Arc::clone(&self.session)
    }

    /// Identity recorded in audit fields of changed data.
    pub fn editor(&self) -> &str {
        &self.editor
    }

    pub fn locale(&self) -> Option<Arc<LocaleItem>> {
        self.locale.load_full()
    }

    pub fn set_locale(&self, locale: LocaleItem) {
        self.locale.store(Some(Arc::new(locale)));
    }

    pub fn i18n(&self) -> Option<Arc<dyn I18n>> {
        self.i18n.read().clone()
    }

    pub fn set_i18n(&self, i18n: Arc<dyn I18n>) {
        *self.i18n.write() = Some(i18n);
    }

    /// Translate with the current i18n handle, or return `text` if none is set.
    pub fn translate(&self, domain: &str, text: &str) -> String {
        match self.i18n.read().as_ref() {
            Some(i18n) => i18n.dt(domain, text),
            None => text.to_string(),
        }
    }
}

/// Collects the services of a context under construction.
///
/// The configuration is available from the start so later steps can read it
/// or bind to its cell.
pub struct ContextBuilder {
    config: ConfigCell,
    database: Option<Arc<dyn DatabaseManager>>,
    filesystem: Option<Arc<dyn FilesystemManager>>,
    queue: Option<Arc<dyn QueueManager>>,
    logger: Option<Arc<dyn Logger>>,
    cache: Option<Arc<dyn Cache>>,
    mail: Option<Arc<dyn Mail>>,
    session: Option<Arc<dyn Session>>,
    editor: String,
}

impl ContextBuilder {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config: ConfigCell::new(config),
            database: None,
            filesystem: None,
            queue: None,
            logger: None,
            cache: None,
            mail: None,
            session: None,
            editor: String::new(),
        }
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.load()
    }

    pub fn config_cell(&self) -> &ConfigCell {
        &self.config
    }

    pub fn set_config(&mut self, config: Arc<Config>) {
        self.config.store(config);
    }

    pub fn set_database_manager(&mut self, db: Arc<dyn DatabaseManager>) {
        self.database = Some(db);
    }

    pub fn set_filesystem_manager(&mut self, fs: Arc<dyn FilesystemManager>) {
        self.filesystem = Some(fs);
    }

    pub fn set_queue_manager(&mut self, mq: Arc<dyn QueueManager>) {
        self.queue = Some(mq);
    }

    pub fn set_logger(&mut self, logger: Arc<dyn Logger>) {
        self.logger = Some(logger);
    }

    pub fn set_cache(&mut self, cache: Arc<dyn Cache>) {
        self.cache = Some(cache);
    }

    pub fn set_mail(&mut self, mail: Arc<dyn Mail>) {
        self.mail = Some(mail);
    }

    pub fn set_session(&mut self, session: Arc<dyn Session>) {
        self.session = Some(session);
    }

    pub fn set_editor(&mut self, editor: impl Into<String>) {
        self.editor = editor.into();
    }

    /// Finish construction; fails naming the first slot that was never filled.
    pub fn build(self) -> ContextResult<Context> {
        fn slot<T: ?Sized>(v: Option<Arc<T>>, name: &'static str) -> ContextResult<Arc<T>> {
            v.ok_or_else(|| ContextError::service_unavailable(name, "not attached to context"))
        }

        Ok(Context {
            database: slot(self.database, "database")?,
            filesystem: slot(self.filesystem, "filesystem")?,
            queue: slot(self.queue, "message queue")?,
            logger: slot(self.logger, "logger")?,
            cache: slot(self.cache, "cache")?,
            mail: slot(self.mail, "mail")?,
            session: slot(self.session, "session")?,
            config: self.config,
            editor: self.editor,
            locale: ArcSwapOption::empty(),
            i18n: RwLock::new(None),
        })
    }
}
