//! Services a context is assembled from.
//!
//! Each module defines the trait the context depends on plus a standard
//! in-process implementation.

pub mod cache;
pub mod db;
pub mod filesystem;
pub mod i18n;
pub mod locale;
pub mod log;
pub mod mail;
pub mod mqueue;
pub mod request;
pub mod session;

pub use cache::{Cache, CacheProxy, MemoryCache, NoCache};
pub use db::{ConfiguredDbManager, DatabaseManager, DbResource};
pub use filesystem::{FilesystemManager, FsResource, LocalFilesystemManager};
pub use i18n::{I18n, I18nResolver, TranslationResolver};
pub use locale::{ConfiguredLocaleResolver, LocaleItem, LocaleResolver};
pub use log::{LogPriority, Logger, TracingLogger};
pub use mail::{LogMailer, Mail, MailMessage, MailTransport, Mailer};
pub use mqueue::{MemoryQueueManager, Queue, QueueManager};
pub use request::{RequestInfo, StaticRequest, IP_ADDRESS};
pub use session::{MemorySession, Session};
