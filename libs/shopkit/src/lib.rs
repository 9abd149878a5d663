//! # ShopKit - Context Assembly
//!
//! Builds the per-process context an e-commerce core works with: database,
//! filesystem and message-queue managers, logger, cache, mail, session,
//! locale, translations and the editor identity.
//!
//! ## Features
//!
//! - **Lazy**: the context is built on the first `get` and shared afterwards
//! - **Fresh per call**: configuration, locale and i18n are re-resolved on every call
//! - **Typed services**: host capabilities come from a [`ServiceLocator`]
//! - **Replaceable construction**: every build step goes through a [`ServiceFactory`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use shopkit::{
//!     ContextAssembler, ContextRequest, ServiceHub, StaticConfigProvider,
//!     services::{ConfiguredLocaleResolver, LogMailer, LogPriority, TranslationResolver},
//! };
//!
//! let hub = ServiceHub::builder()
//!     .config_provider(Arc::new(StaticConfigProvider::new().with_scope("frontend", settings)))
//!     .locale_resolver(Arc::new(ConfiguredLocaleResolver::new()))
//!     .i18n_resolver(Arc::new(TranslationResolver::new(translations)))
//!     .mailer(Arc::new(LogMailer))
//!     .build()?;
//!
//! let assembler = ContextAssembler::new(Arc::new(hub));
//! let ctx = assembler.get(&ContextRequest::new().with_attribute("locale", "de"))?;
//! ctx.logger().log(LogPriority::Info, "checkout", "order placed");
//! ```

pub mod assembler;
pub mod config;
pub mod context;
pub mod error;
pub mod factory;
pub mod locator;
pub mod services;

pub use assembler::{ContextAssembler, ContextRequest};
pub use config::{Config, ConfigCell, ConfigProvider, StaticConfigProvider, BACKEND, FRONTEND};
pub use context::{Context, ContextBuilder};
pub use error::{ContextError, ContextResult};
pub use factory::{ServiceFactory, StandardServiceFactory};
pub use locator::{ServiceHub, ServiceHubBuilder, ServiceLocator};
