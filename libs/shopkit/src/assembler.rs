//! Lazily built, process-wide context.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument};

use crate::config::{Config, FRONTEND};
use crate::context::{Context, ContextBuilder};
use crate::error::ContextResult;
use crate::factory::{ServiceFactory, StandardServiceFactory};
use crate::locator::ServiceLocator;
use crate::services::IP_ADDRESS;

/// Parameters of one [`ContextAssembler::get`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextRequest {
    /// Resolve locale and i18n for this call.
    pub include_locale: bool,
    /// URL attributes handed to the locale resolver.
    pub attributes: HashMap<String, String>,
    pub config_scope: String,
}

impl Default for ContextRequest {
    fn default() -> Self {
        Self {
            include_locale: true,
            attributes: HashMap::new(),
            config_scope: FRONTEND.to_string(),
        }
    }
}

impl ContextRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_locale(mut self) -> Self {
        self.include_locale = false;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_attributes(mut self, attributes: HashMap<String, String>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.config_scope = scope.into();
        self
    }
}

/// Builds the context once and refreshes its per-call parts on every `get`.
///
/// The lock is held while the first context is constructed, so concurrent
/// first calls share a single construction. A failed construction caches
/// nothing and the next call starts over.
pub struct ContextAssembler {
    locator: Arc<dyn ServiceLocator>,
    factory: Arc<dyn ServiceFactory>,
    cached: Mutex<Option<Arc<Context>>>,
}

impl ContextAssembler {
    pub fn new(locator: Arc<dyn ServiceLocator>) -> Self {
        Self::with_factory(locator, Arc::new(StandardServiceFactory::new()))
    }

    pub fn with_factory(locator: Arc<dyn ServiceLocator>, factory: Arc<dyn ServiceFactory>) -> Self {
        Self {
            locator,
            factory,
            cached: Mutex::new(None),
        }
    }

    /// Whether a context has been built yet.
    pub fn is_constructed(&self) -> bool {
        self.cached.lock().is_some()
    }

    /// Return the shared context, building it on first use.
    ///
    /// Every call re-injects the configuration of the requested scope and,
    /// unless disabled, resolves locale and i18n again.
    #[instrument(
        name = "shopkit.assembler.get",
        skip(self, request),
        fields(scope = %request.config_scope, locale = request.include_locale)
    )]
    pub fn get(&self, request: &ContextRequest) -> ContextResult<Arc<Context>> {
        let config = self.locator.config_provider().get(&request.config_scope)?;

        let context = {
            let mut cached = self.cached.lock();
            match cached.as_ref() {
                Some(context) => Arc::clone(context),
                None => {
                    let context = Arc::new(self.construct(Arc::clone(&config))?);
                    *cached = Some(Arc::clone(&context));
                    info!(scope = %request.config_scope, "Context constructed");
                    context
                }
            }
        };

        context.set_config(config);

        if request.include_locale {
            let locale = self
                .locator
                .locale_resolver()
                .resolve(&context, &request.attributes)?;
            let language = locale.language_id.clone();
            context.set_locale(locale);

            let i18n = self.locator.i18n_resolver().resolve(&[language])?;
            context.set_i18n(i18n);
        } else {
            debug!("Locale resolution skipped");
        }

        Ok(context)
    }

    fn construct(&self, config: Arc<Config>) -> ContextResult<Context> {
        let mut builder = ContextBuilder::new(config);

        self.add_database_manager(&mut builder)?;
        self.add_filesystem_manager(&mut builder)?;
        self.add_message_queue_manager(&mut builder)?;
        self.add_logger(&mut builder)?;
        self.add_cache(&mut builder)?;
        self.add_mailer(&mut builder)?;
        self.add_session(&mut builder)?;
        self.add_editor(&mut builder);

        builder.build()
    }

    pub fn add_database_manager(&self, builder: &mut ContextBuilder) -> ContextResult<()> {
        let db = self.factory.database_manager(&builder.config())?;
        builder.set_database_manager(db);
        Ok(())
    }

    pub fn add_filesystem_manager(&self, builder: &mut ContextBuilder) -> ContextResult<()> {
        let fs = self.factory.filesystem_manager(&builder.config())?;
        builder.set_filesystem_manager(fs);
        Ok(())
    }

    pub fn add_message_queue_manager(&self, builder: &mut ContextBuilder) -> ContextResult<()> {
        let mq = self.factory.queue_manager(&builder.config())?;
        builder.set_queue_manager(mq);
        Ok(())
    }

    pub fn add_logger(&self, builder: &mut ContextBuilder) -> ContextResult<()> {
        let logger = self.factory.logger(builder)?;
        builder.set_logger(logger);
        Ok(())
    }

    pub fn add_cache(&self, builder: &mut ContextBuilder) -> ContextResult<()> {
        let cache = self.factory.cache(builder)?;
        builder.set_cache(cache);
        Ok(())
    }

    /// Wrap the host's mailer; fails when the host has none.
    pub fn add_mailer(&self, builder: &mut ContextBuilder) -> ContextResult<()> {
        let mail = self.factory.mail(self.locator.mailer()?)?;
        builder.set_mail(mail);
        Ok(())
    }

    pub fn add_session(&self, builder: &mut ContextBuilder) -> ContextResult<()> {
        let session = self.factory.session()?;
        builder.set_session(session);
        Ok(())
    }

    /// Record the client address of the current request, or nothing if unknown.
    pub fn add_editor(&self, builder: &mut ContextBuilder) {
        let editor = self
            .locator
            .request()
            .attribute(IP_ADDRESS)
            .unwrap_or_default();
        builder.set_editor(editor);
    }
}
