//! Typed access to the host's cross-cutting services.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::ConfigProvider;
use crate::error::{ContextError, ContextResult};
use crate::services::{I18nResolver, LocaleResolver, Mailer, RequestInfo, StaticRequest};

/// Capabilities a context assembler draws from the host.
pub trait ServiceLocator: Send + Sync {
    fn config_provider(&self) -> Arc<dyn ConfigProvider>;
    fn locale_resolver(&self) -> Arc<dyn LocaleResolver>;
    fn i18n_resolver(&self) -> Arc<dyn I18nResolver>;
    /// Mail delivery; hosts without one report `ServiceUnavailable`.
    fn mailer(&self) -> ContextResult<Arc<dyn Mailer>>;
    /// Request currently being served.
    fn request(&self) -> Arc<dyn RequestInfo>;
}

/// Standard `ServiceLocator` holding registered capabilities.
pub struct ServiceHub {
    config_provider: Arc<dyn ConfigProvider>,
    locale_resolver: Arc<dyn LocaleResolver>,
    i18n_resolver: Arc<dyn I18nResolver>,
    mailer: Option<Arc<dyn Mailer>>,
    request: RwLock<Arc<dyn RequestInfo>>,
}

impl ServiceHub {
    pub fn builder() -> ServiceHubBuilder {
        ServiceHubBuilder::default()
    }

    /// Switch to the next request; later lookups see the new one.
    pub fn set_request(&self, request: Arc<dyn RequestInfo>) {
        *self.request.write() = request;
    }
}

impl ServiceLocator for ServiceHub {
    fn config_provider(&self) -> Arc<dyn ConfigProvider> {
        Arc::clone(&self.config_provider)
    }

    fn locale_resolver(&self) -> Arc<dyn LocaleResolver> {
        Arc::clone(&self.locale_resolver)
    }

    fn i18n_resolver(&self) -> Arc<dyn I18nResolver> {
        Arc::clone(&self.i18n_resolver)
    }

    fn mailer(&self) -> ContextResult<Arc<dyn Mailer>> {
        self.mailer
            .clone()
            .ok_or_else(|| ContextError::service_unavailable("mailer", "no mailer registered"))
    }

    fn request(&self) -> Arc<dyn RequestInfo> {
        Arc::clone(&self.request.read())
    }
}

#[derive(Default)]
pub struct ServiceHubBuilder {
    config_provider: Option<Arc<dyn ConfigProvider>>,
    locale_resolver: Option<Arc<dyn LocaleResolver>>,
    i18n_resolver: Option<Arc<dyn I18nResolver>>,
    mailer: Option<Arc<dyn Mailer>>,
    request: Option<Arc<dyn RequestInfo>>,
}

impl ServiceHubBuilder {
    pub fn config_provider(mut self, provider: Arc<dyn ConfigProvider>) -> Self {
        self.config_provider = Some(provider);
        self
    }

    pub fn locale_resolver(mut self, resolver: Arc<dyn LocaleResolver>) -> Self {
        self.locale_resolver = Some(resolver);
        self
    }

    pub fn i18n_resolver(mut self, resolver: Arc<dyn I18nResolver>) -> Self {
        self.i18n_resolver = Some(resolver);
        self
    }

    pub fn mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn request(mut self, request: Arc<dyn RequestInfo>) -> Self {
        self.request = Some(request);
        self
    }

    /// Config provider and both resolvers are required; the request defaults
    /// to one without attributes.
    pub fn build(self) -> ContextResult<ServiceHub> {
        let missing = |what: &'static str| ContextError::service_unavailable(what, "not registered");

        Ok(ServiceHub {
            config_provider: self.config_provider.ok_or_else(|| missing("config provider"))?,
            locale_resolver: self.locale_resolver.ok_or_else(|| missing("locale resolver"))?,
            i18n_resolver: self.i18n_resolver.ok_or_else(|| missing("i18n resolver"))?,
            mailer: self.mailer,
            request: RwLock::new(
                self.request
                    .unwrap_or_else(|| Arc::new(StaticRequest::new())),
            ),
        })
    }
}
