//! End-to-end behaviour of the context assembler over the standard services.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use serde_json::{json, Value};

use shopkit::services::{
    Cache, ConfiguredLocaleResolver, DatabaseManager, FilesystemManager, LogMailer, LogPriority,
    Logger, Mail, Mailer, QueueManager, Session, StaticRequest, TranslationResolver,
};
use shopkit::{
    Config, ContextAssembler, ContextBuilder, ContextError, ContextRequest, ContextResult,
    ServiceFactory, ServiceHub, StandardServiceFactory, StaticConfigProvider, BACKEND, FRONTEND,
};

fn settings(loglevel: i64, cache: &str) -> Value {
    json!({
        "resource": {
            "db": { "adapter": "sqlite", "database": "shop.sqlite" },
            "fs": { "adapter": "Standard", "basedir": "/tmp/shopkit" },
            "mq": { "adapter": "Standard" }
        },
        "madmin": {
            "log": { "manager": { "loglevel": loglevel } },
            "cache": { "manager": { "name": cache } }
        },
        "mshop": {
            "locale": {
                "site": "default",
                "language": "en",
                "currency": "EUR",
                "languages": ["en", "de", "fr"]
            }
        }
    })
}

fn translations() -> Value {
    json!({
        "de": { "client": { "Basket": "Warenkorb" } },
        "fr": { "client": { "Basket": "Panier" } }
    })
}

/// Standard services, counting and optionally failing database construction.
#[derive(Default)]
struct CountingFactory {
    inner: StandardServiceFactory,
    attempts: AtomicUsize,
    db_failures: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingFactory {
    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl ServiceFactory for CountingFactory {
    fn database_manager(&self, config: &Config) -> ContextResult<Arc<dyn DatabaseManager>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        let failing = self
            .db_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ContextError::service_unavailable(
                "database",
                "connection refused",
            ));
        }
        self.inner.database_manager(config)
    }

    fn filesystem_manager(&self, config: &Config) -> ContextResult<Arc<dyn FilesystemManager>> {
        self.inner.filesystem_manager(config)
    }

    fn queue_manager(&self, config: &Config) -> ContextResult<Arc<dyn QueueManager>> {
        self.inner.queue_manager(config)
    }

    fn logger(&self, builder: &ContextBuilder) -> ContextResult<Arc<dyn Logger>> {
        self.inner.logger(builder)
    }

    fn cache(&self, builder: &ContextBuilder) -> ContextResult<Arc<dyn Cache>> {
        self.inner.cache(builder)
    }

    fn mail(&self, mailer: Arc<dyn Mailer>) -> ContextResult<Arc<dyn Mail>> {
        self.inner.mail(mailer)
    }

    fn session(&self) -> ContextResult<Arc<dyn Session>> {
        self.inner.session()
    }
}

struct Fixture {
    provider: Arc<StaticConfigProvider>,
    hub: Arc<ServiceHub>,
    factory: Arc<CountingFactory>,
    assembler: Arc<ContextAssembler>,
}

fn fixture_with(factory: CountingFactory) -> Fixture {
    let provider = Arc::new(
        StaticConfigProvider::new()
            .with_scope(FRONTEND, settings(3, "Standard"))
            .with_scope(BACKEND, settings(7, "None")),
    );
    let hub = Arc::new(
        ServiceHub::builder()
            .config_provider(provider.clone())
            .locale_resolver(Arc::new(ConfiguredLocaleResolver::new()))
            .i18n_resolver(Arc::new(TranslationResolver::new(translations())))
            .mailer(Arc::new(LogMailer))
            .request(Arc::new(StaticRequest::new().with_ip("192.0.2.10")))
            .build()
            .unwrap(),
    );
    let factory = Arc::new(factory);
    let assembler = Arc::new(ContextAssembler::with_factory(hub.clone(), factory.clone()));
    Fixture {
        provider,
        hub,
        factory,
        assembler,
    }
}

fn fixture() -> Fixture {
    fixture_with(CountingFactory::default())
}

#[test]
fn repeated_calls_share_one_context() {
    let f = fixture();

    let first = f.assembler.get(&ContextRequest::new()).unwrap();
    let second = f.assembler.get(&ContextRequest::new()).unwrap();
    let third = f
        .assembler
        .get(&ContextRequest::new().without_locale().scope(BACKEND))
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &third));
    assert_eq!(f.factory.attempts(), 1);
}

#[test]
fn calls_without_locale_share_one_context() {
    let f = fixture();
    let request = ContextRequest::new().without_locale();

    let first = f.assembler.get(&request).unwrap();
    let second = f.assembler.get(&request).unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(second.locale().is_none());
    assert!(second.i18n().is_none());
    assert_eq!(f.factory.attempts(), 1);
}

#[test]
fn configuration_follows_requested_scope() {
    let f = fixture();

    let ctx = f.assembler.get(&ContextRequest::new()).unwrap();
    assert_eq!(ctx.config().scope(), FRONTEND);

    let ctx = f
        .assembler
        .get(&ContextRequest::new().without_locale().scope(BACKEND))
        .unwrap();
    assert_eq!(ctx.config().scope(), BACKEND);

    // Provider updates are picked up on the next call
    f.provider.set_scope(FRONTEND, settings(5, "Standard"));
    let ctx = f.assembler.get(&ContextRequest::new()).unwrap();
    assert_eq!(ctx.config().get_i64("madmin/log/manager/loglevel"), Some(5));
}

#[test]
fn locale_and_i18n_are_resolved_per_call() {
    let f = fixture();

    let ctx = f
        .assembler
        .get(&ContextRequest::new().with_attribute("locale", "de"))
        .unwrap();
    assert_eq!(ctx.locale().unwrap().language_id, "de");
    assert_eq!(ctx.i18n().unwrap().language_id(), "de");
    assert_eq!(ctx.translate("client", "Basket"), "Warenkorb");

    let ctx = f
        .assembler
        .get(
            &ContextRequest::new()
                .with_attribute("locale", "fr")
                .with_attribute("currency", "chf"),
        )
        .unwrap();
    let locale = ctx.locale().unwrap();
    assert_eq!(locale.language_id, "fr");
    assert_eq!(locale.currency_id, "CHF");
    assert_eq!(ctx.translate("client", "Basket"), "Panier");
}

#[test]
fn without_locale_leaves_locale_untouched() {
    let f = fixture();

    let ctx = f.assembler.get(&ContextRequest::new().without_locale()).unwrap();
    assert!(ctx.locale().is_none());
    assert!(ctx.i18n().is_none());

    f.assembler
        .get(&ContextRequest::new().with_attribute("locale", "de"))
        .unwrap();
    let ctx = f.assembler.get(&ContextRequest::new().without_locale()).unwrap();
    assert_eq!(ctx.locale().unwrap().language_id, "de");
}

#[test]
fn failed_construction_is_retried() {
    let f = fixture_with(CountingFactory {
        db_failures: AtomicUsize::new(1),
        ..CountingFactory::default()
    });

    let err = f.assembler.get(&ContextRequest::new()).unwrap_err();
    assert_eq!(
        err,
        ContextError::service_unavailable("database", "connection refused")
    );
    assert!(!f.assembler.is_constructed());

    let ctx = f.assembler.get(&ContextRequest::new()).unwrap();
    assert!(f.assembler.is_constructed());
    assert_eq!(f.factory.attempts(), 2);
    assert_eq!(ctx.database_manager().resource("db").unwrap().adapter, "sqlite");
}

#[test]
fn unknown_scope_fails_before_construction() {
    let f = fixture();

    let err = f
        .assembler
        .get(&ContextRequest::new().scope("checkout"))
        .unwrap_err();
    assert_eq!(err, ContextError::configuration_missing("checkout"));
    assert_eq!(f.factory.attempts(), 0);
    assert!(!f.assembler.is_constructed());
}

#[test]
fn editor_is_captured_at_construction() {
    let f = fixture();

    let ctx = f.assembler.get(&ContextRequest::new()).unwrap();
    assert_eq!(ctx.editor(), "192.0.2.10");

    f.hub
        .set_request(Arc::new(StaticRequest::new().with_ip("192.0.2.99")));
    let ctx = f.assembler.get(&ContextRequest::new()).unwrap();
    assert_eq!(ctx.editor(), "192.0.2.10");
}

#[test]
fn editor_is_empty_without_client_address() {
    let f = fixture();
    f.hub.set_request(Arc::new(StaticRequest::new()));

    let ctx = f.assembler.get(&ContextRequest::new()).unwrap();
    assert_eq!(ctx.editor(), "");
}

#[test]
fn concurrent_first_calls_construct_once() {
    let f = fixture_with(CountingFactory {
        delay: Some(Duration::from_millis(20)),
        ..CountingFactory::default()
    });
    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));

    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let assembler = Arc::clone(&f.assembler);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                assembler.get(&ContextRequest::new()).unwrap()
            })
        })
        .collect();
    let contexts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(f.factory.attempts(), 1);
    assert!(contexts.iter().all(|c| Arc::ptr_eq(c, &contexts[0])));
}

#[test]
fn services_observe_refreshed_configuration() {
    let f = fixture();

    let ctx = f.assembler.get(&ContextRequest::new().without_locale()).unwrap();
    let logger = ctx.logger();
    // Frontend loglevel 3 (err)
    assert!(logger.enabled(LogPriority::Err));
    assert!(!logger.enabled(LogPriority::Debug));

    f.assembler
        .get(&ContextRequest::new().without_locale().scope(BACKEND))
        .unwrap();
    assert!(logger.enabled(LogPriority::Debug));

    // Backend disables caching; the backend is picked at first use
    let cache = ctx.cache();
    assert_eq!(cache.backend(), "none");
    cache.set("product:1", "shirt".into(), None);
    assert!(cache.get("product:1").is_none());
}

#[test]
fn locale_failure_keeps_cached_context() {
    let f = fixture();

    let ctx = f.assembler.get(&ContextRequest::new()).unwrap();

    let err = f
        .assembler
        .get(&ContextRequest::new().with_attribute("locale", "es"))
        .unwrap_err();
    assert!(matches!(err, ContextError::ResolutionFailed { what: "locale", .. }));
    assert!(f.assembler.is_constructed());

    let again = f.assembler.get(&ContextRequest::new()).unwrap();
    assert!(Arc::ptr_eq(&ctx, &again));
    assert_eq!(f.factory.attempts(), 1);
}

#[test]
fn context_services_are_usable() {
    let f = fixture();
    let ctx = f.assembler.get(&ContextRequest::new()).unwrap();

    let fs = ctx.filesystem_manager().get("fs-media").unwrap();
    assert_eq!(fs.path("../images/a.png"), std::path::Path::new("/tmp/shopkit/images/a.png"));

    let queue = ctx.queue_manager().queue("mq", "email").unwrap();
    queue.push("order:1".into());
    assert_eq!(ctx.queue_manager().queue("mq", "email").unwrap().len(), 1);

    ctx.session().set("basket", json!({ "items": 2 }));
    assert_eq!(ctx.session().get("basket"), Some(json!({ "items": 2 })));

    let mail = ctx.mail();
    let message = mail.create_message().to("customer@example.com").subject("Order");
    assert!(mail.send(message).is_ok());
}

#[test]
fn missing_capability_is_reported_by_hub() {
    let err = ServiceHub::builder()
        .locale_resolver(Arc::new(ConfiguredLocaleResolver::new()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ContextError::ServiceUnavailable { service: "config provider", .. }
    ));
}
