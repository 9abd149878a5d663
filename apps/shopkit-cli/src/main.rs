use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use serde::Serialize;
use serde_json::Value;
use shopkit::services::{
    ConfiguredLocaleResolver, LocaleItem, LogMailer, StaticRequest, TranslationResolver,
};
use shopkit::{
    Config, ConfigProvider, ContextAssembler, ContextError, ContextRequest, ContextResult,
    ServiceFactory, ServiceHub, StandardServiceFactory,
};
use shopkit_bootstrap::{AppConfig, AppConfigProvider, CliArgs, ConfigProvider as _};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Adapter to make `AppConfigProvider` implement `shopkit::ConfigProvider`.
struct ShopConfigAdapter(Arc<AppConfigProvider>);

impl ConfigProvider for ShopConfigAdapter {
    fn get(&self, scope: &str) -> ContextResult<Arc<Config>> {
        let mut settings = self
            .0
            .get_scope_config(scope)
            .ok_or_else(|| ContextError::configuration_missing(scope))?;
        anchor_relative_paths(&mut settings, &self.0.current().home_dir());
        Ok(Arc::new(Config::new(scope, settings)))
    }
}

/// Resolve relative resource paths against the home directory: `basedir` of
/// `resource/fs*` and the `database` file of SQLite `resource/db*` entries.
fn anchor_relative_paths(settings: &mut Value, home: &Path) {
    let Some(resources) = settings.get_mut("resource").and_then(Value::as_object_mut) else {
        return;
    };
    for (name, resource) in resources.iter_mut() {
        let key = if name == "fs" || name.starts_with("fs-") {
            "basedir"
        } else if (name == "db" || name.starts_with("db-")) && is_sqlite(resource) {
            "database"
        } else {
            continue;
        };
        if let Some(Value::String(path)) = resource.get_mut(key) {
            if !path.is_empty() && path != ":memory:" && Path::new(path.as_str()).is_relative() {
                *path = home.join(path.as_str()).to_string_lossy().into_owned();
            }
        }
    }
}

fn is_sqlite(resource: &Value) -> bool {
    resource
        .get("adapter")
        .and_then(Value::as_str)
        .is_some_and(|a| a.eq_ignore_ascii_case("sqlite"))
}

/// ShopKit - assemble and inspect shop contexts
#[derive(Parser)]
#[command(name = "shopkit")]
#[command(about = "ShopKit - assemble and inspect shop contexts")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print effective configuration (YAML) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate configuration and exit
    Check,
    /// Assemble a context and print a JSON summary
    Context {
        /// Configuration scope
        #[arg(long, default_value = shopkit::FRONTEND)]
        scope: String,

        /// Skip locale and translation resolution
        #[arg(long)]
        no_locale: bool,

        /// URL attribute used for locale resolution (key=value, repeatable)
        #[arg(long = "attr", value_parser = parse_attr)]
        attrs: Vec<(String, String)>,

        /// Client address recorded as editor
        #[arg(long)]
        ip: Option<String>,
    },
}

fn parse_attr(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty attribute name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let args = CliArgs {
        verbose: cli.verbose,
    };

    // Layered config:
    // 1) defaults -> 2) YAML (if provided) -> 3) env (SHOPKIT__*) -> 4) CLI overrides
    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;
    config.apply_cli_overrides(&args);

    let logging_config = config.logging.as_ref().cloned().unwrap_or_default();
    shopkit_bootstrap::init_logging(&logging_config, &config.home_dir());

    tracing::info!(home_dir = %config.server.home_dir, "ShopKit starting");

    if cli.print_config {
        println!("{}", config.to_yaml()?);
        return Ok(());
    }

    match cli.command.unwrap_or(Commands::Check) {
        Commands::Check => check_config(&config),
        Commands::Context {
            scope,
            no_locale,
            attrs,
            ip,
        } => {
            let mut request = ContextRequest::new()
                .scope(scope)
                .with_attributes(attrs.into_iter().collect());
            if no_locale {
                request = request.without_locale();
            }
            let provider = Arc::new(AppConfigProvider::new(config));
            let summary = assemble(provider, &request, ip)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

/// Build the configuration-driven services of every scope once.
fn check_config(config: &AppConfig) -> Result<()> {
    tracing::info!("Checking configuration…");

    let adapter = ShopConfigAdapter(Arc::new(AppConfigProvider::new(config.clone())));
    let factory = StandardServiceFactory::new();
    for scope in config.scope_names() {
        let cfg = adapter.get(&scope)?;
        factory
            .database_manager(&cfg)
            .and_then(|_| factory.filesystem_manager(&cfg))
            .and_then(|_| factory.queue_manager(&cfg))
            .with_context(|| format!("Invalid settings in scope '{scope}'"))?;
        tracing::debug!(scope = %scope, "Scope settings are valid");
    }

    println!("Configuration is valid");
    println!("{}", config.to_yaml()?);
    Ok(())
}

#[derive(Debug, Serialize)]
struct ContextSummary {
    scope: String,
    editor: String,
    locale: Option<LocaleItem>,
    databases: BTreeMap<String, String>,
    filesystems: BTreeMap<String, PathBuf>,
    cache_backend: &'static str,
}

fn assemble(
    provider: Arc<AppConfigProvider>,
    request: &ContextRequest,
    ip: Option<String>,
) -> Result<ContextSummary> {
    let adapter = Arc::new(ShopConfigAdapter(provider));
    let scope_config = adapter.get(&request.config_scope)?;

    let client = match ip {
        Some(ip) => StaticRequest::new().with_ip(ip),
        None => StaticRequest::new(),
    };
    let hub = ServiceHub::builder()
        .config_provider(adapter)
        .locale_resolver(Arc::new(ConfiguredLocaleResolver::new()))
        .i18n_resolver(Arc::new(TranslationResolver::from_config(&scope_config)))
        .mailer(Arc::new(LogMailer))
        .request(Arc::new(client))
        .build()?;

    let assembler = ContextAssembler::new(Arc::new(hub));
    let ctx = assembler
        .get(request)
        .context("Failed to assemble context")?;

    let db = ctx.database_manager();
    let databases: BTreeMap<String, String> = db
        .resource_names()
        .into_iter()
        .map(|name| -> ContextResult<(String, String)> {
            let dsn = db.resource(&name)?.redacted_dsn();
            Ok((name, dsn))
        })
        .collect::<ContextResult<_>>()?;

    let fs = ctx.filesystem_manager();
    let filesystems: BTreeMap<String, PathBuf> = fs
        .resource_names()
        .into_iter()
        .map(|name| -> ContextResult<(String, PathBuf)> {
            let basedir = fs.get(&name)?.basedir;
            Ok((name, basedir))
        })
        .collect::<ContextResult<_>>()?;

    Ok(ContextSummary {
        scope: ctx.config().scope().to_string(),
        editor: ctx.editor().to_string(),
        locale: ctx.locale().map(|l| LocaleItem::clone(&l)),
        databases,
        filesystems,
        cache_backend: ctx.cache().backend(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(yaml: &str) -> (tempfile::TempDir, Arc<AppConfigProvider>) {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        let path = dir.path().join("shopkit.yaml");
        std::fs::write(
            &path,
            format!("server:\n  home_dir: \"{}\"\n{yaml}", home.display()),
        )
        .unwrap();
        let config = AppConfig::load_layered(&path).unwrap();
        (dir, Arc::new(AppConfigProvider::new(config)))
    }

    #[test]
    fn attributes_parse_as_key_value() {
        assert_eq!(
            parse_attr("locale=de").unwrap(),
            ("locale".to_string(), "de".to_string())
        );
        assert_eq!(parse_attr("site=").unwrap().1, "");
        assert!(parse_attr("locale").is_err());
        assert!(parse_attr("=de").is_err());
    }

    #[test]
    fn adapter_serves_merged_scopes() {
        let (dir, provider) = load(
            "shop:\n  scopes:\n    checkout:\n      mshop:\n        locale:\n          language: de\n",
        );
        let adapter = ShopConfigAdapter(provider);

        let cfg = adapter.get("checkout").unwrap();
        assert_eq!(cfg.scope(), "checkout");
        assert_eq!(cfg.get_str("mshop/locale/language", ""), "de");
        assert_eq!(cfg.get_str("mshop/locale/currency", ""), "EUR");
        assert_eq!(
            PathBuf::from(cfg.get_str("resource/fs/basedir", "")),
            dir.path().join("home").join("files")
        );
        assert_eq!(
            PathBuf::from(cfg.get_str("resource/db/database", "")),
            dir.path().join("home").join("shop.sqlite")
        );

        assert_eq!(
            adapter.get("missing").unwrap_err(),
            ContextError::configuration_missing("missing")
        );
    }

    #[test]
    fn only_relative_file_paths_are_anchored() {
        let (dir, provider) = load(concat!(
            "shop:\n",
            "  common:\n",
            "    resource:\n",
            "      db-archive: { adapter: SQLite, database: archive.sqlite }\n",
            "      db-cache: { adapter: sqlite, database: \":memory:\" }\n",
            "      db-fixed: { adapter: sqlite, database: /var/lib/shop/fixed.sqlite }\n",
            "      db-orders: { adapter: mysql, host: db.internal, database: orders }\n",
            "      fs-media: { adapter: Standard, basedir: /srv/media }\n",
        ));
        let cfg = ShopConfigAdapter(provider).get("frontend").unwrap();
        let home = dir.path().join("home");

        assert_eq!(
            PathBuf::from(cfg.get_str("resource/db-archive/database", "")),
            home.join("archive.sqlite")
        );
        assert_eq!(cfg.get_str("resource/db-cache/database", ""), ":memory:");
        assert_eq!(
            cfg.get_str("resource/db-fixed/database", ""),
            "/var/lib/shop/fixed.sqlite"
        );
        assert_eq!(cfg.get_str("resource/db-orders/database", ""), "orders");
        assert_eq!(cfg.get_str("resource/fs-media/basedir", ""), "/srv/media");
    }

    #[test]
    fn assembled_summary() {
        let (dir, provider) = load("");
        let request = ContextRequest::new()
            .scope("backend")
            .with_attribute("locale", "de");

        let summary = assemble(provider, &request, Some("192.0.2.7".to_string())).unwrap();
        assert_eq!(summary.scope, "backend");
        assert_eq!(summary.editor, "192.0.2.7");
        assert_eq!(summary.locale.unwrap().language_id, "de");
        assert_eq!(
            summary.databases["db"],
            format!("sqlite://{}", dir.path().join("home").join("shop.sqlite").display())
        );
        assert_eq!(summary.cache_backend, "none");
    }
}
