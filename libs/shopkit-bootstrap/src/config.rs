use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::paths::home_dir::resolve_home_dir;

/// Scope names every default configuration knows about.
pub const FRONTEND_SCOPE: &str = "frontend";
pub const BACKEND_SCOPE: &str = "backend";

/// Main application configuration: typed process sections plus the
/// free-form shop settings tree handed to contexts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Process-level settings.
    pub server: ServerConfig,
    /// Logging configuration (optional, uses defaults if None).
    pub logging: Option<LoggingConfig>,
    /// Shop settings, split into shared and per-scope parts.
    #[serde(default)]
    pub shop: ShopConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    pub home_dir: String, // will be normalized to absolute path
}

/// Shop settings. A scope's effective tree is `common` with the scope
/// overlay deep-merged on top.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ShopConfig {
    #[serde(default)]
    pub common: serde_json::Value,
    #[serde(default)]
    pub scopes: HashMap<String, serde_json::Value>,
    /// Directory with `<scope>.yaml` overlay files (optional).
    #[serde(default)]
    pub scopes_dir: Option<String>,
}

/// Logging configuration - maps target names to their logging settings.
/// Key "default" is the catch-all for logs that don't match explicit targets.
pub type LoggingConfig = HashMap<String, Section>;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Section {
    pub console_level: String, // "info", "debug", "error", "off"
    #[serde(default)]
    pub file: String, // "logs/shopkit.log"; empty disables the file sink
    #[serde(default)]
    pub file_level: String,
    #[serde(default)]
    pub max_age_days: Option<u32>,
    #[serde(default)]
    pub max_backups: Option<usize>,
    #[serde(default)]
    pub max_size_mb: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        // Empty => platform default resolved by resolve_home_dir().
        Self {
            home_dir: String::new(),
        }
    }
}

/// Settings shared by all scopes unless overridden.
pub fn default_common_settings() -> serde_json::Value {
    serde_json::json!({
        "resource": {
            "db": { "adapter": "sqlite", "database": "shop.sqlite" },
            "fs": { "adapter": "Standard", "basedir": "files" },
            "mq": { "adapter": "Standard" }
        },
        "madmin": {
            "log": { "manager": { "loglevel": 5 } },
            "cache": { "manager": { "name": "Standard" } }
        },
        "mshop": {
            "locale": { "site": "default", "language": "en", "currency": "EUR" }
        }
    })
}

impl Default for ShopConfig {
    fn default() -> Self {
        let mut scopes = HashMap::new();
        scopes.insert(FRONTEND_SCOPE.to_string(), serde_json::json!({}));
        // Administration always sees live data.
        scopes.insert(
            BACKEND_SCOPE.to_string(),
            serde_json::json!({ "madmin": { "cache": { "manager": { "name": "None" } } } }),
        );
        Self {
            common: default_common_settings(),
            scopes,
            scopes_dir: None,
        }
    }
}

/// Create a default logging configuration.
pub fn default_logging_config() -> LoggingConfig {
    let mut logging = HashMap::new();
    logging.insert(
        "default".to_string(),
        Section {
            console_level: "info".to_string(),
            file: "logs/shopkit.log".to_string(),
            file_level: "debug".to_string(),
            max_age_days: Some(7),
            max_backups: Some(3),
            max_size_mb: Some(100),
        },
    );
    logging
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: Some(default_logging_config()),
            shop: ShopConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration in layers: defaults → YAML file → environment variables.
    /// Also normalizes `server.home_dir` into an absolute path and creates the directory.
    pub fn load_layered<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        use figment::{
            providers::{Env, Format, Serialized, Yaml},
            Figment,
        };

        // Logging stays None unless YAML/ENV provide it.
        let base = AppConfig {
            logging: None,
            ..AppConfig::default()
        };

        let figment = Figment::new()
            .merge(Serialized::defaults(base))
            .merge(Yaml::file(config_path.as_ref()))
            // Example: SHOPKIT__SHOP__COMMON__MSHOP__LOCALE__LANGUAGE=de
            .merge(Env::prefixed("SHOPKIT__").split("__"));

        let mut config: AppConfig = figment
            .extract()
            .with_context(|| "Failed to extract config from figment".to_string())?;

        normalize_home_dir_inplace(&mut config.server)
            .context("Failed to resolve server.home_dir")?;

        if let Some(dir) = config.shop.scopes_dir.clone() {
            merge_scope_files(&mut config.shop.scopes, dir)?;
        }

        Ok(config)
    }

    /// Load configuration from file or fall back to defaults.
    /// Also normalizes `server.home_dir` into an absolute path and creates the directory.
    pub fn load_or_default<P: AsRef<Path>>(config_path: Option<P>) -> Result<Self> {
        match config_path {
            Some(path) => Self::load_layered(path),
            None => {
                let mut c = Self::default();
                normalize_home_dir_inplace(&mut c.server)
                    .context("Failed to resolve server.home_dir (defaults)")?;
                Ok(c)
            }
        }
    }

    /// Serialize configuration to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize config to YAML")
    }

    /// Apply overrides from command line arguments.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        let logging = self.logging.get_or_insert_with(default_logging_config);
        if let Some(default_section) = logging.get_mut("default") {
            match args.verbose {
                0 => {}
                1 => default_section.console_level = "debug".to_string(),
                _ => default_section.console_level = "trace".to_string(),
            }
        }
    }

    /// Names of all configured scopes, sorted.
    pub fn scope_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.shop.scopes.keys().cloned().collect();
        names.sort();
        names
    }

    /// Effective settings tree for `scope`, or None if the scope is unknown.
    pub fn scope_settings(&self, scope: &str) -> Option<serde_json::Value> {
        let overlay = self.shop.scopes.get(scope)?;
        let mut merged = self.shop.common.clone();
        merge_json(&mut merged, overlay);
        Some(merged)
    }

    /// Directory where relative resource paths (files, sqlite databases) live.
    pub fn home_dir(&self) -> PathBuf {
        PathBuf::from(&self.server.home_dir)
    }
}

/// Command line arguments structure.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub verbose: u8,
}

const fn default_subdir() -> &'static str {
    ".shopkit"
}

/// Recursively merge `overlay` into `base`. Objects merge key by key,
/// everything else is replaced. A null overlay leaves `base` untouched.
pub fn merge_json(base: &mut serde_json::Value, overlay: &serde_json::Value) {
    use serde_json::Value;

    match (base, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

/// Normalize `server.home_dir` using `resolve_home_dir` and store the absolute path back.
fn normalize_home_dir_inplace(server: &mut ServerConfig) -> Result<()> {
    // Treat empty string as "not provided" => None.
    let opt = if server.home_dir.trim().is_empty() {
        None
    } else {
        Some(server.home_dir.clone())
    };

    let resolved: PathBuf = resolve_home_dir(opt, default_subdir(), /*create*/ true)
        .context("home_dir normalization failed")?;

    server.home_dir = resolved.to_string_lossy().to_string();
    Ok(())
}

/// Merge `<scope>.yaml` / `<scope>.yml` files from `dir` into the scope overlays.
fn merge_scope_files(
    scopes: &mut HashMap<String, serde_json::Value>,
    dir: impl AsRef<Path>,
) -> Result<()> {
    use std::fs;
    let dir = dir.as_ref();
    if !dir.exists() {
        tracing::debug!(dir = %dir.display(), "scopes_dir does not exist; skipping");
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        if ext != "yml" && ext != "yaml" {
            continue;
        }
        let Some(scope) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scope file {}", path.display()))?;
        let val: serde_yaml::Value = serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid YAML in scope file {}", path.display()))?;
        let json = serde_json::to_value(val)?;

        let overlay = scopes
            .entry(scope.to_string())
            .or_insert_with(|| serde_json::json!({}));
        merge_json(overlay, &json);
    }
    Ok(())
}
