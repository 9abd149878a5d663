//! Database resources resolved from `resource/db*` settings.
//!
//! The manager only describes connections (adapter + DSN); opening and
//! pooling them is left to the persistence layer.

use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ContextError, ContextResult};

const SERVICE: &str = "database";
/// Resource every other name falls back to.
pub const DEFAULT_RESOURCE: &str = "db";

/// Settings of one `resource/<name>` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbResourceConfig {
    #[serde(default)]
    pub adapter: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Full DSN; takes precedence over the individual fields.
    #[serde(default)]
    pub dsn: Option<String>,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

/// A named, validated connection description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbResource {
    pub name: String,
    pub adapter: String,
    pub dsn: String,
}

impl DbResource {
    /// DSN with the password replaced, safe for logs.
    pub fn redacted_dsn(&self) -> String {
        match url::Url::parse(&self.dsn) {
            Ok(mut u) if u.password().is_some() => {
                let _ = u.set_password(Some("***"));
                u.to_string()
            }
            _ => self.dsn.clone(),
        }
    }
}

pub trait DatabaseManager: Send + Sync {
    /// Resource by name; unknown names resolve to the default resource.
    fn resource(&self, name: &str) -> ContextResult<DbResource>;

    fn resource_names(&self) -> Vec<String>;
}

/// Database manager built from configuration.
#[derive(Debug)]
pub struct ConfiguredDbManager {
    resources: BTreeMap<String, DbResource>,
}

impl ConfiguredDbManager {
    /// Read every `resource/db` and `resource/db-*` entry.
    pub fn from_config(cfg: &Config) -> ContextResult<Self> {
        let entries = cfg
            .get("resource")
            .and_then(|v| v.as_object())
            .ok_or_else(|| ContextError::service_unavailable(SERVICE, "no 'resource' section configured"))?;

        let mut resources = BTreeMap::new();
        for (name, raw) in entries {
            if name != DEFAULT_RESOURCE && !name.starts_with("db-") {
                continue;
            }
            let rc: DbResourceConfig = serde_json::from_value(raw.clone()).map_err(|e| {
                ContextError::service_unavailable(SERVICE, format!("resource '{name}': {e}"))
            })?;
            let resource = build_resource(name, &rc)?;
            tracing::debug!(resource = %name, dsn = %resource.redacted_dsn(), "Database resource configured");
            resources.insert(name.clone(), resource);
        }

        if !resources.contains_key(DEFAULT_RESOURCE) {
            return Err(ContextError::service_unavailable(
                SERVICE,
                "no 'resource/db' configured",
            ));
        }

        Ok(Self { resources })
    }
}

impl DatabaseManager for ConfiguredDbManager {
    fn resource(&self, name: &str) -> ContextResult<DbResource> {
        self.resources
            .get(name)
            .or_else(|| self.resources.get(DEFAULT_RESOURCE))
            .cloned()
            .ok_or_else(|| ContextError::service_unavailable(SERVICE, format!("unknown resource '{name}'")))
    }

    fn resource_names(&self) -> Vec<String> {
        self.resources.keys().cloned().collect()
    }
}

fn build_resource(name: &str, rc: &DbResourceConfig) -> ContextResult<DbResource> {
    let fail = |reason: String| ContextError::service_unavailable(SERVICE, format!("resource '{name}': {reason}"));

    let dsn = match &rc.dsn {
        Some(raw) => expand_env_in_dsn(raw).map_err(fail)?,
        None => dsn_from_fields(rc).map_err(fail)?,
    };
    let scheme = dsn_scheme(&dsn)
        .ok_or_else(|| fail(format!("DSN '{dsn}' has no scheme")))?
        .to_ascii_lowercase();
    validate_dsn(&dsn).map_err(fail)?;

    let adapter = if rc.adapter.is_empty() {
        scheme
    } else {
        rc.adapter.to_ascii_lowercase()
    };

    Ok(DbResource {
        name: name.to_string(),
        adapter,
        dsn,
    })
}

fn env_placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder pattern is valid")
    })
}

/// Replace `${VAR}` placeholders with environment values.
pub fn expand_env_in_dsn(dsn: &str) -> Result<String, String> {
    let mut missing = None;
    let expanded = env_placeholder().replace_all(dsn, |caps: &regex::Captures<'_>| {
        std::env::var(&caps[1]).unwrap_or_else(|_| {
            missing.get_or_insert_with(|| caps[1].to_string());
            String::new()
        })
    });
    match missing {
        Some(var) => Err(format!("environment variable '{var}' not set")),
        None => Ok(expanded.into_owned()),
    }
}

/// Password value; `${VAR}` reads it from the environment.
fn resolve_password(password: Option<&str>) -> Result<Option<String>, String> {
    match password {
        Some(p) if p.starts_with("${") && p.ends_with('}') => {
            let var = &p[2..p.len() - 1];
            std::env::var(var)
                .map(Some)
                .map_err(|_| format!("environment variable '{var}' not set for password"))
        }
        other => Ok(other.map(str::to_string)),
    }
}

/// Scheme of a `scheme://...` DSN. SQLite also accepts the `sqlite::memory:` form.
fn dsn_scheme(dsn: &str) -> Option<&str> {
    let (scheme, rest) = dsn.split_once(':')?;
    let mut chars = scheme.chars();
    let well_formed = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    let has_authority = rest.starts_with("//") || scheme.eq_ignore_ascii_case("sqlite");
    (well_formed && has_authority).then_some(scheme)
}

/// Expects a DSN with a scheme. SQLite DSNs use their own syntax and are not checked.
pub fn validate_dsn(dsn: &str) -> Result<(), String> {
    if dsn.starts_with("sqlite:") {
        return Ok(());
    }
    dsn::parse(dsn)
        .map(|_| ())
        .map_err(|e| format!("invalid DSN: {e}"))
}

fn dsn_from_fields(rc: &DbResourceConfig) -> Result<String, String> {
    let adapter = rc.adapter.to_ascii_lowercase();
    let scheme = match adapter.as_str() {
        "sqlite" => {
            return Ok(match rc.database.as_deref() {
                None | Some("") | Some(":memory:") => "sqlite::memory:".to_string(),
                Some(path) => format!("sqlite://{path}"),
            })
        }
        "mysql" | "mariadb" => "mysql",
        "pgsql" | "postgres" | "postgresql" => "postgres",
        "" => return Err("neither 'adapter' nor 'dsn' configured".to_string()),
        other => return Err(format!("unsupported adapter '{other}'")),
    };

    let mut url = url::Url::parse(&format!("{scheme}://localhost/"))
        .map_err(|e| format!("invalid scheme '{scheme}': {e}"))?;
    url.set_host(Some(rc.host.as_deref().unwrap_or("localhost")))
        .map_err(|e| format!("invalid host: {e}"))?;
    if let Some(port) = rc.port {
        url.set_port(Some(port))
            .map_err(|_| format!("invalid port {port}"))?;
    }
    if let Some(user) = rc.username.as_deref() {
        url.set_username(user)
            .map_err(|_| format!("invalid username '{user}'"))?;
    }
    if let Some(password) = resolve_password(rc.password.as_deref())? {
        url.set_password(Some(&password))
            .map_err(|_| "invalid password".to_string())?;
    }
    match rc.database.as_deref() {
        Some(db) => url.set_path(&format!("/{}", urlencoding::encode(db))),
        None => url.set_path("/"),
    }
    if !rc.params.is_empty() {
        // Sorted for stable DSNs
        let params: BTreeMap<_, _> = rc.params.iter().collect();
        let mut pairs = url.query_pairs_mut();
        for (k, v) in params {
            pairs.append_pair(k, v);
        }
    }
    Ok(url.to_string())
}
