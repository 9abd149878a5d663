//! Locale resolution for the current request.

use std::collections::HashMap;

use serde::Serialize;

use crate::context::Context;
use crate::error::{ContextError, ContextResult};

/// Site, language and currency a request is served in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocaleItem {
    pub site_code: String,
    pub language_id: String,
    pub currency_id: String,
}

/// Resolves the locale of the current request.
pub trait LocaleResolver: Send + Sync {
    fn resolve(
        &self,
        context: &Context,
        attributes: &HashMap<String, String>,
    ) -> ContextResult<LocaleItem>;
}

/// Resolver using URL attributes `site`, `locale` (or `lang`) and `currency`,
/// falling back to `mshop/locale/*` settings of the context configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfiguredLocaleResolver;

impl ConfiguredLocaleResolver {
    pub fn new() -> Self {
        Self
    }
}

fn is_language_id(id: &str) -> bool {
    // "de", "en_GB", "pt-BR"
    let mut parts = id.splitn(2, ['_', '-']);
    let lang = parts.next().unwrap_or_default();
    let region_ok = parts
        .next()
        .map_or(true, |r| (2..=3).contains(&r.len()) && r.chars().all(|c| c.is_ascii_alphanumeric()));
    (2..=3).contains(&lang.len()) && lang.chars().all(|c| c.is_ascii_lowercase()) && region_ok
}

fn check_allowed(
    context: &Context,
    path: &str,
    value: &str,
    what: &'static str,
) -> ContextResult<()> {
    let allowed: Option<Vec<String>> = context.config().get_typed(path)?;
    match allowed {
        Some(list) if !list.iter().any(|v| v == value) => Err(ContextError::resolution_failed(
            what,
            format!("'{value}' is not one of {list:?}"),
        )),
        _ => Ok(()),
    }
}

impl LocaleResolver for ConfiguredLocaleResolver {
    fn resolve(
        &self,
        context: &Context,
        attributes: &HashMap<String, String>,
    ) -> ContextResult<LocaleItem> {
        let cfg = context.config();
        let attr = |key: &str| attributes.get(key).filter(|v| !v.is_empty()).cloned();

        let site_code = attr("site").unwrap_or_else(|| cfg.get_str("mshop/locale/site", "default"));
        let language_id = attr("locale")
            .or_else(|| attr("lang"))
            .unwrap_or_else(|| cfg.get_str("mshop/locale/language", "en"));
        let currency_id = attr("currency")
            .unwrap_or_else(|| cfg.get_str("mshop/locale/currency", "EUR"))
            .to_ascii_uppercase();

        if !is_language_id(&language_id) {
            return Err(ContextError::resolution_failed(
                "locale",
                format!("invalid language id '{language_id}'"),
            ));
        }
        if currency_id.len() != 3 || !currency_id.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ContextError::resolution_failed(
                "locale",
                format!("invalid currency id '{currency_id}'"),
            ));
        }
        check_allowed(context, "mshop/locale/languages", &language_id, "locale")?;
        check_allowed(context, "mshop/locale/currencies", &currency_id, "locale")?;

        tracing::debug!(site = %site_code, language = %language_id, currency = %currency_id, "Locale resolved");
        Ok(LocaleItem {
            site_code,
            language_id,
            currency_id,
        })
    }
}
