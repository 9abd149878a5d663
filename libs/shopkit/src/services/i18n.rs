//! Translation handles resolved per language list.
//!
//! Translations come from a tree `{ <lang>: { <domain>: { <text>: <translation> } } }`.
//! When several languages are requested, earlier ones win and later ones fill
//! the gaps.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::config::Config;
use crate::error::{ContextError, ContextResult};

/// Translation handle for one language.
pub trait I18n: Send + Sync {
    fn language_id(&self) -> &str;

    /// Translate `text` of `domain`; untranslated texts are returned unchanged.
    fn dt(&self, domain: &str, text: &str) -> String;
}

/// Produces translation handles for a list of language ids, most preferred first.
pub trait I18nResolver: Send + Sync {
    fn resolve(&self, language_ids: &[String]) -> ContextResult<Arc<dyn I18n>>;
}

/// Domain → (source text → translation).
type Table = HashMap<String, HashMap<String, String>>;

#[derive(Debug)]
pub struct Translations {
    language_id: String,
    table: Table,
}

impl I18n for Translations {
    fn language_id(&self) -> &str {
        &self.language_id
    }

    fn dt(&self, domain: &str, text: &str) -> String {
        self.table
            .get(domain)
            .and_then(|d| d.get(text))
            .cloned()
            .unwrap_or_else(|| text.to_string())
    }
}

/// Most language lists kept built at once.
pub const MAX_CACHED_HANDLES: usize = 256;

/// Resolver over a translation tree.
///
/// Handles are built once per language list and cached, up to
/// [`MAX_CACHED_HANDLES`] lists; further lists get a fresh handle per call.
pub struct TranslationResolver {
    source: Value,
    cache: DashMap<Vec<String>, Arc<Translations>>,
}

impl TranslationResolver {
    pub fn new(source: Value) -> Self {
        Self {
            source,
            cache: DashMap::new(),
        }
    }

    /// Use the `i18n` subtree of a configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.get("i18n").cloned().unwrap_or(Value::Null))
    }

    fn load_table(&self, language_id: &str, into: &mut Table) {
        let Some(domains) = self.source.get(language_id).and_then(Value::as_object) else {
            return;
        };
        for (domain, texts) in domains {
            let Some(texts) = texts.as_object() else {
                continue;
            };
            let entry = into.entry(domain.clone()).or_default();
            for (text, translated) in texts {
                if let Some(t) = translated.as_str() {
                    entry.insert(text.clone(), t.to_string());
                }
            }
        }
    }

    fn build(&self, language_ids: &[String]) -> Translations {
        let mut table = Table::new();
        // Least preferred first so preferred languages overwrite.
        for id in language_ids.iter().rev() {
            self.load_table(id, &mut table);
        }
        Translations {
            language_id: language_ids[0].clone(),
            table,
        }
    }
}

impl I18nResolver for TranslationResolver {
    fn resolve(&self, language_ids: &[String]) -> ContextResult<Arc<dyn I18n>> {
        if language_ids.is_empty() {
            return Err(ContextError::resolution_failed("i18n", "no language id given"));
        }
        if let Some(cached) = self.cache.get(language_ids) {
            let handle: Arc<dyn I18n> = cached.clone();
            return Ok(handle);
        }

        tracing::debug!(languages = ?language_ids, "Building translation table");
        let built = Arc::new(self.build(language_ids));
        if self.cache.len() >= MAX_CACHED_HANDLES {
            let handle: Arc<dyn I18n> = built;
            return Ok(handle);
        }
        let handle: Arc<dyn I18n> = self
            .cache
            .entry(language_ids.to_vec())
            .or_insert(built)
            .clone();
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver() -> TranslationResolver {
        TranslationResolver::new(json!({
            "de": { "client": { "Basket": "Warenkorb", "Checkout": "Kasse" } },
            "de_CH": { "client": { "Basket": "Chratte" } }
        }))
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn translates_and_falls_back() {
        let r = resolver();

        let de = r.resolve(&ids(&["de"])).unwrap();
        assert_eq!(de.language_id(), "de");
        assert_eq!(de.dt("client", "Basket"), "Warenkorb");
        assert_eq!(de.dt("client", "Unknown"), "Unknown");
        assert_eq!(de.dt("admin", "Basket"), "Basket");

        let ch = r.resolve(&ids(&["de_CH", "de"])).unwrap();
        assert_eq!(ch.language_id(), "de_CH");
        assert_eq!(ch.dt("client", "Basket"), "Chratte");
        assert_eq!(ch.dt("client", "Checkout"), "Kasse");
    }

    #[test]
    fn handles_are_cached_per_language_list() {
        let r = resolver();
        let a = r.resolve(&ids(&["fr"])).unwrap();
        let b = r.resolve(&ids(&["fr"])).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.dt("client", "Basket"), "Basket");
    }

    #[test]
    fn cache_stops_growing_at_limit() {
        let r = resolver();
        for n in 0..MAX_CACHED_HANDLES {
            r.resolve(&[format!("x{n}")]).unwrap();
        }
        assert_eq!(r.cache.len(), MAX_CACHED_HANDLES);

        let a = r.resolve(&ids(&["de"])).unwrap();
        let b = r.resolve(&ids(&["de"])).unwrap();
        assert_eq!(r.cache.len(), MAX_CACHED_HANDLES);
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(b.dt("client", "Basket"), "Warenkorb");

        // Lists cached before the limit keep their handle
        let first = r.resolve(&ids(&["x0"])).unwrap();
        assert!(Arc::ptr_eq(&first, &r.resolve(&ids(&["x0"])).unwrap()));
    }

    #[test]
    fn empty_language_list_fails() {
        let err = resolver().resolve(&[]).err().unwrap();
        assert!(matches!(err, ContextError::ResolutionFailed { what: "i18n", .. }));
    }
}
