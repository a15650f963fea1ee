use super::definitions::StringDefinitions;
use super::store::{CacheKey, LocalizationStore, StringMap};
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Language key of the untranslated canonical strings
pub const BASE_KEY: &str = "base";

/// Language keys end up in file names and may not contain `_`.
pub fn validate_language_key(language_key: &str) -> Result<()> {
    let valid = !language_key.is_empty()
        && language_key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidLanguage(language_key.to_string()))
    }
}

pub fn validate_context(context: &str) -> Result<()> {
    let valid = !context.is_empty()
        && context
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidRequest(format!("invalid context name '{}'", context)))
    }
}

/// Auto-translated UI strings per (language, context).
///
/// The cache is the only writer of its store. Base entries are synthesized
/// from the injected definitions on demand.
#[derive(Clone)]
pub struct LocalizationCache {
    store: Arc<dyn LocalizationStore>,
    definitions: Arc<dyn StringDefinitions>,
}

impl LocalizationCache {
    pub fn new(store: Arc<dyn LocalizationStore>, definitions: Arc<dyn StringDefinitions>) -> Self {
        Self { store, definitions }
    }

    pub fn definitions(&self) -> &dyn StringDefinitions {
        self.definitions.as_ref()
    }

    pub fn contexts(&self) -> Vec<String> {
        self.definitions.contexts()
    }

    /// Persist the canonical strings for a context, replacing any prior base.
    pub fn write_base(&self, context: &str, strings: &StringMap) -> Result<()> {
        validate_context(context)?;
        self.store.put(&CacheKey::new(BASE_KEY, context), strings)
    }

    /// Rewrite the base entry of every known context from the definitions.
    pub fn regenerate_base(&self) -> Result<()> {
        for context in self.definitions.contexts() {
            let strings = self.definition_strings(&context)?;
            self.write_base(&context, &strings)?;
        }
        debug!("Regenerated base strings for all contexts");
        Ok(())
    }

    fn definition_strings(&self, context: &str) -> Result<StringMap> {
        self.definitions
            .strings(context)
            .ok_or_else(|| Error::InvalidRequest(format!("unknown UI context '{}'", context)))
    }

    /// Base strings for a context, synthesized and persisted when missing.
    pub fn base(&self, context: &str) -> Result<StringMap> {
        validate_context(context)?;
        let key = CacheKey::new(BASE_KEY, context);

        if let Some(strings) = self.store.get(&key)? {
            return Ok(strings);
        }

        let strings = self.definition_strings(context)?;
        self.store.put(&key, &strings)?;
        info!("Generated base strings for context {}", context);

        Ok(strings)
    }

    /// Persist a fully translated string set.
    ///
    /// # Errors
    /// `CacheConsistency` when the key set differs from the base; nothing is
    /// written in that case.
    pub fn write_translated(
        &self,
        language_key: &str,
        context: &str,
        strings: &StringMap,
    ) -> Result<()> {
        validate_language_key(language_key)?;
        if language_key == BASE_KEY {
            return Err(Error::InvalidLanguage(format!(
                "'{}' is reserved for canonical strings",
                BASE_KEY
            )));
        }

        let base = self.base(context)?;

        let missing: Vec<String> = base
            .keys()
            .filter(|k| !strings.contains_key(*k))
            .cloned()
            .collect();
        let unexpected: Vec<String> = strings
            .keys()
            .filter(|k| !base.contains_key(*k))
            .cloned()
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(Error::CacheConsistency {
                language_key: language_key.to_string(),
                context: context.to_string(),
                missing,
                unexpected,
            });
        }

        self.store.put(&CacheKey::new(language_key, context), strings)
    }

    /// Cached strings for a language, falling back to the base strings.
    pub fn read(&self, language_key: &str, context: &str) -> Result<StringMap> {
        validate_language_key(language_key)?;
        validate_context(context)?;

        if let Some(strings) = self.store.get(&CacheKey::new(language_key, context))? {
            return Ok(strings);
        }

        debug!(
            "No cached strings for {} / {}, using base",
            language_key, context
        );
        self.base(context)
    }

    /// Language keys that currently have at least one entry
    pub fn cached_languages(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .store
            .keys()?
            .into_iter()
            .map(|k| k.language_key)
            .collect())
    }

    /// Delete entries for one language key, or every entry when `None`.
    ///
    /// Returns the deduplicated set of language keys that were removed.
    pub fn clear(&self, language_key: Option<&str>) -> Result<BTreeSet<String>> {
        if let Some(key) = language_key {
            validate_language_key(key)?;
        }

        let mut cleared = BTreeSet::new();
        for key in self.store.keys()? {
            if language_key.is_some_and(|wanted| wanted != key.language_key) {
                continue;
            }
            if self.store.remove(&key)? {
                cleared.insert(key.language_key);
            }
        }

        info!(
            "Cleared localization cache for {} language keys",
            cleared.len()
        );
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localization::definitions::{BuiltinDefinitions, PAGE_EDITOR, TRANSLATION_TOOL};
    use crate::localization::store::{FsStore, MemoryStore};
    use tempfile::TempDir;

    fn memory_cache() -> (LocalizationCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let cache = LocalizationCache::new(
            store.clone(),
            Arc::new(BuiltinDefinitions::new("English")),
        );
        (cache, store)
    }

    fn translated(base: &StringMap, prefix: &str) -> StringMap {
        base.iter()
            .map(|(k, v)| (k.clone(), format!("{} {}", prefix, v)))
            .collect()
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_language_key_validation() {
        assert!(validate_language_key("1018").is_ok());
        assert!(validate_language_key("pt-br").is_ok());
        assert!(validate_language_key(BASE_KEY).is_ok());
        assert!(validate_language_key("").is_err());
        assert!(validate_language_key("10_18").is_err());
        assert!(validate_language_key("../etc").is_err());
    }

    #[test]
    fn test_context_validation() {
        assert!(validate_context("page_editor").is_ok());
        assert!(validate_context("").is_err());
        assert!(validate_context("Page").is_err());
        assert!(validate_context("a/b").is_err());
    }

    // ==================== Base Tests ====================

    #[test]
    fn test_base_synthesized_and_persisted() {
        let (cache, store) = memory_cache();
        assert!(store.keys().unwrap().is_empty());

        let base = cache.base(PAGE_EDITOR).expect("Should synthesize");
        assert_eq!(base["translateTrigger"], "Translate from English");
        assert_eq!(store.keys().unwrap(), vec![CacheKey::new(BASE_KEY, PAGE_EDITOR)]);
    }

    #[test]
    fn test_write_base_overwrites() {
        let (cache, _) = memory_cache();
        let custom: StringMap = [("hello".to_string(), "Hello".to_string())].into();

        cache.write_base(PAGE_EDITOR, &custom).unwrap();
        cache.write_base(PAGE_EDITOR, &custom).unwrap();
        assert_eq!(cache.base(PAGE_EDITOR).unwrap(), custom);
    }

    #[test]
    fn test_base_unknown_context() {
        let (cache, _) = memory_cache();
        assert!(matches!(
            cache.base("unknown_context"),
            Err(Error::InvalidRequest(_))
        ));
    }

    // ==================== Translated Write Tests ====================

    #[test]
    fn test_write_translated_and_read() {
        let (cache, _) = memory_cache();
        let base = cache.base(TRANSLATION_TOOL).unwrap();
        let german = translated(&base, "DE");

        cache.write_translated("1018", TRANSLATION_TOOL, &german).unwrap();
        assert_eq!(cache.read("1018", TRANSLATION_TOOL).unwrap(), german);
    }

    #[test]
    fn test_write_translated_missing_key_is_rejected_without_write() {
        let (cache, store) = memory_cache();
        let base = cache.base(PAGE_EDITOR).unwrap();
        let mut partial = translated(&base, "DE");
        partial.remove("translateTrigger");
        partial.insert("extra".to_string(), "Extra".to_string());

        let err = cache.write_translated("1018", PAGE_EDITOR, &partial).unwrap_err();
        match err {
            Error::CacheConsistency {
                missing, unexpected, ..
            } => {
                assert_eq!(missing, vec!["translateTrigger".to_string()]);
                assert_eq!(unexpected, vec!["extra".to_string()]);
            }
            other => panic!("Expected cache consistency error, got {:?}", other),
        }

        assert!(store.get(&CacheKey::new("1018", PAGE_EDITOR)).unwrap().is_none());
    }

    #[test]
    fn test_write_translated_rejects_base_key() {
        let (cache, _) = memory_cache();
        let base = cache.base(PAGE_EDITOR).unwrap();
        assert!(matches!(
            cache.write_translated(BASE_KEY, PAGE_EDITOR, &base),
            Err(Error::InvalidLanguage(_))
        ));
    }

    // ==================== Read Fallback Tests ====================

    #[test]
    fn test_read_falls_back_to_base() {
        let (cache, _) = memory_cache();
        let strings = cache.read("1019", PAGE_EDITOR).unwrap();
        assert_eq!(strings, cache.base(PAGE_EDITOR).unwrap());
    }

    // ==================== Clear Tests ====================

    #[test]
    fn test_clear_single_language() {
        let (cache, _) = memory_cache();
        cache.regenerate_base().unwrap();
        for context in cache.contexts() {
            let base = cache.base(&context).unwrap();
            cache.write_translated("1018", &context, &translated(&base, "DE")).unwrap();
            cache.write_translated("1019", &context, &translated(&base, "FR")).unwrap();
        }

        let cleared = cache.clear(Some("1018")).unwrap();
        assert_eq!(cleared, BTreeSet::from(["1018".to_string()]));
        assert_eq!(
            cache.cached_languages().unwrap(),
            BTreeSet::from(["1019".to_string(), BASE_KEY.to_string()])
        );
    }

    #[test]
    fn test_clear_exact_match_only() {
        let (cache, _) = memory_cache();
        let base = cache.base(PAGE_EDITOR).unwrap();
        cache.write_translated("101", PAGE_EDITOR, &translated(&base, "A")).unwrap();
        cache.write_translated("1018", PAGE_EDITOR, &translated(&base, "B")).unwrap();

        let cleared = cache.clear(Some("101")).unwrap();
        assert_eq!(cleared, BTreeSet::from(["101".to_string()]));
        assert!(cache.cached_languages().unwrap().contains("1018"));
    }

    #[test]
    fn test_clear_all_then_read_regenerates_base() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let store = Arc::new(FsStore::new(dir.path()));
        let cache = LocalizationCache::new(
            store.clone(),
            Arc::new(BuiltinDefinitions::new("English")),
        );

        cache.regenerate_base().unwrap();
        for context in cache.contexts() {
            let base = cache.base(&context).unwrap();
            cache.write_translated("1018", &context, &translated(&base, "DE")).unwrap();
        }

        let cleared = cache.clear(None).unwrap();
        assert_eq!(
            cleared,
            BTreeSet::from(["1018".to_string(), BASE_KEY.to_string()])
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let strings = cache.read("1018", PAGE_EDITOR).unwrap();
        assert_eq!(strings["translateTrigger"], "Translate from English");
        assert!(dir.path().join("base_page_editor.json").exists());
        assert!(!dir.path().join("1018_page_editor.json").exists());
    }

    #[test]
    fn test_clear_empty_cache() {
        let (cache, _) = memory_cache();
        assert!(cache.clear(None).unwrap().is_empty());
    }
}
