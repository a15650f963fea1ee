//! Translation service facade.
//!
//! Owns the DeepL session and its readiness state, the in-memory provider
//! language catalogs and the localization cache. Everything the host needs
//! goes through [`TranslationService`]; there is no global state.

use crate::config::Config;
use crate::deepl::{
    sort_languages, DeepLClient, LanguageDirection, ProviderLanguage, TranslateOptions,
    TranslationResult, UsageSnapshot,
};
use crate::error::{Classification, Error, ErrorBody, Result};
use crate::languages::{ConfiguredLanguage, LanguageMap, SelectElementOptions};
use crate::localization::{
    BuiltinDefinitions, FsStore, LocalizationCache, StringMap, LANGUAGE_SELECT_ELEMENT,
    PAGE_EDITOR,
};
use anyhow::Context;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Lifecycle of the DeepL session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReadinessState {
    /// No API key configured
    Uninitialized,
    /// Key configured but not yet verified
    KeyUnverified,
    Ready,
    /// Provider rejected the key
    KeyInvalid,
}

impl fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReadinessState::Uninitialized => "uninitialized",
            ReadinessState::KeyUnverified => "keyUnverified",
            ReadinessState::Ready => "ready",
            ReadinessState::KeyInvalid => "keyInvalid",
        };
        f.write_str(name)
    }
}

/// Everything the service is built from.
pub struct AppContext {
    pub config: Config,
    pub languages: LanguageMap,
    pub cache: LocalizationCache,
}

impl AppContext {
    pub fn new(config: Config, languages: LanguageMap, cache: LocalizationCache) -> Self {
        Self {
            config,
            languages,
            cache,
        }
    }

    /// Load the language table and open the on-disk localization cache.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let languages = config.load_languages()?;
        let definitions = BuiltinDefinitions::new(languages.source().title.clone());
        let store = FsStore::new(&config.localization_cache_dir);

        std::fs::create_dir_all(store.dir()).with_context(|| {
            format!(
                "Failed to create localization cache dir {}",
                store.dir().display()
            )
        })?;

        let cache = LocalizationCache::new(Arc::new(store), Arc::new(definitions));
        Ok(Self::new(config, languages, cache))
    }
}

/// One translate call as the host sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationRequest {
    pub source_code: String,
    pub target_code: String,
    pub segments: Vec<String>,
    pub ignored_phrases: Vec<String>,
    pub extra_params: BTreeMap<String, String>,
}

/// Provider language lists in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageCatalog {
    pub source: Vec<ProviderLanguage>,
    pub target: Vec<ProviderLanguage>,
}

/// Outcome of a full localization run. One language failing never aborts
/// the others.
#[derive(Debug, Default)]
pub struct LocalizationReport {
    pub succeeded: BTreeSet<String>,
    pub failed: BTreeMap<String, Error>,
}

impl LocalizationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Serialize for LocalizationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Body<'a> {
            succeeded: &'a BTreeSet<String>,
            failed: BTreeMap<&'a str, ErrorBody>,
        }

        Body {
            succeeded: &self.succeeded,
            failed: self
                .failed
                .iter()
                .map(|(key, err)| (key.as_str(), err.to_body()))
                .collect(),
        }
        .serialize(serializer)
    }
}

/// Data the host UI needs when an editor page loads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootData {
    pub languages: LanguageMap,
    pub code_associations: BTreeMap<String, String>,
    pub current_language: ConfiguredLanguage,
    pub state: ReadinessState,
    pub ui_strings: StringMap,
}

struct Session {
    client: Option<DeepLClient>,
    state: ReadinessState,
    /// Bumped on every key change so a stale verification cannot overwrite newer state
    generation: u64,
}

pub struct TranslationService {
    context: AppContext,
    session: RwLock<Session>,
    catalog: RwLock<Option<LanguageCatalog>>,
}

fn build_client(config: &Config, api_key: &str) -> Result<DeepLClient> {
    match &config.deepl_api_url {
        Some(url) => DeepLClient::with_base_url(api_key, url, config.request_timeout()),
        None => DeepLClient::new(api_key, config.deepl_account_type, config.request_timeout()),
    }
}

fn primary_subtag(code: &str) -> String {
    code.split('-').next().unwrap_or(code).to_ascii_uppercase()
}

impl TranslationService {
    /// Build the service. Does not contact the provider.
    pub fn new(context: AppContext) -> Result<Self> {
        let session = match context.config.deepl_api_key.as_deref() {
            Some(key) => Session {
                client: Some(build_client(&context.config, key)?),
                state: ReadinessState::KeyUnverified,
                generation: 0,
            },
            None => Session {
                client: None,
                state: ReadinessState::Uninitialized,
                generation: 0,
            },
        };

        info!("Translation service created (state: {})", session.state);

        Ok(Self {
            context,
            session: RwLock::new(session),
            catalog: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &Config {
        &self.context.config
    }

    pub fn languages(&self) -> &LanguageMap {
        &self.context.languages
    }

    pub fn cache(&self) -> &LocalizationCache {
        &self.context.cache
    }

    pub async fn state(&self) -> ReadinessState {
        self.session.read().await.state
    }

    /// Replace the API key. The new key starts unverified; `None` uninitializes.
    pub async fn set_api_key(&self, api_key: Option<&str>) -> Result<ReadinessState> {
        let client = match api_key.map(str::trim).filter(|k| !k.is_empty()) {
            Some(key) => Some(build_client(&self.context.config, key)?),
            None => None,
        };

        let mut session = self.session.write().await;
        session.state = if client.is_some() {
            ReadinessState::KeyUnverified
        } else {
            ReadinessState::Uninitialized
        };
        session.client = client;
        session.generation += 1;
        let state = session.state;
        drop(session);

        *self.catalog.write().await = None;
        info!("API key changed (state: {})", state);

        Ok(state)
    }

    /// Verify the key with a usage request.
    ///
    /// Only a forbidden response marks the key invalid. Any other outcome,
    /// including an unreachable provider, counts as a valid key.
    pub async fn verify_api_key(&self) -> ReadinessState {
        let (client, generation) = {
            let session = self.session.read().await;
            match &session.client {
                Some(client) => (client.clone(), session.generation),
                None => return session.state,
            }
        };

        let state = match client.usage().await {
            Err(e) if e.classification() == Some(Classification::Forbidden) => {
                warn!("DeepL rejected the API key: {}", e);
                ReadinessState::KeyInvalid
            }
            Err(e) => {
                warn!("Usage check failed, assuming key is valid: {}", e);
                ReadinessState::Ready
            }
            Ok(_) => ReadinessState::Ready,
        };

        let mut session = self.session.write().await;
        if session.generation != generation {
            debug!("API key changed during verification, discarding result");
            return session.state;
        }
        session.state = state;
        info!("API key verified (state: {})", state);

        state
    }

    /// Client for a provider call. Unverified keys are verified first.
    async fn ready_client(&self) -> Result<DeepLClient> {
        if self.state().await == ReadinessState::KeyUnverified {
            self.verify_api_key().await;
        }

        let session = self.session.read().await;
        match (&session.client, session.state) {
            (Some(client), ReadinessState::Ready) => Ok(client.clone()),
            (_, state) => Err(Error::NotReady { state }),
        }
    }

    /// Per-call options merged with the configured defaults. Per-call extra
    /// params override the configured ones.
    fn translate_options(
        &self,
        ignored_phrases: &[String],
        extra_params: &BTreeMap<String, String>,
    ) -> TranslateOptions {
        let config = &self.context.config;

        let mut params = BTreeMap::new();
        if config.preserve_formatting {
            params.insert("preserve_formatting".to_string(), "1".to_string());
        }
        params.extend(extra_params.clone());

        TranslateOptions {
            ignored_phrases: config
                .ignored_phrases
                .iter()
                .chain(ignored_phrases)
                .cloned()
                .collect(),
            extra_params: params,
        }
    }

    pub async fn translate(&self, request: &TranslationRequest) -> Result<TranslationResult> {
        let client = self.ready_client().await?;
        let options = self.translate_options(&request.ignored_phrases, &request.extra_params);

        client
            .translate(
                &request.source_code,
                &request.target_code,
                &request.segments,
                &options,
            )
            .await
    }

    pub async fn usage(&self) -> Result<UsageSnapshot> {
        let client = self.ready_client().await?;
        client.usage().await
    }

    /// Source and target catalogs, fetched once and kept until refreshed.
    pub async fn translatable_languages(&self, sort: bool) -> Result<LanguageCatalog> {
        let client = self.ready_client().await?;

        let cached = self.catalog.read().await.clone();
        let mut catalog = match cached {
            Some(catalog) => catalog,
            None => {
                let catalog = Self::fetch_catalog(&client).await?;
                *self.catalog.write().await = Some(catalog.clone());
                catalog
            }
        };

        if sort {
            sort_languages(&mut catalog.source);
            sort_languages(&mut catalog.target);
        }

        Ok(catalog)
    }

    /// Drop the cached catalogs and fetch them again.
    pub async fn refresh_languages(&self) -> Result<LanguageCatalog> {
        let client = self.ready_client().await?;
        *self.catalog.write().await = None;

        let catalog = Self::fetch_catalog(&client).await?;
        *self.catalog.write().await = Some(catalog.clone());

        Ok(catalog)
    }

    async fn fetch_catalog(client: &DeepLClient) -> Result<LanguageCatalog> {
        let (source, target) = tokio::try_join!(
            client.list_languages(LanguageDirection::Source),
            client.list_languages(LanguageDirection::Target),
        )?;

        info!(
            "Fetched {} source and {} target languages",
            source.len(),
            target.len()
        );

        Ok(LanguageCatalog { source, target })
    }

    /// Translate the UI strings into every configured language.
    ///
    /// Base strings are regenerated first. A failing language has its partial
    /// entries removed and is reported; the run continues with the next one.
    pub async fn localize_all(&self) -> Result<LocalizationReport> {
        let client = self.ready_client().await?;
        let cache = &self.context.cache;

        cache.regenerate_base()?;
        let definitions_language = cache.definitions().language_code().to_string();

        let mut report = LocalizationReport::default();

        for language in self.context.languages.all() {
            match self
                .localize_language(&client, language, &definitions_language)
                .await
            {
                Ok(()) => {
                    info!(
                        "Localized UI strings for {} ({})",
                        language.host_id, language.provider_code
                    );
                    report.succeeded.insert(language.host_id.clone());
                }
                Err(e) => {
                    warn!(
                        "Failed to localize UI strings for {} ({}): {}",
                        language.host_id, language.provider_code, e
                    );
                    if let Err(clear_err) = cache.clear(Some(&language.host_id)) {
                        error!(
                            "Failed to remove partial entries for {}: {}",
                            language.host_id, clear_err
                        );
                    }
                    report.failed.insert(language.host_id.clone(), e);
                }
            }
        }

        info!(
            "Localization finished: {} succeeded, {} failed",
            report.succeeded.len(),
            report.failed.len()
        );

        Ok(report)
    }

    async fn localize_language(
        &self,
        client: &DeepLClient,
        language: &ConfiguredLanguage,
        definitions_language: &str,
    ) -> Result<()> {
        let cache = &self.context.cache;
        let same_language =
            primary_subtag(&language.provider_code) == primary_subtag(definitions_language);
        let options = self.translate_options(&[], &BTreeMap::new());

        for context in cache.contexts() {
            let base = cache.base(&context)?;

            let strings = if same_language || base.is_empty() {
                base
            } else {
                let (keys, values): (Vec<String>, Vec<String>) = base.into_iter().unzip();
                let result = client
                    .translate(
                        definitions_language,
                        &language.provider_code,
                        &values,
                        &options,
                    )
                    .await?;

                keys.into_iter()
                    .zip(result.segments.into_iter().map(|s| s.text))
                    .collect()
            };

            cache.write_translated(&language.host_id, &context, &strings)?;
        }

        Ok(())
    }

    /// Languages, readiness and page editor strings for one host language.
    pub async fn boot_data(&self, host_id: &str) -> Result<BootData> {
        let languages = &self.context.languages;
        let current_language = languages
            .get(host_id)
            .cloned()
            .ok_or_else(|| Error::InvalidLanguage(host_id.to_string()))?;

        Ok(BootData {
            languages: languages.clone(),
            code_associations: languages.code_associations(),
            current_language,
            state: self.state().await,
            ui_strings: self.context.cache.read(host_id, PAGE_EDITOR)?,
        })
    }

    /// Cached UI strings for a configured language, falling back to base.
    pub fn ui_strings(&self, host_id: &str, context: &str) -> Result<StringMap> {
        self.context.languages.resolve(host_id)?;
        self.context.cache.read(host_id, context)
    }

    pub fn current_language_code(&self, host_id: &str) -> Result<String> {
        self.context
            .languages
            .resolve(host_id)
            .map(|code| code.to_string())
    }

    pub fn alt_language_tags(
        &self,
        urls: &BTreeMap<String, String>,
        exclude_ids: &[String],
    ) -> String {
        self.context.languages.alt_language_tags(urls, exclude_ids)
    }

    /// Language switcher markup labelled in the current language.
    pub fn language_select_element(
        &self,
        current_id: &str,
        urls: &BTreeMap<String, String>,
        options: &SelectElementOptions,
    ) -> Result<String> {
        let labels = self.ui_strings(current_id, LANGUAGE_SELECT_ELEMENT)?;
        self.context
            .languages
            .language_select_element(current_id, urls, options, &labels)
    }

    pub fn clear_localizations(&self, language_key: Option<&str>) -> Result<BTreeSet<String>> {
        self.context.cache.clear(language_key)
    }
}
