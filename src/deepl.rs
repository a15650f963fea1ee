//! DeepL API client: translate, language lists and usage.
//!
//! Each call is a single round trip bounded by the client timeout. Failures are
//! classified by HTTP status and never retried.

use crate::error::{Error, Result};
use crate::ignore_tags::{self, PhraseMarker, SENTINEL_TAG};
use reqwest::header::AUTHORIZATION;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

/// Base URL for the pro DeepL API
pub const URL_BASE_PRO: &str = "https://api.deepl.com/v2";

/// Base URL for the free DeepL API
pub const URL_BASE_FREE: &str = "https://api-free.deepl.com/v2";

/// Parameters the client always sets itself on a translate call
const RESERVED_PARAMS: [&str; 5] = [
    "source_lang",
    "target_lang",
    "tag_handling",
    "ignore_tags",
    "text",
];

/// DeepL account tier. Only changes the base URL.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    #[default]
    Free,
    Pro,
}

impl AccountType {
    pub fn base_url(&self) -> &'static str {
        match self {
            AccountType::Free => URL_BASE_FREE,
            AccountType::Pro => URL_BASE_PRO,
        }
    }
}

impl FromStr for AccountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "free" => Ok(AccountType::Free),
            "pro" => Ok(AccountType::Pro),
            other => Err(Error::Configuration(format!(
                "unknown DeepL account type '{}', expected 'free' or 'pro'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageDirection {
    Source,
    Target,
}

impl LanguageDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageDirection::Source => "source",
            LanguageDirection::Target => "target",
        }
    }
}

/// A language DeepL can translate from or to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderLanguage {
    pub code: String,
    pub display_name: String,
    pub direction: LanguageDirection,
}

/// Stable sort by display name, ties broken by code.
pub fn sort_languages(languages: &mut [ProviderLanguage]) {
    languages.sort_by(|a, b| {
        a.display_name
            .cmp(&b.display_name)
            .then_with(|| a.code.cmp(&b.code))
    });
}

/// Per-call translate options
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateOptions {
    /// Phrases to keep untranslated
    #[serde(default)]
    pub ignored_phrases: Vec<String>,

    /// Additional DeepL parameters (e.g. `formality`, `preserve_formatting`)
    #[serde(default)]
    pub extra_params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedSegment {
    #[serde(default)]
    pub detected_source_language: String,
    pub text: String,
}

/// Translated segments in request order
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationResult {
    pub segments: Vec<TranslatedSegment>,
}

impl TranslationResult {
    pub fn texts(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.text.as_str()).collect()
    }
}

/// Character usage for the current billing period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub characters_used: u64,
    pub character_limit: u64,
}

impl UsageSnapshot {
    pub fn remaining(&self) -> u64 {
        self.character_limit.saturating_sub(self.characters_used)
    }

    /// Percentage of the limit used. A zero limit reports 0%.
    pub fn percent_used(&self) -> f64 {
        if self.character_limit == 0 {
            return 0.0;
        }
        self.characters_used as f64 / self.character_limit as f64 * 100.0
    }
}

// ==================== Wire Types ====================

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    translations: Vec<TranslatedSegment>,
}

#[derive(Debug, Deserialize)]
struct WireLanguage {
    language: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    character_count: u64,
    character_limit: u64,
}

// ==================== Client ====================

#[derive(Debug, Clone)]
pub struct DeepLClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl DeepLClient {
    /// Create a client for the given account type.
    pub fn new(api_key: &str, account_type: AccountType, timeout: Duration) -> Result<Self> {
        Self::with_base_url(api_key, account_type.base_url(), timeout)
    }

    /// Create a client against an explicit base URL (proxies, tests).
    pub fn with_base_url(api_key: &str, base_url: &str, timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(Error::Configuration("DeepL API key is empty".to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.trim().to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        endpoint: &str,
    ) -> Result<reqwest::Response> {
        let response = request
            .header(AUTHORIZATION, format!("DeepL-Auth-Key {}", self.api_key))
            .send()
            .await
            .map_err(|e| {
                warn!("DeepL request to {} failed: {}", endpoint, e);
                Error::unavailable()
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            warn!("DeepL API error on {} ({}): {}", endpoint, status, body);
            return Err(Error::provider(status.as_u16()));
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response, endpoint: &str) -> Result<T> {
        response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                Error::unavailable()
            } else {
                Error::UnexpectedResponse(format!("{}: {}", endpoint, e))
            }
        })
    }

    /// Translate all segments in one provider call.
    ///
    /// Ignored phrases are wrapped before sending and the sentinel tags are
    /// stripped from every returned text. The result has the same length and
    /// order as `segments`.
    pub async fn translate(
        &self,
        source_code: &str,
        target_code: &str,
        segments: &[String],
        options: &TranslateOptions,
    ) -> Result<TranslationResult> {
        if segments.is_empty() {
            return Err(Error::InvalidRequest("no text segments to translate".to_string()));
        }
        let source_code = source_code.trim().to_ascii_uppercase();
        let target_code = target_code.trim().to_ascii_uppercase();
        if source_code.is_empty() || target_code.is_empty() {
            return Err(Error::InvalidRequest(
                "source and target language codes are required".to_string(),
            ));
        }

        let marker = PhraseMarker::new(&options.ignored_phrases)?;

        let mut params: Vec<(String, String)> = options
            .extra_params
            .iter()
            .filter(|(name, _)| !RESERVED_PARAMS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        params.push(("source_lang".to_string(), source_code.clone()));
        params.push(("target_lang".to_string(), target_code.clone()));
        params.push(("tag_handling".to_string(), "xml".to_string()));
        params.push(("ignore_tags".to_string(), SENTINEL_TAG.to_string()));
        for segment in segments {
            params.push(("text".to_string(), marker.mark(segment)));
        }

        debug!(
            "Translating {} segments {} -> {}",
            segments.len(),
            source_code,
            target_code
        );

        let request = self.http.post(self.url("/translate")).form(&params);
        let response = self.send(request, "/translate").await?;
        let body: TranslateResponse = Self::decode(response, "/translate").await?;

        if body.translations.len() != segments.len() {
            return Err(Error::UnexpectedResponse(format!(
                "expected {} translations, received {}",
                segments.len(),
                body.translations.len()
            )));
        }

        let segments = body
            .translations
            .into_iter()
            .map(|t| TranslatedSegment {
                detected_source_language: t.detected_source_language,
                text: ignore_tags::unmark(&t.text),
            })
            .collect();

        Ok(TranslationResult { segments })
    }

    /// Languages DeepL supports in the given direction, in provider order.
    pub async fn list_languages(
        &self,
        direction: LanguageDirection,
    ) -> Result<Vec<ProviderLanguage>> {
        let request = self
            .http
            .get(self.url("/languages"))
            .query(&[("type", direction.as_str())]);
        let response = self.send(request, "/languages").await?;
        let languages: Vec<WireLanguage> = Self::decode(response, "/languages").await?;

        debug!(
            "DeepL reports {} {} languages",
            languages.len(),
            direction.as_str()
        );

        Ok(languages
            .into_iter()
            .map(|l| ProviderLanguage {
                code: l.language,
                display_name: l.name,
                direction,
            })
            .collect())
    }

    /// Current character usage. Also the cheapest key-validity check.
    pub async fn usage(&self) -> Result<UsageSnapshot> {
        let request = self.http.get(self.url("/usage"));
        let response = self.send(request, "/usage").await?;
        let usage: WireUsage = Self::decode(response, "/usage").await?;

        Ok(UsageSnapshot {
            characters_used: usage.character_count,
            character_limit: usage.character_limit,
        })
    }
}
