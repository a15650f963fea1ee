use crate::deepl::AccountType;
use crate::languages::{LanguageAssociation, LanguageMap};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    // DeepL
    pub deepl_api_key: Option<String>,
    pub deepl_account_type: AccountType,
    pub deepl_api_url: Option<String>,
    pub preserve_formatting: bool,
    pub ignored_phrases: Vec<String>,
    pub request_timeout_secs: u64,

    // Languages and localization cache
    pub languages_file: PathBuf,
    pub localization_cache_dir: PathBuf,

    // HTTP surface
    pub port: u16,
    pub bridge_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            deepl_api_key: None,
            deepl_account_type: AccountType::Free,
            deepl_api_url: None,
            preserve_formatting: false,
            ignored_phrases: Vec::new(),
            request_timeout_secs: 30,
            languages_file: PathBuf::from("data/languages.json"),
            localization_cache_dir: PathBuf::from("data/localization"),
            port: 8080,
            bridge_api_key: None,
        }
    }
}

/// Unset and blank variables are treated the same
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Split a comma separated phrase list, dropping blank entries
pub fn parse_phrase_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            // DeepL - a missing key is allowed, the service starts uninitialized
            deepl_api_key: optional_var("DEEPL_API_KEY"),
            deepl_account_type: optional_var("DEEPL_ACCOUNT_TYPE")
                .map(|v| v.parse::<AccountType>())
                .transpose()
                .context("Invalid DEEPL_ACCOUNT_TYPE")?
                .unwrap_or_default(),
            deepl_api_url: optional_var("DEEPL_API_URL"),
            preserve_formatting: optional_var("DEEPL_PRESERVE_FORMATTING")
                .map(|v| parse_bool(&v))
                .unwrap_or(defaults.preserve_formatting),
            ignored_phrases: optional_var("DEEPL_IGNORED_PHRASES")
                .map(|v| parse_phrase_list(&v))
                .unwrap_or_default(),
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(defaults.request_timeout_secs),

            // Languages and localization cache
            languages_file: optional_var("LANGUAGES_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.languages_file),
            localization_cache_dir: optional_var("LOCALIZATION_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.localization_cache_dir),

            // HTTP surface
            port: std::env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            bridge_api_key: optional_var("BRIDGE_API_KEY"),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Load and partition the language association table.
    pub fn load_languages(&self) -> Result<LanguageMap> {
        let contents = std::fs::read_to_string(&self.languages_file).with_context(|| {
            format!(
                "Failed to read languages file {}",
                self.languages_file.display()
            )
        })?;

        let rows: Vec<LanguageAssociation> = serde_json::from_str(&contents).with_context(|| {
            format!(
                "Failed to parse languages file {}",
                self.languages_file.display()
            )
        })?;

        LanguageMap::from_associations(rows).context("Invalid language configuration")
    }
}
