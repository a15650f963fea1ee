//! Language code mapping: host language ids to DeepL language codes.
//!
//! The association table is injected by configuration. This module only
//! partitions it into one source language and the ordered target languages
//! and answers lookups against it.

use crate::error::{Error, Result};
use crate::localization::{validate_language_key, StringMap, BASE_KEY};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Provider codes whose scripts cannot be used for URL/slug translation
pub const URL_INVALID_LANGUAGES: [&str; 3] = ["RU", "JA", "ZH"];

/// Navigates to the selected option's URL
const SELECT_INLINE_JS: &str = "onchange=\"window.location.href=this.value\"";

/// One row of the host-language → provider-code table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageAssociation {
    /// Host system language identifier (e.g. "1017")
    pub host_id: String,

    /// Host system language name (e.g. "default", "german")
    pub name: String,

    /// Human readable title (e.g. "English")
    pub title: String,

    /// DeepL language code (e.g. "EN", "DE", "PT-BR")
    pub provider_code: String,

    /// Whether this is the language all content is translated from
    #[serde(default)]
    pub is_source: bool,
}

/// A configured language, ready for UI consumption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfiguredLanguage {
    pub host_id: String,
    pub name: String,
    pub title: String,
    pub provider_code: String,
    pub url_valid: bool,
}

/// Rendering options for [`LanguageMap::language_select_element`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SelectElementOptions {
    /// `id` attribute of the select element
    pub id: Option<String>,

    /// Extra classes appended to the default class
    pub classes: Option<String>,

    /// Add inline JS that navigates on change
    pub add_js: bool,

    pub exclude_ids: Vec<String>,
}

/// Whether page names (URLs) may be translated into this language
pub fn is_url_valid(provider_code: &str) -> bool {
    let primary = provider_code
        .split('-')
        .next()
        .unwrap_or(provider_code)
        .to_ascii_uppercase();

    !URL_INVALID_LANGUAGES.contains(&primary.as_str())
}

/// Exactly one source language and zero or more target languages.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageMap {
    source: ConfiguredLanguage,
    #[serde(rename = "target")]
    targets: Vec<ConfiguredLanguage>,
}

impl LanguageMap {
    /// Partition the association table in a single pass.
    ///
    /// # Errors
    /// `Configuration` when the table has no source, more than one source,
    /// a duplicated host id, an empty provider code, or a host id that cannot
    /// key the localization cache.
    pub fn from_associations(rows: Vec<LanguageAssociation>) -> Result<Self> {
        let mut source: Option<ConfiguredLanguage> = None;
        let mut targets = Vec::new();
        let mut seen = HashSet::new();

        for row in rows {
            if validate_language_key(&row.host_id).is_err() {
                return Err(Error::Configuration(format!(
                    "language id '{}' may only contain ASCII letters, digits and '-'",
                    row.host_id
                )));
            }
            if row.host_id == BASE_KEY {
                return Err(Error::Configuration(format!(
                    "language id '{}' is reserved",
                    BASE_KEY
                )));
            }

            let provider_code = row.provider_code.trim().to_ascii_uppercase();
            if provider_code.is_empty() {
                return Err(Error::Configuration(format!(
                    "language '{}' has no provider code",
                    row.host_id
                )));
            }
            if !seen.insert(row.host_id.clone()) {
                return Err(Error::Configuration(format!(
                    "language '{}' is configured more than once",
                    row.host_id
                )));
            }

            let language = ConfiguredLanguage {
                url_valid: row.is_source || is_url_valid(&provider_code),
                host_id: row.host_id,
                name: row.name,
                title: row.title,
                provider_code,
            };

            if row.is_source {
                if let Some(existing) = &source {
                    return Err(Error::Configuration(format!(
                        "multiple source languages configured ('{}' and '{}')",
                        existing.host_id, language.host_id
                    )));
                }
                source = Some(language);
            } else {
                targets.push(language);
            }
        }

        let source = source
            .ok_or_else(|| Error::Configuration("no source language configured".to_string()))?;

        debug!(
            "Configured source language {} with {} target languages",
            source.provider_code,
            targets.len()
        );

        Ok(Self { source, targets })
    }

    pub fn source(&self) -> &ConfiguredLanguage {
        &self.source
    }

    pub fn targets(&self) -> &[ConfiguredLanguage] {
        &self.targets
    }

    /// Source language first, then targets in configured order
    pub fn all(&self) -> impl Iterator<Item = &ConfiguredLanguage> {
        std::iter::once(&self.source).chain(self.targets.iter())
    }

    pub fn get(&self, host_id: &str) -> Option<&ConfiguredLanguage> {
        self.all().find(|lang| lang.host_id == host_id)
    }

    /// Resolve a host language id to its provider code.
    pub fn resolve(&self, host_id: &str) -> Result<&str> {
        self.get(host_id)
            .map(|lang| lang.provider_code.as_str())
            .ok_or_else(|| Error::InvalidLanguage(host_id.to_string()))
    }

    /// Host id → provider code for every configured language
    pub fn code_associations(&self) -> BTreeMap<String, String> {
        self.all()
            .map(|lang| (lang.host_id.clone(), lang.provider_code.clone()))
            .collect()
    }

    /// Render `<link rel="alternate">` tags for every configured language.
    ///
    /// `urls` maps host ids to the page URL in that language. Languages with no
    /// URL or listed in `exclude_ids` are skipped. An `x-default` tag pointing
    /// at the source language URL closes the list.
    pub fn alt_language_tags(
        &self,
        urls: &BTreeMap<String, String>,
        exclude_ids: &[String],
    ) -> String {
        let mut tags = String::new();

        for lang in self.all() {
            if exclude_ids.iter().any(|id| id == &lang.host_id) {
                continue;
            }
            if let Some(href) = urls.get(&lang.host_id) {
                tags.push_str(&alt_link_tag(href, &lang.provider_code.to_ascii_lowercase()));
            }
        }

        match urls.get(&self.source.host_id) {
            Some(href) => tags.push_str(&alt_link_tag(href, "x-default")),
            None => debug!(
                "No URL for source language {}, skipping x-default tag",
                self.source.host_id
            ),
        }

        tags
    }

    /// Render an accessible `<select>` with one option per configured language.
    ///
    /// Option values are the page URLs from `urls`; languages without a URL or
    /// listed in `exclude_ids` are skipped. `labels` are the localized
    /// `language_select_element` strings for the current language.
    pub fn language_select_element(
        &self,
        current_id: &str,
        urls: &BTreeMap<String, String>,
        options: &SelectElementOptions,
        labels: &StringMap,
    ) -> Result<String> {
        let current = self
            .get(current_id)
            .ok_or_else(|| Error::InvalidLanguage(current_id.to_string()))?;

        let mut option_els = String::new();
        for lang in self.all() {
            if options.exclude_ids.iter().any(|id| id == &lang.host_id) {
                continue;
            }
            let Some(href) = urls.get(&lang.host_id) else {
                continue;
            };

            let text = match labels.get("defaultLanguageOption") {
                Some(label) if lang.host_id == self.source.host_id => label.as_str(),
                _ => lang.title.as_str(),
            };

            option_els.push_str(&format!("<option value=\"{}\"", escape_attr(href)));
            if lang.host_id == current.host_id {
                option_els.push_str(" selected");
            }
            option_els.push('>');
            option_els.push_str(&escape_attr(text));
            option_els.push_str("</option>");
        }

        let mut output = String::from("<select");
        if let Some(id) = options.id.as_deref().filter(|id| !id.is_empty()) {
            output.push_str(&format!(" id=\"{}\"", escape_attr(id)));
        }

        let mut classes = String::from("language-select");
        if let Some(extra) = options.classes.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            classes.push(' ');
            classes.push_str(extra);
        }
        output.push_str(&format!(" class=\"{}\"", escape_attr(&classes)));

        if let Some(label) = labels.get("ariaLanguageSelectLabel") {
            output.push_str(&format!(" aria-label=\"{}\"", escape_attr(label)));
        }
        if let Some(label) = labels.get("ariaSelectedLanguageLabel") {
            output.push_str(&format!(
                " aria-description=\"{}: {}\"",
                escape_attr(label),
                escape_attr(&current.title)
            ));
        }
        if options.add_js {
            output.push(' ');
            output.push_str(SELECT_INLINE_JS);
        }

        output.push('>');
        output.push_str(&option_els);
        output.push_str("</select>");

        Ok(output)
    }
}

fn alt_link_tag(href: &str, hreflang: &str) -> String {
    format!(
        "<link rel=\"alternate\" hreflang=\"{}\" href=\"{}\">",
        escape_attr(hreflang),
        escape_attr(href)
    )
}

fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
