//! Canonical (untranslated) UI strings, grouped by context.
//!
//! These are the strings the bridge translates into every configured language
//! so that its own UI speaks the editor's language.

use super::StringMap;

/// Placeholder replaced with the configured source language title
pub const DEFAULT_LANGUAGE_PLACEHOLDER: &str = "%{DEFAULT_LANGUAGE}";

pub const PAGE_EDITOR: &str = "page_editor";
pub const TRANSLATION_TOOL: &str = "translation_tool";
pub const LANGUAGE_SELECT_ELEMENT: &str = "language_select_element";

/// Source of canonical strings for each UI context.
pub trait StringDefinitions: Send + Sync {
    /// Provider code of the language the definitions are written in
    fn language_code(&self) -> &str;

    fn contexts(&self) -> Vec<String>;

    /// `None` when the context is unknown
    fn strings(&self, context: &str) -> Option<StringMap>;
}

// ==================== Page Editor ====================

const PAGE_EDITOR_STRINGS: &[(&str, &str)] = &[
    ("translateTrigger", "Translate from %{DEFAULT_LANGUAGE}"),
    ("translationAvailable", "Translation Service Available"),
    ("translationNotAvailable", "Translation not available for this language"),
    ("languageNotAvailable", "This language is not configured for translation"),
    (
        "pageNameTranslationNotAvailable",
        "Translation not available for page names in this language",
    ),
];

// ==================== Translation Tool ====================

const TRANSLATION_TOOL_STRINGS: &[(&str, &str)] = &[
    ("name", "Translation"),
    ("title", "Translation Tool"),
    ("description", "Translate your text from any language, to any language."),
    ("unconfiguredErrorTitle", "Sorry, the translation tool is not ready yet."),
    (
        "unconfiguredErrorDescription",
        "Please configure the DeepL API key in the module settings to get started.",
    ),
    ("fieldLabelFrom", "Translate from:"),
    ("fieldLabelTo", "Translate to:"),
    ("fieldLabelYourText", "Your Text:"),
    ("fieldLabelTranslatedText", "Translated Text:"),
    ("buttonTranslate", "Translate"),
    ("serviceUsageTitle", "Translation Service Usage Information"),
    (
        "serviceUsageDescription",
        "Click the Refresh button to get translation service usage information",
    ),
    ("usageTableCharacterTitle", "Character Limit"),
    ("usageTableTranslatedTitle", "Characters Translated"),
    ("usageTableAvailableTitle", "Characters Available"),
    ("usageTableTotalTitle", "Total Usage"),
];

// ==================== Language Select Element ====================

const LANGUAGE_SELECT_ELEMENT_STRINGS: &[(&str, &str)] = &[
    ("ariaSelectedLanguageLabel", "Selected Language"),
    ("ariaLanguageSelectLabel", "Choose a language"),
    ("defaultLanguageOption", "%{DEFAULT_LANGUAGE} (default)"),
];

/// The bridge's own UI strings, written in English.
#[derive(Debug, Clone)]
pub struct BuiltinDefinitions {
    source_language_title: String,
}

impl BuiltinDefinitions {
    pub fn new(source_language_title: impl Into<String>) -> Self {
        Self {
            source_language_title: source_language_title.into(),
        }
    }

    fn table(context: &str) -> Option<&'static [(&'static str, &'static str)]> {
        match context {
            PAGE_EDITOR => Some(PAGE_EDITOR_STRINGS),
            TRANSLATION_TOOL => Some(TRANSLATION_TOOL_STRINGS),
            LANGUAGE_SELECT_ELEMENT => Some(LANGUAGE_SELECT_ELEMENT_STRINGS),
            _ => None,
        }
    }
}

impl StringDefinitions for BuiltinDefinitions {
    fn language_code(&self) -> &str {
        "EN"
    }

    fn contexts(&self) -> Vec<String> {
        [PAGE_EDITOR, TRANSLATION_TOOL, LANGUAGE_SELECT_ELEMENT]
            .iter()
            .map(|c| c.to_string())
            .collect()
    }

    fn strings(&self, context: &str) -> Option<StringMap> {
        let table = Self::table(context)?;
        Some(
            table
                .iter()
                .map(|(key, value)| {
                    (
                        key.to_string(),
                        value.replace(DEFAULT_LANGUAGE_PLACEHOLDER, &self.source_language_title),
                    )
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_context_has_strings() {
        let defs = BuiltinDefinitions::new("English");
        for context in defs.contexts() {
            let strings = defs.strings(&context).expect("Context should be defined");
            assert!(!strings.is_empty(), "{} has no strings", context);
            assert!(strings.values().all(|v| !v.trim().is_empty()));
        }
    }

    #[test]
    fn test_placeholder_is_substituted() {
        let defs = BuiltinDefinitions::new("Deutsch");
        let strings = defs.strings(PAGE_EDITOR).unwrap();
        assert_eq!(strings["translateTrigger"], "Translate from Deutsch");
        assert!(strings
            .values()
            .all(|v| !v.contains(DEFAULT_LANGUAGE_PLACEHOLDER)));
    }

    #[test]
    fn test_unknown_context() {
        let defs = BuiltinDefinitions::new("English");
        assert!(defs.strings("admin_dashboard").is_none());
    }

    #[test]
    fn test_keys_are_unique_per_context() {
        for table in [
            PAGE_EDITOR_STRINGS,
            TRANSLATION_TOOL_STRINGS,
            LANGUAGE_SELECT_ELEMENT_STRINGS,
        ] {
            let unique: std::collections::HashSet<_> = table.iter().map(|(k, _)| k).collect();
            assert_eq!(unique.len(), table.len());
        }
    }

    #[test]
    fn test_definitions_language_is_english() {
        assert_eq!(BuiltinDefinitions::new("English").language_code(), "EN");
    }
}
