//! Localization cache for the bridge's own UI strings.
//!
//! This module provides:
//! - Canonical string definitions per UI context ([`definitions`])
//! - Atomic key-value storage, on disk or in memory ([`store`])
//! - The cache itself, which guards the key-set invariant between base and
//!   translated entries ([`cache`])
//!
//! # Layout
//!
//! Every entry is addressed by a language key and a context. The reserved key
//! `base` holds the untranslated strings; host language ids hold translations.
//!
//! ```text
//! data/localization/
//! ├── base_page_editor.json
//! ├── base_translation_tool.json
//! ├── 1018_page_editor.json
//! └── 1018_translation_tool.json
//! ```

pub mod cache;
pub mod definitions;
pub mod store;

pub use cache::{validate_context, validate_language_key, LocalizationCache, BASE_KEY};
pub use definitions::{
    BuiltinDefinitions, StringDefinitions, LANGUAGE_SELECT_ELEMENT, PAGE_EDITOR, TRANSLATION_TOOL,
};
pub use store::{CacheKey, FsStore, LocalizationStore, MemoryStore, StringMap};
