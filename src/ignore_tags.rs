//! Marks phrases that the provider must leave untranslated.
//!
//! Phrases are wrapped in a sentinel element that is sent to DeepL through the
//! `ignore_tags` parameter while XML tag handling is on, then stripped again
//! from the translated text.

use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};
use std::sync::OnceLock;

/// Element name used to fence off untranslatable spans
pub const SENTINEL_TAG: &str = "deepl-ignore";

const OPEN_TAG: &str = "<deepl-ignore>";
const CLOSE_TAG: &str = "</deepl-ignore>";

/// Compiled size limit for the phrase alternation
const MATCHER_SIZE_LIMIT: usize = 10 * (1 << 20);

static SENTINEL_SPAN_REGEX: OnceLock<Regex> = OnceLock::new();
static SENTINEL_TAG_REGEX: OnceLock<Regex> = OnceLock::new();

fn sentinel_span_regex() -> &'static Regex {
    SENTINEL_SPAN_REGEX.get_or_init(|| {
        Regex::new(r"(?s)<deepl-ignore>.*?</deepl-ignore>").expect("Invalid sentinel span regex")
    })
}

fn sentinel_tag_regex() -> &'static Regex {
    SENTINEL_TAG_REGEX
        .get_or_init(|| Regex::new(r"</?deepl-ignore>").expect("Invalid sentinel tag regex"))
}

/// One case-insensitive alternation over a set of literal phrases.
///
/// Longer phrases come first so that at any position the longest phrase wins.
#[derive(Debug, Clone)]
pub struct PhraseMarker {
    matcher: Option<Regex>,
}

impl PhraseMarker {
    /// # Errors
    /// `InvalidRequest` when the phrase list is too large to compile.
    pub fn new<S: AsRef<str>>(phrases: &[S]) -> Result<Self> {
        Self::with_size_limit(phrases, MATCHER_SIZE_LIMIT)
    }

    fn with_size_limit<S: AsRef<str>>(phrases: &[S], size_limit: usize) -> Result<Self> {
        let mut literals: Vec<&str> = phrases
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !p.trim().is_empty())
            .collect();

        if literals.is_empty() {
            return Ok(Self { matcher: None });
        }

        literals.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        literals.dedup();

        let pattern = literals
            .iter()
            .map(|p| regex::escape(p))
            .collect::<Vec<_>>()
            .join("|");

        let matcher = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .size_limit(size_limit)
            .build()
            .map_err(|e| {
                Error::InvalidRequest(format!(
                    "could not compile {} ignored phrases: {}",
                    literals.len(),
                    e
                ))
            })?;

        Ok(Self {
            matcher: Some(matcher),
        })
    }

    /// Wrap every occurrence of a phrase in the sentinel tag.
    ///
    /// Matching is literal and leftmost-first. Text already inside a sentinel
    /// span is copied through untouched.
    pub fn mark(&self, text: &str) -> String {
        let Some(matcher) = &self.matcher else {
            return text.to_string();
        };

        let mut out = String::with_capacity(text.len() + 32);
        let mut last = 0;

        for span in sentinel_span_regex().find_iter(text) {
            wrap_matches(&mut out, &text[last..span.start()], matcher);
            out.push_str(span.as_str());
            last = span.end();
        }
        wrap_matches(&mut out, &text[last..], matcher);

        out
    }
}

fn wrap_matches(out: &mut String, segment: &str, matcher: &Regex) {
    let mut last = 0;
    for found in matcher.find_iter(segment) {
        out.push_str(&segment[last..found.start()]);
        out.push_str(OPEN_TAG);
        out.push_str(found.as_str());
        out.push_str(CLOSE_TAG);
        last = found.end();
    }
    out.push_str(&segment[last..]);
}

/// Wrap every case-insensitive occurrence of each phrase in the sentinel tag.
pub fn mark<S: AsRef<str>>(text: &str, phrases: &[S]) -> Result<String> {
    Ok(PhraseMarker::new(phrases)?.mark(text))
}

/// Remove the sentinel open and close tags, keeping their content.
pub fn unmark(text: &str) -> String {
    sentinel_tag_regex().replace_all(text, "").into_owned()
}
