//! Host-facing command surface.
//!
//! The host sends one JSON object per call, tagged by `req`. Replies are a
//! JSON body plus an HTTP-like status; errors are always turned into
//! structured bodies and never escape [`dispatch`].

use crate::deepl::TranslateOptions;
use crate::error::{Error, Result};
use crate::languages::SelectElementOptions;
use crate::security;
use crate::service::{TranslationRequest, TranslationService};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Text to translate: one string or a list of segments.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Single(String),
    Many(Vec<String>),
}

impl Content {
    fn into_segments(self) -> Vec<String> {
        match self {
            Content::Single(text) => vec![text],
            Content::Many(segments) => segments,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "req", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    GetBootData {
        language_id: String,
    },
    Translate {
        source_language: String,
        target_language: String,
        content: Content,
        #[serde(default)]
        options: TranslateOptions,
    },
    Usage,
    TranslatableLanguages {
        #[serde(default = "default_true")]
        sort: bool,
        /// Drop the cached catalogs before answering
        #[serde(default)]
        refresh: bool,
    },
    CurrentLanguageCode {
        language_id: String,
    },
    AltLanguageTags {
        urls: BTreeMap<String, String>,
        #[serde(default)]
        exclude_ids: Vec<String>,
    },
    LanguageSelectElement {
        language_id: String,
        urls: BTreeMap<String, String>,
        #[serde(default)]
        options: SelectElementOptions,
    },
    LocalizeModule,
    ClearLocalizationCache {
        #[serde(default)]
        language_key: Option<String>,
    },
}

impl Command {
    /// Parse a raw request body. Unknown or malformed commands are invalid requests.
    pub fn from_json(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::InvalidRequest(e.to_string()))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::GetBootData { .. } => "getBootData",
            Command::Translate { .. } => "translate",
            Command::Usage => "usage",
            Command::TranslatableLanguages { .. } => "translatableLanguages",
            Command::CurrentLanguageCode { .. } => "currentLanguageCode",
            Command::AltLanguageTags { .. } => "altLanguageTags",
            Command::LanguageSelectElement { .. } => "languageSelectElement",
            Command::LocalizeModule => "localizeModule",
            Command::ClearLocalizationCache { .. } => "clearLocalizationCache",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandReply {
    pub status: u16,
    pub body: Value,
}

impl CommandReply {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn unauthorized() -> Self {
        Self {
            status: 401,
            body: json!({
                "error": "unauthorized",
                "message": "Missing or invalid API key",
                "httpStatus": 401,
            }),
        }
    }

    pub fn error(err: &Error) -> Self {
        let body = serde_json::to_value(err.to_body())
            .unwrap_or_else(|_| json!({"error": err.kind(), "message": err.to_string()}));

        Self {
            status: err.http_status(),
            body,
        }
    }
}

/// Run one command against the service.
pub async fn dispatch(service: &TranslationService, command: Command) -> CommandReply {
    let name = command.name();
    debug!("Dispatching {}", name);

    match execute(service, command).await {
        Ok(body) => CommandReply::ok(body),
        Err(e) => {
            warn!("Command {} failed: {}", name, e);
            CommandReply::error(&e)
        }
    }
}

/// Handle one raw request body from the host.
///
/// The API key is checked before the body is looked at; malformed bodies get
/// the same structured `invalid_request` reply as unknown commands.
pub async fn handle_request(
    service: &TranslationService,
    provided_key: Option<&str>,
    body: &[u8],
) -> CommandReply {
    if !security::is_authorized(service.config().bridge_api_key.as_deref(), provided_key) {
        warn!("Rejected command with missing or invalid API key");
        return CommandReply::unauthorized();
    }

    let command = serde_json::from_slice::<Value>(body)
        .map_err(|e| Error::InvalidRequest(format!("malformed JSON body: {}", e)))
        .and_then(Command::from_json);

    match command {
        Ok(command) => dispatch(service, command).await,
        Err(e) => {
            warn!("Rejected command: {}", e);
            CommandReply::error(&e)
        }
    }
}

async fn execute(service: &TranslationService, command: Command) -> Result<Value> {
    match command {
        Command::GetBootData { language_id } => {
            let boot = service.boot_data(&language_id).await?;
            Ok(serde_json::to_value(boot)?)
        }

        Command::Translate {
            source_language,
            target_language,
            content,
            options,
        } => {
            let single = matches!(content, Content::Single(_));
            let request = TranslationRequest {
                source_code: source_language,
                target_code: target_language,
                segments: content.into_segments(),
                ignored_phrases: options.ignored_phrases,
                extra_params: options.extra_params,
            };

            let result = service.translate(&request).await?;
            let texts = result.texts();
            let content = match (single, texts.as_slice()) {
                (true, [text]) => json!(text),
                _ => json!(texts),
            };

            Ok(json!({
                "content": content,
                "segments": result.segments,
            }))
        }

        Command::Usage => {
            let usage = service.usage().await?;
            Ok(json!({
                "charactersUsed": usage.characters_used,
                "characterLimit": usage.character_limit,
                "remaining": usage.remaining(),
                "percentUsed": usage.percent_used(),
            }))
        }

        Command::TranslatableLanguages { sort, refresh } => {
            if refresh {
                service.refresh_languages().await?;
            }
            let catalog = service.translatable_languages(sort).await?;
            Ok(serde_json::to_value(catalog)?)
        }

        Command::CurrentLanguageCode { language_id } => {
            let code = service.current_language_code(&language_id)?;
            Ok(json!({ "code": code }))
        }

        Command::AltLanguageTags { urls, exclude_ids } => Ok(json!({
            "tags": service.alt_language_tags(&urls, &exclude_ids),
        })),

        Command::LanguageSelectElement {
            language_id,
            urls,
            options,
        } => Ok(json!({
            "markup": service.language_select_element(&language_id, &urls, &options)?,
        })),

        Command::LocalizeModule => {
            let report = service.localize_all().await?;
            Ok(serde_json::to_value(report)?)
        }

        Command::ClearLocalizationCache { language_key } => {
            let cleared = service.clear_localizations(language_key.as_deref())?;
            Ok(json!({ "cleared": cleared }))
        }
    }
}
