//! Error taxonomy shared by every layer of the bridge.
//!
//! Provider failures keep their numeric HTTP status next to a fixed
//! classification so the host UI can render one message per failure class.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::service::ReadinessState;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse class of a provider failure, derived only from the HTTP status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    BadRequest,
    Forbidden,
    NotFound,
    PayloadTooLarge,
    RateLimited,
    QuotaExceeded,
    Unavailable,
    InternalError,
    Unknown,
}

impl Classification {
    /// Static status-code table. No heuristics on the body.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::BadRequest,
            401 | 403 => Self::Forbidden,
            404 => Self::NotFound,
            413 => Self::PayloadTooLarge,
            429 => Self::RateLimited,
            456 => Self::QuotaExceeded,
            500 => Self::InternalError,
            503 => Self::Unavailable,
            _ => Self::Unknown,
        }
    }

    /// User-facing message for this class
    pub fn message(&self) -> &'static str {
        match self {
            Self::BadRequest => "Bad request. Please check the error message and your parameters.",
            Self::Forbidden => {
                "The DeepL API key in use is invalid or the associated account is not current."
            }
            Self::NotFound => "The requested resource could not be found.",
            Self::PayloadTooLarge => "The amount of content is too large to translate.",
            Self::RateLimited => "Too many requests. Please wait and try again in a few moments.",
            Self::QuotaExceeded => {
                "The translation character limit for this billing period has been reached. \
                 Please review your DeepL account for more information."
            }
            Self::Unavailable => {
                "There was an error communicating with the translation service, please try again later."
            }
            Self::InternalError => {
                "The translation service may be experiencing errors or is undergoing maintenance. \
                 Please try again later."
            }
            Self::Unknown => "An unknown error has occurred.",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("translation provider error (HTTP {status}): {classification}")]
    Provider {
        status: u16,
        classification: Classification,
    },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("translation service is not ready (state: {state})")]
    NotReady { state: ReadinessState },

    #[error(
        "translated strings for '{language_key}' / '{context}' do not match the base keys \
         (missing: {missing:?}, unexpected: {unexpected:?})"
    )]
    CacheConsistency {
        language_key: String,
        context: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("invalid or unconfigured language: {0}")]
    InvalidLanguage(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unexpected response from translation provider: {0}")]
    UnexpectedResponse(String),

    #[error("localization storage error: {0}")]
    Storage(#[from] std::io::Error),
}

impl Error {
    /// Build a provider error from a raw HTTP status
    pub fn provider(status: u16) -> Self {
        Error::Provider {
            status,
            classification: Classification::from_status(status),
        }
    }

    /// Timeouts and connection failures surface as an unavailable upstream.
    pub fn unavailable() -> Self {
        Error::Provider {
            status: 503,
            classification: Classification::Unavailable,
        }
    }

    pub fn classification(&self) -> Option<Classification> {
        match self {
            Error::Provider { classification, .. } => Some(*classification),
            _ => None,
        }
    }

    /// HTTP-like status relayed to the host alongside the error body.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Provider { status, .. } => *status,
            Error::Configuration(_) | Error::NotReady { .. } => 503,
            Error::InvalidLanguage(_) | Error::InvalidRequest(_) => 400,
            Error::CacheConsistency { .. } => 409,
            Error::UnexpectedResponse(_) => 502,
            Error::Storage(_) => 500,
        }
    }

    /// Short machine-readable kind used in serialized error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Provider { .. } => "provider",
            Error::Configuration(_) | Error::NotReady { .. } => "not_configured",
            Error::CacheConsistency { .. } => "cache_consistency",
            Error::InvalidLanguage(_) => "invalid_language",
            Error::InvalidRequest(_) => "invalid_request",
            Error::UnexpectedResponse(_) => "unexpected_response",
            Error::Storage(_) => "storage",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        let message = match self {
            Error::Provider { classification, .. } => classification.message().to_string(),
            other => other.to_string(),
        };

        ErrorBody {
            error: self.kind(),
            message,
            http_status: self.http_status(),
            classification: self.classification(),
            state: match self {
                Error::NotReady { state } => Some(*state),
                _ => None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Storage(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

/// Serializable view of an [`Error`], safe to hand back to the host UI.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub http_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<ReadinessState>,
}
