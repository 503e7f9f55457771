//! Content loading failures.

use std::path::PathBuf;

use thiserror::Error;
use wandcraft_core::error::DomainError;
use wandcraft_wand::domain::error::WandError;

/// Why a content document or its configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read content file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse content YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A reference or value inside the document does not check out.
    #[error("invalid content in {section} {key}: {reason}")]
    Invalid {
        section: &'static str,
        key: String,
        reason: String,
    },

    /// A domain constructor rejected a definition.
    #[error("invalid content in {section} {key}: {source}")]
    Rejected {
        section: &'static str,
        key: String,
        #[source]
        source: WandError,
    },

    #[error("missing environment variable {0}")]
    MissingVar(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    InvalidVar { name: &'static str, value: String },
}

impl ContentError {
    pub(crate) fn invalid(section: &'static str, key: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            section,
            key: key.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn rejected(section: &'static str, key: &str, source: WandError) -> Self {
        Self::Rejected {
            section,
            key: key.to_owned(),
            source,
        }
    }
}

impl From<ContentError> for DomainError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::Io { .. } => DomainError::Infrastructure(err.to_string()),
            _ => DomainError::Validation(err.to_string()),
        }
    }
}
