//! Environment-driven content configuration.

use std::path::PathBuf;

use chrono::Duration;

use crate::error::ContentError;

const CONTENT_PATH_VAR: &str = "WANDCRAFT_CONTENT_PATH";
const RETENTION_DAYS_VAR: &str = "WANDCRAFT_LOST_WAND_RETENTION_DAYS";
const DEFAULT_RETENTION_DAYS: i64 = 30;

/// Where content lives and how long lost-wand records are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentConfig {
    pub content_path: PathBuf,
    pub lost_wand_retention: Duration,
}

impl ContentConfig {
    /// Reads `WANDCRAFT_CONTENT_PATH` (required) and
    /// `WANDCRAFT_LOST_WAND_RETENTION_DAYS` (defaults to 30).
    ///
    /// # Errors
    ///
    /// Returns `ContentError::MissingVar` if the content path is unset and
    /// `ContentError::InvalidVar` if the retention is not a positive number
    /// of days.
    pub fn from_env() -> Result<Self, ContentError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ContentError> {
        let content_path = lookup(CONTENT_PATH_VAR)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .ok_or(ContentError::MissingVar(CONTENT_PATH_VAR))?;

        let retention_days = match lookup(RETENTION_DAYS_VAR) {
            Some(raw) => raw
                .trim()
                .parse::<i64>()
                .ok()
                .filter(|days| (1..=36_500).contains(days))
                .ok_or(ContentError::InvalidVar {
                    name: RETENTION_DAYS_VAR,
                    value: raw,
                })?,
            None => DEFAULT_RETENTION_DAYS,
        };

        Ok(Self {
            content_path,
            lost_wand_retention: Duration::days(retention_days),
        })
    }
}
