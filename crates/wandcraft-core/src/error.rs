//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Application-level error returned by command and query handlers.
#[derive(Debug, Error)]
pub enum DomainError {
    /// No aggregate is stored under the identifier.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The version the writer last saw.
        expected: i64,
        /// The version currently stored.
        actual: i64,
    },

    /// A domain rule rejected the operation. Recoverable; `rule` names the
    /// check that tripped so callers can render a message.
    #[error("{rule}: {message}")]
    RuleViolation {
        /// Stable, machine-readable rule name.
        rule: &'static str,
        /// Human-readable detail.
        message: String,
    },

    /// Input or stored data failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Storage or serialization failure.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns the rule name for `RuleViolation`, `None` otherwise.
    #[must_use]
    pub fn rule(&self) -> Option<&'static str> {
        match self {
            Self::RuleViolation { rule, .. } => Some(rule),
            _ => None,
        }
    }
}
