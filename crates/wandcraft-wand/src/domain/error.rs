//! Wand rule failures.

use std::fmt;

use thiserror::Error;
use wandcraft_core::error::DomainError;

use super::bindings::BindingKind;

/// Why two wands cannot be merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeConflict {
    /// The receiving wand is locked.
    TargetLocked,
    /// A wand cannot absorb itself.
    SameInstance,
    /// The donor is owner-bound or soul-bound.
    SourceBound,
    /// The donor is indestructible.
    SourceIndestructible,
    /// Both wands follow different upgrade paths.
    PathMismatch,
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::TargetLocked => "target wand is locked",
            Self::SameInstance => "a wand cannot be merged into itself",
            Self::SourceBound => "source wand is bound",
            Self::SourceIndestructible => "source wand is indestructible",
            Self::PathMismatch => "wands follow different upgrade paths",
        };
        f.write_str(text)
    }
}

/// Failures raised by the wand model.
///
/// The first group are expected, recoverable outcomes of an operation on a
/// usable wand. The rest surface while resolving templates, paths or input
/// and mean the request (or the loaded content) is unusable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WandError {
    #[error("wand is locked")]
    Locked,

    #[error("{kind} {key} is not bound to this wand")]
    NotBound { kind: BindingKind, key: String },

    #[error("not enough mana: {required} required, {available} available")]
    InsufficientResource { required: f32, available: f32 },

    #[error("wands cannot be merged: {0}")]
    IncompatibleMerge(MergeConflict),

    #[error("advancing to tier {tier} of path {path} is not permitted")]
    PolicyBlocked { path: String, tier: String },

    #[error("no active spell selected")]
    NoActiveSpell,

    #[error("unknown wand template: {0}")]
    UnknownTemplate(String),

    #[error("unknown upgrade path: {0}")]
    UnknownPath(String),

    #[error("unknown spell: {0}")]
    UnknownSpell(String),

    #[error("invalid property {name}: {reason}")]
    InvalidProperty { name: String, reason: String },

    #[error("invalid upgrade path {path}: {reason}")]
    InvalidPath { path: String, reason: String },
}

impl WandError {
    /// Stable, machine-readable name of the rule that tripped.
    #[must_use]
    pub fn rule(&self) -> &'static str {
        match self {
            Self::Locked => "locked",
            Self::NotBound { .. } => "not_bound",
            Self::InsufficientResource { .. } => "insufficient_resource",
            Self::IncompatibleMerge(_) => "incompatible_merge",
            Self::PolicyBlocked { .. } => "policy_blocked",
            Self::NoActiveSpell => "no_active_spell",
            Self::UnknownTemplate(_) => "unknown_template",
            Self::UnknownPath(_) => "unknown_path",
            Self::UnknownSpell(_) => "unknown_spell",
            Self::InvalidProperty { .. } => "invalid_property",
            Self::InvalidPath { .. } => "invalid_path",
        }
    }

    /// Whether this is an expected outcome on a usable wand rather than a
    /// resolution failure.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Locked
                | Self::NotBound { .. }
                | Self::InsufficientResource { .. }
                | Self::IncompatibleMerge(_)
                | Self::PolicyBlocked { .. }
                | Self::NoActiveSpell
        )
    }
}

impl From<WandError> for DomainError {
    fn from(err: WandError) -> Self {
        if err.is_recoverable() {
            DomainError::RuleViolation {
                rule: err.rule(),
                message: err.to_string(),
            }
        } else {
            DomainError::Validation(err.to_string())
        }
    }
}
