//! Command abstractions.

use uuid::Uuid;

/// Implemented by every command a handler accepts.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Stable command name, used in logs.
    fn command_type(&self) -> &'static str;

    /// Correlation ID carried onto every event the command produces.
    fn correlation_id(&self) -> Uuid;

    /// Aggregate the command targets.
    fn target_id(&self) -> Uuid;
}
