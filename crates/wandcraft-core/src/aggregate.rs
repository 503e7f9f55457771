//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// An aggregate root whose state changes only by applying its own events.
///
/// Command methods validate, record an event and apply it straight away, so
/// the aggregate is always current. Recorded events stay in the uncommitted
/// buffer until the embedding layer has forwarded them.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate records and applies.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the number of events applied over the aggregate's lifetime.
    fn version(&self) -> i64;

    /// Applies an event to internal state. Must be infallible: every
    /// validation happens before the event is recorded.
    fn apply(&mut self, event: &Self::Event);

    /// Events recorded since the last `clear_uncommitted_events`.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Drops recorded events once they have been dispatched.
    fn clear_uncommitted_events(&mut self);
}
