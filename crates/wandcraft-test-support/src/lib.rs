//! Shared test mocks and utilities for the Wandcraft engine.

mod clock;
mod repository;
mod rng;
mod telemetry;

pub use clock::FixedClock;
pub use repository::{EmptySnapshotRepository, FailingSnapshotRepository, RecordingSnapshotRepository};
pub use rng::{MockRng, SequenceRng};
pub use telemetry::init_tracing;
