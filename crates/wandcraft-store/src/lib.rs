//! Wandcraft: in-memory persistence adapters.
//!
//! Reference implementations of the snapshot and lost-wand repositories,
//! used by embedding code that keeps wand state in process and by tests.

pub mod lost_wand_repository;
pub mod memory_snapshot_repository;

pub use lost_wand_repository::{InMemoryLostWandRepository, RetentionPolicy};
pub use memory_snapshot_repository::InMemorySnapshotRepository;
