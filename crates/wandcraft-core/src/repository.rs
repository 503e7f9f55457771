//! Snapshot repository abstraction.
//!
//! Aggregates are persisted as full-state snapshots: an opaque JSON payload
//! tagged with the aggregate version. How the payload reaches disk (or an
//! item's data blob) is up to the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DomainError;

/// Stored representation of an aggregate snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    /// Aggregate this snapshot belongs to.
    pub aggregate_id: Uuid,
    /// Aggregate version captured by the snapshot.
    pub version: i64,
    /// Serialized aggregate state.
    pub payload: serde_json::Value,
    /// When the snapshot was taken.
    pub saved_at: DateTime<Utc>,
}

/// Repository for loading and saving aggregate snapshots.
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Loads the latest snapshot for an aggregate, if any.
    async fn load_snapshot(&self, aggregate_id: Uuid)
    -> Result<Option<StoredSnapshot>, DomainError>;

    /// Stores a snapshot with optimistic concurrency. `expected_version` is
    /// the version the caller loaded, or `0` for a new aggregate.
    async fn save_snapshot(
        &self,
        snapshot: StoredSnapshot,
        expected_version: i64,
    ) -> Result<(), DomainError>;

    /// Removes an aggregate's snapshot. Returns whether one existed.
    async fn delete_snapshot(&self, aggregate_id: Uuid) -> Result<bool, DomainError>;
}
