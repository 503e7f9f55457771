//! In-memory implementation of the `SnapshotRepository` trait.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;
use wandcraft_core::error::DomainError;
use wandcraft_core::repository::{SnapshotRepository, StoredSnapshot};

/// Snapshot store holding the latest snapshot per aggregate.
#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    snapshots: RwLock<HashMap<Uuid, StoredSnapshot>>,
}

impl InMemorySnapshotRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored aggregates.
    pub async fn len(&self) -> usize {
        self.snapshots.read().await.len()
    }

    /// Whether nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.snapshots.read().await.is_empty()
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn load_snapshot(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Option<StoredSnapshot>, DomainError> {
        Ok(self.snapshots.read().await.get(&aggregate_id).cloned())
    }

    async fn save_snapshot(
        &self,
        snapshot: StoredSnapshot,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let mut snapshots = self.snapshots.write().await;
        let actual = snapshots
            .get(&snapshot.aggregate_id)
            .map_or(0, |stored| stored.version);
        if actual != expected_version {
            warn!(
                aggregate_id = %snapshot.aggregate_id,
                expected = expected_version,
                actual,
                "snapshot version conflict"
            );
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: snapshot.aggregate_id,
                expected: expected_version,
                actual,
            });
        }
        if snapshot.version < expected_version {
            return Err(DomainError::Validation(format!(
                "snapshot version {} is behind stored version {expected_version}",
                snapshot.version
            )));
        }
        debug!(
            aggregate_id = %snapshot.aggregate_id,
            version = snapshot.version,
            "snapshot saved"
        );
        snapshots.insert(snapshot.aggregate_id, snapshot);
        Ok(())
    }

    async fn delete_snapshot(&self, aggregate_id: Uuid) -> Result<bool, DomainError> {
        let removed = self.snapshots.write().await.remove(&aggregate_id).is_some();
        if removed {
            debug!(%aggregate_id, "snapshot deleted");
        }
        Ok(removed)
    }
}
