//! Test repositories: mock `SnapshotRepository` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;
use wandcraft_core::error::DomainError;
use wandcraft_core::repository::{SnapshotRepository, StoredSnapshot};

/// A snapshot repository that serves a fixed snapshot on every load and
/// records every save and delete.
#[derive(Debug)]
pub struct RecordingSnapshotRepository {
    load_result: Mutex<Option<StoredSnapshot>>,
    saved: Mutex<Vec<(StoredSnapshot, i64)>>,
    deleted: Mutex<Vec<Uuid>>,
}

impl RecordingSnapshotRepository {
    /// Creates a repository that returns `load_result` from every load.
    #[must_use]
    pub fn new(load_result: Option<StoredSnapshot>) -> Self {
        Self {
            load_result: Mutex::new(load_result),
            saved: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    /// Returns every `(snapshot, expected_version)` pair passed to save.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn saved_snapshots(&self) -> Vec<(StoredSnapshot, i64)> {
        self.saved.lock().unwrap().clone()
    }

    /// Returns every aggregate ID passed to delete.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn deleted_ids(&self) -> Vec<Uuid> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotRepository for RecordingSnapshotRepository {
    async fn load_snapshot(
        &self,
        _aggregate_id: Uuid,
    ) -> Result<Option<StoredSnapshot>, DomainError> {
        Ok(self.load_result.lock().unwrap().clone())
    }

    async fn save_snapshot(
        &self,
        snapshot: StoredSnapshot,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        self.saved.lock().unwrap().push((snapshot, expected_version));
        Ok(())
    }

    async fn delete_snapshot(&self, aggregate_id: Uuid) -> Result<bool, DomainError> {
        self.deleted.lock().unwrap().push(aggregate_id);
        Ok(self.load_result.lock().unwrap().is_some())
    }
}

/// A snapshot repository that never finds anything and accepts every save.
#[derive(Debug)]
pub struct EmptySnapshotRepository;

#[async_trait]
impl SnapshotRepository for EmptySnapshotRepository {
    async fn load_snapshot(
        &self,
        _aggregate_id: Uuid,
    ) -> Result<Option<StoredSnapshot>, DomainError> {
        Ok(None)
    }

    async fn save_snapshot(
        &self,
        _snapshot: StoredSnapshot,
        _expected_version: i64,
    ) -> Result<(), DomainError> {
        Ok(())
    }

    async fn delete_snapshot(&self, _aggregate_id: Uuid) -> Result<bool, DomainError> {
        Ok(false)
    }
}

/// A snapshot repository that fails every call with an infrastructure error.
#[derive(Debug)]
pub struct FailingSnapshotRepository;

#[async_trait]
impl SnapshotRepository for FailingSnapshotRepository {
    async fn load_snapshot(
        &self,
        _aggregate_id: Uuid,
    ) -> Result<Option<StoredSnapshot>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn save_snapshot(
        &self,
        _snapshot: StoredSnapshot,
        _expected_version: i64,
    ) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn delete_snapshot(&self, _aggregate_id: Uuid) -> Result<bool, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
