//! Lost-wand tracking.
//!
//! When the physical item of a bound, soul, undroppable or indestructible
//! wand disappears, a `LostWand` record is kept so the owner can recover
//! it. Records are removed when the wand turns up again or after the
//! repository's retention period.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;
use wandcraft_core::clock::Clock;
use wandcraft_core::error::DomainError;
use wandcraft_core::repository::SnapshotRepository;

use crate::application::command_handlers::load_wand;
use crate::domain::commands::{MarkWandLost, ReconcileFoundWand};
use crate::domain::lost::LostWand;
use crate::domain::template::TemplateRegistry;

/// Storage for lost-wand records, keyed by wand ID.
#[async_trait]
pub trait LostWandRepository: Send + Sync {
    /// Stores a record, replacing any earlier record for the same wand.
    async fn record(&self, lost: LostWand) -> Result<(), DomainError>;

    /// The record for a wand, if one is kept.
    async fn get(&self, wand_id: Uuid) -> Result<Option<LostWand>, DomainError>;

    /// Removes and returns the record for a wand.
    async fn remove(&self, wand_id: Uuid) -> Result<Option<LostWand>, DomainError>;

    /// Every record, oldest first.
    async fn list(&self) -> Result<Vec<LostWand>, DomainError>;

    /// Records belonging to one owner.
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<LostWand>, DomainError>;

    /// Drops records past the retention period and returns them.
    async fn expire(&self, now: DateTime<Utc>) -> Result<Vec<LostWand>, DomainError>;
}

/// Handles `MarkWandLost`. Wands that are not tracked when lost produce no
/// record and return `None`.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the wand does not exist.
#[instrument(skip_all, fields(wand_id = %command.wand_id, world = %command.position.world))]
pub async fn handle_mark_lost(
    command: &MarkWandLost,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    wands: &dyn SnapshotRepository,
    lost_wands: &dyn LostWandRepository,
) -> Result<Option<LostWand>, DomainError> {
    let wand = load_wand(command.wand_id, registry, wands).await?;
    if !wand.is_tracked_when_lost() {
        debug!("wand is not tracked when lost");
        return Ok(None);
    }
    let lost = wand.make_lost(command.position.clone(), clock);
    lost_wands.record(lost.clone()).await?;
    info!("lost wand recorded");
    Ok(Some(lost))
}

/// Handles `ReconcileFoundWand`: drops the lost record of a wand whose item
/// reappeared. The record is only removed when it belongs to the loaded
/// wand. Returns the removed record, if any.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the wand does not exist, or
/// `DomainError` if a repository fails.
#[instrument(skip_all, fields(wand_id = %command.wand_id))]
pub async fn handle_reconcile_found(
    command: &ReconcileFoundWand,
    registry: &Arc<TemplateRegistry>,
    wands: &dyn SnapshotRepository,
    lost_wands: &dyn LostWandRepository,
) -> Result<Option<LostWand>, DomainError> {
    let wand = load_wand(command.wand_id, registry, wands).await?;
    let Some(record) = lost_wands.get(command.wand_id).await? else {
        debug!("no lost record for wand");
        return Ok(None);
    };
    if !wand.is_lost(&record) {
        warn!(record_wand_id = %record.wand_id, "lost record belongs to another wand");
        return Ok(None);
    }
    let removed = lost_wands.remove(record.wand_id).await?;
    if removed.is_some() {
        info!("lost wand found");
    }
    Ok(removed)
}

/// Drops lost records past retention. Returns the expired records.
///
/// # Errors
///
/// Returns `DomainError` if the repository fails.
pub async fn handle_expire_lost_wands(
    clock: &dyn Clock,
    lost_wands: &dyn LostWandRepository,
) -> Result<Vec<LostWand>, DomainError> {
    let expired = lost_wands.expire(clock.now()).await?;
    if !expired.is_empty() {
        info!(count = expired.len(), "lost wand records expired");
    }
    Ok(expired)
}

/// Lost records for one owner, for a recovery menu.
///
/// # Errors
///
/// Returns `DomainError` if the repository fails.
pub async fn list_lost_wands(
    owner_id: Uuid,
    lost_wands: &dyn LostWandRepository,
) -> Result<Vec<LostWand>, DomainError> {
    lost_wands.list_for_owner(owner_id).await
}
