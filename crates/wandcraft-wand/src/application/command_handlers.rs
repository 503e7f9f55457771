//! Command handlers for the Wand context.
//!
//! Each handler loads the wand snapshot, runs one domain operation, and
//! saves the new snapshot with optimistic concurrency when the operation
//! recorded events. Operations that change nothing are not persisted.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info, instrument};
use uuid::Uuid;
use wandcraft_core::aggregate::AggregateRoot;
use wandcraft_core::clock::Clock;
use wandcraft_core::error::DomainError;
use wandcraft_core::repository::{SnapshotRepository, StoredSnapshot};
use wandcraft_core::rng::DeterministicRng;

use crate::domain::aggregates::{CastReceipt, Wand};
use crate::domain::bindings::SpellKey;
use crate::domain::commands::{
    AddBrush, AddSpell, BindOwner, CastSpell, ChargeMana, CheckAndUpgrade, ConfigureWand,
    CreateWand, DuplicateWand, EnchantWand, FillSpells, MergeWands, RecordDamage,
    RegenerateMana, RemoveBrush, RemoveOverride, RemoveSpell, SetActiveBrush, SetActiveSpell,
    SetLocked, SetOverride, SetPath, UnbindOwner, UnenchantWand,
};
use crate::domain::error::WandError;
use crate::domain::events::WandEvent;
use crate::domain::ports::{AdvancementPolicy, SpellCatalog};
use crate::domain::progression::UpgradeOutcome;
use crate::domain::properties::{PropertyKey, PropertyMap};
use crate::domain::snapshot::WandSnapshot;
use crate::domain::template::TemplateRegistry;

/// What a handler did to a wand.
#[derive(Debug, Clone)]
pub struct WandCommandResult<T> {
    /// The wand the command ran against.
    pub wand_id: Uuid,
    /// Version after the command.
    pub version: i64,
    /// The operation's own return value.
    pub outcome: T,
    /// Events recorded by the command, for forwarding.
    pub events: Vec<WandEvent>,
    /// Owner-facing messages; empty when the wand hides messages.
    pub notifications: Vec<String>,
}

/// Loads a wand from its latest snapshot.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no snapshot exists,
/// `DomainError::Infrastructure` if the payload does not deserialize, or
/// `DomainError::Validation` if its template or path no longer resolves.
pub(crate) async fn load_wand(
    wand_id: Uuid,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<Wand, DomainError> {
    let stored = repo
        .load_snapshot(wand_id)
        .await?
        .ok_or(DomainError::AggregateNotFound(wand_id))?;
    let mut snapshot: WandSnapshot = serde_json::from_value(stored.payload).map_err(|e| {
        DomainError::Infrastructure(format!("snapshot deserialization failed: {e}"))
    })?;
    snapshot.id = Some(stored.aggregate_id);
    Ok(Wand::from_snapshot(snapshot, stored.version, Arc::clone(registry))?)
}

/// Saves the wand if it recorded events since it was loaded.
async fn persist(
    wand: &mut Wand,
    expected_version: i64,
    clock: &dyn Clock,
    repo: &dyn SnapshotRepository,
) -> Result<(), DomainError> {
    if wand.uncommitted_events().is_empty() {
        return Ok(());
    }
    let payload = serde_json::to_value(wand.to_snapshot(false)).map_err(|e| {
        DomainError::Infrastructure(format!("snapshot serialization failed: {e}"))
    })?;
    let snapshot = StoredSnapshot {
        aggregate_id: wand.id,
        version: wand.version(),
        payload,
        saved_at: clock.now(),
    };
    repo.save_snapshot(snapshot, expected_version).await?;
    wand.save_state();
    Ok(())
}

fn finish<T>(mut wand: Wand, outcome: T) -> WandCommandResult<T> {
    let events = wand.uncommitted_events().to_vec();
    wand.clear_uncommitted_events();
    let notifications = if wand.show_messages() {
        events.iter().filter_map(WandEvent::message).collect()
    } else {
        Vec::new()
    };
    WandCommandResult {
        wand_id: wand.id,
        version: wand.version(),
        outcome,
        events,
        notifications,
    }
}

/// Load, run `op`, persist, collect.
async fn execute<T>(
    wand_id: Uuid,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
    op: impl FnOnce(&mut Wand) -> Result<T, DomainError>,
) -> Result<WandCommandResult<T>, DomainError> {
    let mut wand = load_wand(wand_id, registry, repo).await?;
    let loaded_version = wand.version();
    let outcome = op(&mut wand)?;
    persist(&mut wand, loaded_version, clock, repo).await?;
    Ok(finish(wand, outcome))
}

/// Handles `CreateWand`: builds a wand from its template and stores the
/// first snapshot.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the template or its path is
/// unknown, or `DomainError::ConcurrencyConflict` if the id is taken.
#[instrument(skip_all, fields(wand_id = %command.wand_id, template = %command.template_key))]
pub async fn handle_create_wand(
    command: &CreateWand,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<()>, DomainError> {
    let mut wand = Wand::from_template(
        command.wand_id,
        &command.template_key,
        Arc::clone(registry),
        command.correlation_id,
        clock,
    )?;
    persist(&mut wand, 0, clock, repo).await?;
    Ok(finish(wand, ()))
}

/// Handles `DuplicateWand`: stores a copy of the wand under a new id.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the source does not exist.
#[instrument(skip_all, fields(wand_id = %command.wand_id, new_wand_id = %command.new_wand_id))]
pub async fn handle_duplicate_wand(
    command: &DuplicateWand,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<()>, DomainError> {
    let original = load_wand(command.wand_id, registry, repo).await?;
    let mut copy = original.duplicate(command.new_wand_id, command.correlation_id, clock);
    persist(&mut copy, 0, clock, repo).await?;
    debug!("wand duplicated");
    Ok(finish(copy, ()))
}

/// Handles `AddSpell`. The base key must exist in the catalog.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an unknown spell and
/// `DomainError::RuleViolation` if the wand is locked.
#[instrument(skip_all, fields(wand_id = %command.wand_id, spell = %command.spell))]
pub async fn handle_add_spell(
    command: &AddSpell,
    clock: &dyn Clock,
    catalog: &dyn SpellCatalog,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    let base = SpellKey::parse(&command.spell).base;
    if !catalog.has_spell(&base) {
        return Err(WandError::UnknownSpell(base).into());
    }
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.add_spell(&command.spell, command.correlation_id, clock)?)
    })
    .await
}

/// Handles `RemoveSpell`.
///
/// # Errors
///
/// Returns `DomainError::RuleViolation` if the wand is locked or the spell
/// is not bound.
#[instrument(skip_all, fields(wand_id = %command.wand_id, spell = %command.spell))]
pub async fn handle_remove_spell(
    command: &RemoveSpell,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<()>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.remove_spell(&command.spell, command.correlation_id, clock)?)
    })
    .await
}

/// Handles `AddBrush`. The brush must exist in the catalog.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an unknown brush and
/// `DomainError::RuleViolation` if the wand is locked.
#[instrument(skip_all, fields(wand_id = %command.wand_id, brush = %command.brush))]
pub async fn handle_add_brush(
    command: &AddBrush,
    clock: &dyn Clock,
    catalog: &dyn SpellCatalog,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    if !catalog.has_brush(&command.brush) {
        return Err(DomainError::Validation(format!(
            "unknown brush: {}",
            command.brush
        )));
    }
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.add_brush(&command.brush, command.correlation_id, clock)?)
    })
    .await
}

/// Handles `RemoveBrush`.
///
/// # Errors
///
/// Returns `DomainError::RuleViolation` if the wand is locked or the brush
/// is not bound.
#[instrument(skip_all, fields(wand_id = %command.wand_id, brush = %command.brush))]
pub async fn handle_remove_brush(
    command: &RemoveBrush,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<()>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.remove_brush(&command.brush, command.correlation_id, clock)?)
    })
    .await
}

/// Handles `SetActiveSpell`.
///
/// # Errors
///
/// Returns `DomainError::RuleViolation` if the wand is locked or the spell
/// is not bound.
#[instrument(skip_all, fields(wand_id = %command.wand_id))]
pub async fn handle_set_active_spell(
    command: &SetActiveSpell,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.set_active_spell(command.spell.as_deref(), command.correlation_id, clock)?)
    })
    .await
}

/// Handles `SetActiveBrush`.
///
/// # Errors
///
/// Returns `DomainError::RuleViolation` if the wand is locked or the brush
/// is not bound.
#[instrument(skip_all, fields(wand_id = %command.wand_id))]
pub async fn handle_set_active_brush(
    command: &SetActiveBrush,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.set_active_brush(command.brush.as_deref(), command.correlation_id, clock)?)
    })
    .await
}

/// Handles `CastSpell`: charges the effective cost and returns the receipt
/// the ability engine executes.
///
/// # Errors
///
/// Returns `DomainError::RuleViolation` for a missing binding, no active
/// spell or insufficient mana.
#[instrument(skip_all, fields(wand_id = %command.wand_id))]
pub async fn handle_cast_spell(
    command: &CastSpell,
    clock: &dyn Clock,
    catalog: &dyn SpellCatalog,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<CastReceipt>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        let receipt = match &command.spell {
            Some(spell) => wand.cast_spell(spell, catalog, command.correlation_id, clock)?,
            None => wand.cast(catalog, command.correlation_id, clock)?,
        };
        Ok(receipt)
    })
    .await
}

/// Handles `RegenerateMana`. Returns the amount gained.
///
/// # Errors
///
/// Returns `DomainError` if loading or saving fails.
#[instrument(skip_all, fields(wand_id = %command.wand_id, ticks = command.elapsed_ticks))]
pub async fn handle_regenerate_mana(
    command: &RegenerateMana,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<f32>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.regenerate(command.elapsed_ticks, command.correlation_id, clock))
    })
    .await
}

/// Handles `ChargeMana`. Returns the amount deducted.
///
/// # Errors
///
/// Returns `DomainError::RuleViolation` if the balance is too low.
#[instrument(skip_all, fields(wand_id = %command.wand_id, amount = command.amount))]
pub async fn handle_charge_mana(
    command: &ChargeMana,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<f32>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.charge_mana(command.amount, command.correlation_id, clock)?)
    })
    .await
}

/// Handles `CheckAndUpgrade`.
///
/// # Errors
///
/// Returns `DomainError::RuleViolation` if the policy blocks the next tier.
#[instrument(skip_all, fields(wand_id = %command.wand_id, quiet = command.quiet))]
pub async fn handle_check_and_upgrade(
    command: &CheckAndUpgrade,
    clock: &dyn Clock,
    catalog: &dyn SpellCatalog,
    policy: &dyn AdvancementPolicy,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<UpgradeOutcome>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.check_and_upgrade(command.quiet, catalog, policy, command.correlation_id, clock)?)
    })
    .await
}

/// Handles `MergeWands`: the target absorbs the source's bindings. With
/// `consume_source`, the source snapshot is deleted after a merge that
/// gained something.
///
/// # Errors
///
/// Returns `DomainError::RuleViolation` naming the merge conflict, or
/// `DomainError::AggregateNotFound` if either wand is missing.
#[instrument(skip_all, fields(wand_id = %command.wand_id, source_id = %command.source_id))]
pub async fn handle_merge_wands(
    command: &MergeWands,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    let source = load_wand(command.source_id, registry, repo).await?;
    let result = execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.add(&source, command.correlation_id, clock)?)
    })
    .await?;
    if result.outcome && command.consume_source {
        repo.delete_snapshot(command.source_id).await?;
        info!("merge source consumed");
    }
    Ok(result)
}

/// Handles `SetOverride`.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an unknown property or a value
/// that does not parse.
#[instrument(skip_all, fields(wand_id = %command.wand_id, property = %command.property))]
pub async fn handle_set_override(
    command: &SetOverride,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    let key: PropertyKey = command.property.parse().map_err(DomainError::from)?;
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.set_override(key, command.value.clone(), command.correlation_id, clock)?)
    })
    .await
}

/// Handles `RemoveOverride`.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an unknown property.
#[instrument(skip_all, fields(wand_id = %command.wand_id, property = %command.property))]
pub async fn handle_remove_override(
    command: &RemoveOverride,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    let key: PropertyKey = command.property.parse().map_err(DomainError::from)?;
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.remove_override(key, command.correlation_id, clock))
    })
    .await
}

/// Handles `SetLocked`.
///
/// # Errors
///
/// Returns `DomainError` if loading or saving fails.
#[instrument(skip_all, fields(wand_id = %command.wand_id, locked = command.locked))]
pub async fn handle_set_locked(
    command: &SetLocked,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.set_locked(command.locked, command.correlation_id, clock))
    })
    .await
}

/// Handles `BindOwner`.
///
/// # Errors
///
/// Returns `DomainError` if loading or saving fails.
#[instrument(skip_all, fields(wand_id = %command.wand_id, owner_id = %command.owner.id))]
pub async fn handle_bind_owner(
    command: &BindOwner,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.bind(command.owner.clone(), command.correlation_id, clock))
    })
    .await
}

/// Handles `UnbindOwner`.
///
/// # Errors
///
/// Returns `DomainError` if loading or saving fails.
#[instrument(skip_all, fields(wand_id = %command.wand_id))]
pub async fn handle_unbind_owner(
    command: &UnbindOwner,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.unbind(command.correlation_id, clock))
    })
    .await
}

/// Handles `FillSpells`.
///
/// # Errors
///
/// Returns `DomainError::RuleViolation` if the wand is locked.
#[instrument(skip_all, fields(wand_id = %command.wand_id, max_level = command.max_level))]
pub async fn handle_fill_spells(
    command: &FillSpells,
    clock: &dyn Clock,
    catalog: &dyn SpellCatalog,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.fill(command.max_level, catalog, command.correlation_id, clock)?)
    })
    .await
}

/// Parses raw `name → value` pairs into typed property values.
fn parse_properties(raw: &BTreeMap<String, String>) -> Result<PropertyMap, WandError> {
    raw.iter()
        .map(|(name, value)| {
            let key: PropertyKey = name.parse()?;
            Ok((key, key.parse_value(value)?))
        })
        .collect()
}

/// Handles `ConfigureWand`. Nothing is stored unless every property parses.
///
/// # Errors
///
/// Returns `DomainError::Validation` for an unknown property or bad value.
#[instrument(skip_all, fields(wand_id = %command.wand_id, upgrade_only = command.upgrade_only))]
pub async fn handle_configure_wand(
    command: &ConfigureWand,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    let values = parse_properties(&command.properties)?;
    execute(command.wand_id, clock, registry, repo, |wand| {
        let changed = if command.upgrade_only {
            wand.upgrade(values, command.correlation_id, clock)?
        } else {
            wand.configure(values, command.correlation_id, clock)?
        };
        Ok(changed)
    })
    .await
}

/// Handles `EnchantWand`.
///
/// The `Mutex` is locked only around the synchronous domain call.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the RNG mutex is poisoned.
#[instrument(skip_all, fields(wand_id = %command.wand_id, levels = command.levels))]
pub async fn handle_enchant_wand(
    command: &EnchantWand,
    clock: &dyn Clock,
    rng: &Mutex<dyn DeterministicRng + Send>,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        let mut rng_guard = rng
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
        Ok(wand.enchant(
            command.levels,
            command.add_spells,
            &mut *rng_guard,
            command.correlation_id,
            clock,
        ))
    })
    .await
}

/// Handles `UnenchantWand`.
///
/// # Errors
///
/// Returns `DomainError` if loading or saving fails.
#[instrument(skip_all, fields(wand_id = %command.wand_id))]
pub async fn handle_unenchant_wand(
    command: &UnenchantWand,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.unenchant(command.correlation_id, clock))
    })
    .await
}

/// Handles `SetPath`.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the path is unknown.
#[instrument(skip_all, fields(wand_id = %command.wand_id, path = %command.path))]
pub async fn handle_set_path(
    command: &SetPath,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.set_path(&command.path, command.correlation_id, clock)?)
    })
    .await
}

/// Handles `RecordDamage`.
///
/// # Errors
///
/// Returns `DomainError` if loading or saving fails.
#[instrument(skip_all, fields(wand_id = %command.wand_id, amount = command.amount))]
pub async fn handle_record_damage(
    command: &RecordDamage,
    clock: &dyn Clock,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandCommandResult<bool>, DomainError> {
    execute(command.wand_id, clock, registry, repo, |wand| {
        Ok(wand.damage_dealt(command.amount, command.correlation_id, clock))
    })
    .await
}

#[cfg(test)]
mod tests {
    use wandcraft_test_support::{
        EmptySnapshotRepository, FailingSnapshotRepository, RecordingSnapshotRepository,
        SequenceRng,
    };

    use super::*;
    use crate::domain::fixtures::{catalog, clock, registry, wand};
    use crate::domain::ports::OpenAdvancement;

    fn stored(wand: &Wand) -> StoredSnapshot {
        StoredSnapshot {
            aggregate_id: wand.id,
            version: wand.version(),
            payload: serde_json::to_value(wand.to_snapshot(false)).unwrap(),
            saved_at: clock().0,
        }
    }

    #[tokio::test]
    async fn test_handle_create_wand_saves_first_snapshot() {
        // Arrange
        let wand_id = Uuid::new_v4();
        let repo = RecordingSnapshotRepository::new(None);
        let command = CreateWand {
            correlation_id: Uuid::new_v4(),
            wand_id,
            template_key: "beginner".into(),
        };

        // Act
        let result = handle_create_wand(&command, &clock(), &registry(), &repo)
            .await
            .unwrap();

        // Assert
        assert_eq!(result.wand_id, wand_id);
        assert_eq!(result.version, 1);
        assert_eq!(result.events.len(), 1);
        let saved = repo.saved_snapshots();
        assert_eq!(saved.len(), 1);
        let (snapshot, expected_version) = &saved[0];
        assert_eq!(*expected_version, 0);
        assert_eq!(snapshot.aggregate_id, wand_id);
        assert_eq!(snapshot.version, 1);
        assert_eq!(snapshot.payload["template_key"], "beginner");
    }

    #[tokio::test]
    async fn test_handle_create_wand_with_unknown_template_fails() {
        let repo = RecordingSnapshotRepository::new(None);
        let command = CreateWand {
            correlation_id: Uuid::new_v4(),
            wand_id: Uuid::new_v4(),
            template_key: "ghost".into(),
        };

        let result = handle_create_wand(&command, &clock(), &registry(), &repo).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(repo.saved_snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_handle_add_spell_saves_with_loaded_version() {
        // Arrange
        let existing = wand("beginner");
        let repo = RecordingSnapshotRepository::new(Some(stored(&existing)));
        let command = AddSpell {
            correlation_id: Uuid::new_v4(),
            wand_id: existing.id,
            spell: "frost".into(),
        };

        // Act
        let result = handle_add_spell(&command, &clock(), &catalog(), &registry(), &repo)
            .await
            .unwrap();

        // Assert
        assert!(result.outcome);
        assert_eq!(result.version, existing.version() + 1);
        assert_eq!(result.notifications, vec!["Your wand now knows frost.".to_owned()]);
        let saved = repo.saved_snapshots();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].1, existing.version());
        assert_eq!(saved[0].0.payload["spells"]["frost"]["level"], 1);
    }

    #[tokio::test]
    async fn test_handle_add_spell_without_change_skips_save() {
        let existing = wand("beginner");
        let repo = RecordingSnapshotRepository::new(Some(stored(&existing)));
        let command = AddSpell {
            correlation_id: Uuid::new_v4(),
            wand_id: existing.id,
            spell: "fire".into(),
        };

        let result = handle_add_spell(&command, &clock(), &catalog(), &registry(), &repo)
            .await
            .unwrap();

        assert!(!result.outcome);
        assert!(result.events.is_empty());
        assert!(repo.saved_snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_handle_add_spell_rejects_unknown_spell() {
        let existing = wand("beginner");
        let repo = RecordingSnapshotRepository::new(Some(stored(&existing)));
        let command = AddSpell {
            correlation_id: Uuid::new_v4(),
            wand_id: existing.id,
            spell: "lightning".into(),
        };

        let result = handle_add_spell(&command, &clock(), &catalog(), &registry(), &repo).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
        assert!(repo.saved_snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_handle_add_spell_on_locked_wand_is_rule_violation() {
        let mut existing = wand("beginner");
        existing.set_locked(true, Uuid::new_v4(), &clock());
        let repo = RecordingSnapshotRepository::new(Some(stored(&existing)));
        let command = AddSpell {
            correlation_id: Uuid::new_v4(),
            wand_id: existing.id,
            spell: "frost".into(),
        };

        let result = handle_add_spell(&command, &clock(), &catalog(), &registry(), &repo).await;

        match result {
            Err(err) => assert_eq!(err.rule(), Some("locked")),
            Ok(other) => panic!("expected a locked rejection, got {other:?}"),
        }
        assert!(repo.saved_snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_handle_cast_spell_returns_receipt() {
        let mut existing = wand("beginner");
        existing
            .set_active_spell(Some("fire"), Uuid::new_v4(), &clock())
            .unwrap();
        let repo = RecordingSnapshotRepository::new(Some(stored(&existing)));
        let command = CastSpell {
            correlation_id: Uuid::new_v4(),
            wand_id: existing.id,
            spell: None,
        };

        let result = handle_cast_spell(&command, &clock(), &catalog(), &registry(), &repo)
            .await
            .unwrap();

        assert_eq!(result.outcome.spell, "fire");
        assert!((result.outcome.remaining - 90.0).abs() < f32::EPSILON);
        assert!(result.notifications.is_empty());
        assert_eq!(repo.saved_snapshots()[0].0.payload["progress"]["casts"], 1);
    }

    #[tokio::test]
    async fn test_handle_cast_spell_without_mana_is_rule_violation() {
        let mut existing = wand("beginner");
        existing.set_mana(1.0, Uuid::new_v4(), &clock());
        let repo = RecordingSnapshotRepository::new(Some(stored(&existing)));
        let command = CastSpell {
            correlation_id: Uuid::new_v4(),
            wand_id: existing.id,
            spell: Some("heal".into()),
        };

        let result = handle_cast_spell(&command, &clock(), &catalog(), &registry(), &repo).await;

        assert_eq!(result.err().and_then(|e| e.rule()), Some("insufficient_resource"));
        assert!(repo.saved_snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_handle_check_and_upgrade_on_fresh_wand_is_not_yet() {
        let existing = wand("beginner");
        let repo = RecordingSnapshotRepository::new(Some(stored(&existing)));
        let command = CheckAndUpgrade {
            correlation_id: Uuid::new_v4(),
            wand_id: existing.id,
            quiet: false,
        };

        let result = handle_check_and_upgrade(
            &command,
            &clock(),
            &catalog(),
            &OpenAdvancement,
            &registry(),
            &repo,
        )
        .await
        .unwrap();

        assert_eq!(
            result.outcome,
            UpgradeOutcome::NotYet {
                progress: 0,
                required: 3
            }
        );
        assert!(repo.saved_snapshots().is_empty());
    }

    #[tokio::test]
    async fn test_handle_merge_into_itself_is_rejected() {
        let existing = wand("beginner");
        let repo = RecordingSnapshotRepository::new(Some(stored(&existing)));
        let command = MergeWands {
            correlation_id: Uuid::new_v4(),
            wand_id: existing.id,
            source_id: existing.id,
            consume_source: true,
        };

        let result = handle_merge_wands(&command, &clock(), &registry(), &repo).await;

        assert_eq!(result.err().and_then(|e| e.rule()), Some("incompatible_merge"));
        assert!(repo.deleted_ids().is_empty());
    }

    #[tokio::test]
    async fn test_handle_set_override_rejects_unknown_property() {
        let existing = wand("beginner");
        let repo = RecordingSnapshotRepository::new(Some(stored(&existing)));
        let command = SetOverride {
            correlation_id: Uuid::new_v4(),
            wand_id: existing.id,
            property: "sparkle".into(),
            value: "1".into(),
        };

        let result = handle_set_override(&command, &clock(), &registry(), &repo).await;

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[tokio::test]
    async fn test_handle_configure_wand_hides_messages_when_disabled() {
        // Arrange
        let existing = wand("beginner");
        let repo = RecordingSnapshotRepository::new(Some(stored(&existing)));
        let command = ConfigureWand {
            correlation_id: Uuid::new_v4(),
            wand_id: existing.id,
            properties: BTreeMap::from([
                ("show_messages".to_owned(), "false".to_owned()),
                ("name".to_owned(), "Ember".to_owned()),
            ]),
            upgrade_only: false,
        };

        // Act
        let result = handle_configure_wand(&command, &clock(), &registry(), &repo)
            .await
            .unwrap();

        // Assert
        assert!(result.outcome);
        assert!(result.notifications.is_empty());
        let (snapshot, _) = &repo.saved_snapshots()[0];
        assert_eq!(snapshot.payload["properties"]["name"]["text"], "Ember");
    }

    #[tokio::test]
    async fn test_handle_enchant_wand_uses_rng() {
        let existing = wand("beginner");
        let repo = RecordingSnapshotRepository::new(Some(stored(&existing)));
        let rng: Mutex<SequenceRng> = Mutex::new(SequenceRng::new(vec![0]));
        let rng_ref: &Mutex<dyn DeterministicRng + Send> = &rng;
        let command = EnchantWand {
            correlation_id: Uuid::new_v4(),
            wand_id: existing.id,
            levels: 3,
            add_spells: true,
        };

        let result = handle_enchant_wand(&command, &clock(), rng_ref, &registry(), &repo)
            .await
            .unwrap();

        assert!(result.outcome);
        assert_eq!(
            result.notifications,
            vec!["Your wand absorbed 3 levels and learned frost.".to_owned()]
        );
    }

    #[tokio::test]
    async fn test_handle_missing_wand_is_not_found() {
        let wand_id = Uuid::new_v4();
        let command = SetLocked {
            correlation_id: Uuid::new_v4(),
            wand_id,
            locked: true,
        };

        let result = handle_set_locked(&command, &clock(), &registry(), &EmptySnapshotRepository).await;

        match result {
            Err(DomainError::AggregateNotFound(id)) => assert_eq!(id, wand_id),
            other => panic!("expected AggregateNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_handle_with_failing_repository_is_infrastructure_error() {
        let command = RecordDamage {
            correlation_id: Uuid::new_v4(),
            wand_id: Uuid::new_v4(),
            amount: 4.0,
        };

        let result = handle_record_damage(&command, &clock(), &registry(), &FailingSnapshotRepository).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }
}
