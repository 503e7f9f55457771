//! Query handlers for the Wand context.
//!
//! Queries load the wand snapshot and return read-only view DTOs.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;
use wandcraft_core::aggregate::AggregateRoot;
use wandcraft_core::error::DomainError;
use wandcraft_core::repository::SnapshotRepository;

use crate::application::command_handlers::load_wand;
use crate::domain::ports::{SpellCatalog, WandOwner};
use crate::domain::template::TemplateRegistry;

/// Read-only view of a wand.
#[derive(Debug, Serialize)]
pub struct WandView {
    pub wand_id: Uuid,
    pub template_key: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub mana: f32,
    pub mana_max: u32,
    pub mana_regeneration: u32,
    /// Upgrade path key, if any.
    pub path: Option<String>,
    /// Current tier key on that path.
    pub tier: Option<String>,
    /// Bound spells with level suffixes where above 1.
    pub spells: Vec<String>,
    pub brushes: Vec<String>,
    pub active_spell: Option<String>,
    pub active_brush: Option<String>,
    /// Raw override strings keyed by property name.
    pub overrides: BTreeMap<String, String>,
    pub locked: bool,
    pub bound: bool,
    pub owner: Option<WandOwner>,
    /// Current version (event count).
    pub version: i64,
}

/// Worth figures for trading screens.
#[derive(Debug, Serialize)]
pub struct WandWorthView {
    pub wand_id: Uuid,
    pub worth: u64,
    /// `None` when the wand cannot be traded.
    pub tradable_worth: Option<u64>,
}

/// Retrieves a wand by its ID.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no snapshot exists for the ID.
pub async fn get_wand_by_id(
    wand_id: Uuid,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandView, DomainError> {
    let wand = load_wand(wand_id, registry, repo).await?;
    Ok(WandView {
        wand_id: wand.id,
        template_key: wand.template_key().to_owned(),
        name: wand.name(),
        description: wand.description(),
        icon: wand.icon(),
        mana: wand.mana().current(),
        mana_max: wand.mana().maximum(),
        mana_regeneration: wand.mana().regeneration(),
        path: wand.path_key().map(str::to_owned),
        tier: wand.tier_key().map(str::to_owned),
        spells: wand.bindings().spell_keys(),
        brushes: wand.bindings().brush_keys(),
        active_spell: wand.active_spell().map(str::to_owned),
        active_brush: wand.active_brush().map(str::to_owned),
        overrides: wand
            .overrides()
            .iter()
            .map(|(key, value)| (key.as_str().to_owned(), value.clone()))
            .collect(),
        locked: wand.is_locked(),
        bound: wand.is_bound(),
        owner: wand.owner().cloned(),
        version: wand.version(),
    })
}

/// Returns the wand's human-readable description lines.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no snapshot exists for the ID.
pub async fn describe_wand(
    wand_id: Uuid,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<Vec<String>, DomainError> {
    Ok(load_wand(wand_id, registry, repo).await?.describe())
}

/// Computes the wand's worth against the catalog.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if no snapshot exists for the ID.
pub async fn get_wand_worth(
    wand_id: Uuid,
    catalog: &dyn SpellCatalog,
    registry: &Arc<TemplateRegistry>,
    repo: &dyn SnapshotRepository,
) -> Result<WandWorthView, DomainError> {
    let wand = load_wand(wand_id, registry, repo).await?;
    Ok(WandWorthView {
        wand_id: wand.id,
        worth: wand.worth(catalog),
        tradable_worth: wand.tradable_worth(catalog),
    })
}
