//! Persisted form of a wand.
//!
//! A snapshot is the full logical state. Loading resolves the template and
//! path references against the registry and re-derives mana capacity from
//! the effective properties.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::Wand;
use super::bindings::{BindingOrigin, BindingRegistry, SpellBinding};
use super::error::WandError;
use super::path::ProgressCounters;
use super::ports::WandOwner;
use super::properties::{OverrideMap, PropertyLayers, PropertyMap};
use super::template::TemplateRegistry;

/// Serializable wand state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WandSnapshot {
    /// Absent in filtered snapshots; a fresh id is assigned on load.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub template_key: String,
    #[serde(default)]
    pub properties: PropertyMap,
    #[serde(default)]
    pub overrides: OverrideMap,
    pub mana: f32,
    #[serde(default)]
    pub spells: BTreeMap<String, SpellBinding>,
    #[serde(default)]
    pub brushes: BTreeMap<String, BindingOrigin>,
    #[serde(default)]
    pub active_spell: Option<String>,
    #[serde(default)]
    pub active_brush: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub tier: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<WandOwner>,
    #[serde(default)]
    pub progress: ProgressCounters,
}

impl Wand {
    /// Captures the wand's state. A `filtered` snapshot omits the id and the
    /// owner, for templates and item exports.
    #[must_use]
    pub fn to_snapshot(&self, filtered: bool) -> WandSnapshot {
        WandSnapshot {
            id: (!filtered).then_some(self.id),
            template_key: self.template.key.clone(),
            properties: self.properties.instance().clone(),
            overrides: self.properties.overrides().clone(),
            mana: self.mana.current(),
            spells: self.bindings.spells().clone(),
            brushes: self.bindings.brushes().clone(),
            active_spell: self.bindings.active_spell().map(str::to_owned),
            active_brush: self.bindings.active_brush().map(str::to_owned),
            path: self.path_key().map(str::to_owned),
            tier: self.tier,
            owner: if filtered { None } else { self.owner.clone() },
            progress: self.progress.clone(),
        }
    }

    /// Rebuilds a wand at `version`. No events are recorded and the wand
    /// starts clean.
    ///
    /// # Errors
    ///
    /// Returns `WandError::UnknownTemplate` or `WandError::UnknownPath` if a
    /// reference no longer resolves, or `WandError::InvalidProperty` if a
    /// stored value has the wrong kind.
    pub fn from_snapshot(
        snapshot: WandSnapshot,
        version: i64,
        registry: Arc<TemplateRegistry>,
    ) -> Result<Self, WandError> {
        let template = registry.template(&snapshot.template_key)?;
        let path = snapshot
            .path
            .as_deref()
            .map(|key| registry.path(key))
            .transpose()?;
        let tier = path
            .as_ref()
            .map_or(0, |path| snapshot.tier.min(path.last_index()));

        let mut wand = Self::blank(snapshot.id.unwrap_or_else(Uuid::new_v4), registry, template, path);
        wand.version = version;
        wand.tier = tier;
        wand.properties = PropertyLayers::from_parts(snapshot.properties, snapshot.overrides)?;
        wand.bindings = BindingRegistry::from_parts(
            snapshot.spells,
            snapshot.brushes,
            snapshot.active_spell,
            snapshot.active_brush,
        );
        wand.owner = snapshot.owner;
        wand.progress = snapshot.progress;
        wand.sync_mana();
        wand.mana.set_current(snapshot.mana);
        Ok(wand)
    }

    /// Marks the current state as persisted. Returns whether it was dirty.
    pub fn save_state(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}
