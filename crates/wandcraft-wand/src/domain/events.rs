//! Domain events for the Wand context.
//!
//! Every wand mutation is recorded as one of these. Besides driving state
//! changes they double as the owner-facing notifications (`message`) and
//! the enqueued world effects (`SpellCast`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use wandcraft_core::event::{DomainEvent, EventMetadata};

use super::bindings::{BindingKind, BindingOrigin};
use super::ports::WandOwner;
use super::properties::{OverrideMap, PropertyKey, PropertyMap};

/// Emitted when a wand comes into existence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WandCreated {
    pub wand_id: Uuid,
    pub template_key: String,
    /// Upgrade path the wand starts on.
    pub path: Option<String>,
    /// Template spells bound at creation.
    pub spells: Vec<String>,
    /// Template brushes bound at creation.
    pub brushes: Vec<String>,
    /// Spells granted by the starting tier.
    pub granted_spells: Vec<String>,
    /// Brushes granted by the starting tier.
    pub granted_brushes: Vec<String>,
    /// Set when the wand is a copy of another.
    pub duplicated_from: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellAdded {
    pub wand_id: Uuid,
    pub spell: String,
    pub level: u32,
    pub origin: BindingOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellRemoved {
    pub wand_id: Uuid,
    pub spell: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushAdded {
    pub wand_id: Uuid,
    pub brush: String,
    pub origin: BindingOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrushRemoved {
    pub wand_id: Uuid,
    pub brush: String,
}

/// Emitted when an explicit add hits a tier-granted binding: membership is
/// unchanged but the binding now survives `unenchant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingPromoted {
    pub wand_id: Uuid,
    pub kind: BindingKind,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveSpellChanged {
    pub wand_id: Uuid,
    pub spell: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveBrushChanged {
    pub wand_id: Uuid,
    pub brush: Option<String>,
}

/// What moved the mana balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManaChangeReason {
    Regenerated,
    Charged,
    Set,
    Removed,
}

/// Emitted when the mana balance changes outside of a cast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManaChanged {
    pub wand_id: Uuid,
    /// Balance after the change.
    pub current: f32,
    pub reason: ManaChangeReason,
}

/// Emitted when a spell is invoked. The ability execution engine picks
/// this up and runs the effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellCast {
    pub wand_id: Uuid,
    pub spell: String,
    pub level: u32,
    /// Mana actually deducted.
    pub cost: f32,
    /// Balance after the cast.
    pub remaining: f32,
    /// Effective power multiplier at cast time.
    pub power: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideSet {
    pub wand_id: Uuid,
    pub property: PropertyKey,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideRemoved {
    pub wand_id: Uuid,
    pub property: PropertyKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverridesReplaced {
    pub wand_id: Uuid,
    pub overrides: OverrideMap,
}

/// Emitted when instance-stored property values change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertiesChanged {
    pub wand_id: Uuid,
    /// Only the values that changed.
    pub values: PropertyMap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockChanged {
    pub wand_id: Uuid,
    pub locked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerBound {
    pub wand_id: Uuid,
    pub owner: WandOwner,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerUnbound {
    pub wand_id: Uuid,
    pub previous: WandOwner,
}

/// Emitted when a wand moves one tier up its path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierAdvanced {
    pub wand_id: Uuid,
    pub path: String,
    pub from_tier: usize,
    pub to_tier: usize,
    pub tier_key: String,
    pub granted_spells: Vec<String>,
    pub granted_brushes: Vec<String>,
    /// Suppresses the owner notification.
    pub quiet: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathChanged {
    pub wand_id: Uuid,
    pub path: String,
    pub previous: Option<String>,
    pub granted_spells: Vec<String>,
    pub granted_brushes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WandUnenchanted {
    pub wand_id: Uuid,
    pub from_tier: usize,
    pub removed_spells: Vec<String>,
    pub removed_brushes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DamageRecorded {
    pub wand_id: Uuid,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WandEnchanted {
    pub wand_id: Uuid,
    pub levels: u64,
    /// Spell drawn from the next tier's optional pool, if any.
    pub granted_spell: Option<String>,
}

/// Emitted when another wand's bindings are absorbed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WandMerged {
    pub wand_id: Uuid,
    pub source_id: Uuid,
    /// Spells gained, with level suffixes.
    pub spells: Vec<String>,
    pub brushes: Vec<String>,
}

/// Event payload variants for the Wand context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WandEventKind {
    WandCreated(WandCreated),
    SpellAdded(SpellAdded),
    SpellRemoved(SpellRemoved),
    BrushAdded(BrushAdded),
    BrushRemoved(BrushRemoved),
    BindingPromoted(BindingPromoted),
    ActiveSpellChanged(ActiveSpellChanged),
    ActiveBrushChanged(ActiveBrushChanged),
    ManaChanged(ManaChanged),
    SpellCast(SpellCast),
    OverrideSet(OverrideSet),
    OverrideRemoved(OverrideRemoved),
    OverridesReplaced(OverridesReplaced),
    PropertiesChanged(PropertiesChanged),
    LockChanged(LockChanged),
    OwnerBound(OwnerBound),
    OwnerUnbound(OwnerUnbound),
    TierAdvanced(TierAdvanced),
    PathChanged(PathChanged),
    WandUnenchanted(WandUnenchanted),
    DamageRecorded(DamageRecorded),
    WandEnchanted(WandEnchanted),
    WandMerged(WandMerged),
}

impl WandEventKind {
    /// Routing name of the event.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::WandCreated(_) => "wand.created",
            Self::SpellAdded(_) => "wand.spell_added",
            Self::SpellRemoved(_) => "wand.spell_removed",
            Self::BrushAdded(_) => "wand.brush_added",
            Self::BrushRemoved(_) => "wand.brush_removed",
            Self::BindingPromoted(_) => "wand.binding_promoted",
            Self::ActiveSpellChanged(_) => "wand.active_spell_changed",
            Self::ActiveBrushChanged(_) => "wand.active_brush_changed",
            Self::ManaChanged(_) => "wand.mana_changed",
            Self::SpellCast(_) => "wand.spell_cast",
            Self::OverrideSet(_) => "wand.override_set",
            Self::OverrideRemoved(_) => "wand.override_removed",
            Self::OverridesReplaced(_) => "wand.overrides_replaced",
            Self::PropertiesChanged(_) => "wand.properties_changed",
            Self::LockChanged(_) => "wand.lock_changed",
            Self::OwnerBound(_) => "wand.owner_bound",
            Self::OwnerUnbound(_) => "wand.owner_unbound",
            Self::TierAdvanced(_) => "wand.tier_advanced",
            Self::PathChanged(_) => "wand.path_changed",
            Self::WandUnenchanted(_) => "wand.unenchanted",
            Self::DamageRecorded(_) => "wand.damage_recorded",
            Self::WandEnchanted(_) => "wand.enchanted",
            Self::WandMerged(_) => "wand.merged",
        }
    }
}

/// Domain event envelope for the Wand context.
#[derive(Debug, Clone, PartialEq)]
pub struct WandEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: WandEventKind,
}

impl WandEvent {
    /// Owner-facing notification text, if the event warrants one.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match &self.kind {
            WandEventKind::SpellAdded(e) if e.level > 1 => {
                Some(format!("Your wand now knows {} (level {}).", e.spell, e.level))
            }
            WandEventKind::SpellAdded(e) => Some(format!("Your wand now knows {}.", e.spell)),
            WandEventKind::SpellRemoved(e) => {
                Some(format!("{} was removed from your wand.", e.spell))
            }
            WandEventKind::BrushAdded(e) => Some(format!("Your wand gained the {} brush.", e.brush)),
            WandEventKind::BrushRemoved(e) => {
                Some(format!("The {} brush was removed from your wand.", e.brush))
            }
            WandEventKind::LockChanged(e) if e.locked => Some("Your wand is now locked.".into()),
            WandEventKind::LockChanged(_) => Some("Your wand is now unlocked.".into()),
            WandEventKind::OwnerBound(e) => Some(format!("This wand is now bound to {}.", e.owner.name)),
            WandEventKind::OwnerUnbound(_) => Some("This wand is no longer bound.".into()),
            WandEventKind::TierAdvanced(e) if !e.quiet => {
                Some(format!("Your wand has advanced to {}!", e.tier_key))
            }
            WandEventKind::PathChanged(e) => Some(format!("Your wand now follows the {} path.", e.path)),
            WandEventKind::WandUnenchanted(_) => Some("Your wand has been unenchanted.".into()),
            WandEventKind::WandEnchanted(e) => match &e.granted_spell {
                Some(spell) => Some(format!("Your wand absorbed {} levels and learned {spell}.", e.levels)),
                None => Some(format!("Your wand absorbed {} levels.", e.levels)),
            },
            WandEventKind::WandMerged(e) if !e.spells.is_empty() || !e.brushes.is_empty() => Some(
                format!(
                    "Your wand absorbed {} spells and {} brushes.",
                    e.spells.len(),
                    e.brushes.len()
                ),
            ),
            _ => None,
        }
    }
}

impl DomainEvent for WandEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("WandEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
