//! Collaborator contracts the wand consults but does not implement.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The actor a wand is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WandOwner {
    /// Stable actor identifier.
    pub id: Uuid,
    /// Display name used in notifications.
    pub name: String,
}

impl WandOwner {
    #[must_use]
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// Lookup into the ability execution engine's catalog.
///
/// Keys are base keys without a level suffix.
pub trait SpellCatalog: Send + Sync {
    /// Whether the spell key is known.
    fn has_spell(&self, key: &str) -> bool;

    /// Whether the brush key is known.
    fn has_brush(&self, key: &str) -> bool;

    /// Mana cost of one cast before reductions.
    fn base_cost(&self, key: &str) -> Option<f32>;

    /// Minimum caster level the spell is available at.
    fn min_level(&self, key: &str) -> Option<u32>;

    /// Economic worth contributed by binding the spell or brush.
    fn worth(&self, key: &str) -> u64;

    /// Every known spell key.
    fn spell_keys(&self) -> Vec<String>;
}

/// Permission gate queried while advancing along an upgrade path.
pub trait AdvancementPolicy: Send + Sync {
    /// Whether `owner` may not enter tier `next_tier` of `path`. An unbound
    /// wand is checked with `owner == None`.
    fn is_blocked(&self, owner: Option<&WandOwner>, path: &str, next_tier: &str) -> bool;
}

/// Policy that never blocks.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAdvancement;

impl AdvancementPolicy for OpenAdvancement {
    fn is_blocked(&self, _owner: Option<&WandOwner>, _path: &str, _next_tier: &str) -> bool {
        false
    }
}
