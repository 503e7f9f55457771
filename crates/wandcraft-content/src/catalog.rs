//! Spell and brush catalog backed by loaded content.

use std::collections::BTreeMap;

use wandcraft_wand::domain::ports::SpellCatalog;

use crate::definitions::{BrushDefinition, SpellDefinition};

/// Catalog built from the `spells` and `brushes` sections.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredSpellCatalog {
    spells: BTreeMap<String, SpellDefinition>,
    brushes: BTreeMap<String, BrushDefinition>,
}

impl ConfiguredSpellCatalog {
    #[must_use]
    pub fn new(
        spells: BTreeMap<String, SpellDefinition>,
        brushes: BTreeMap<String, BrushDefinition>,
    ) -> Self {
        Self { spells, brushes }
    }

    /// Every known brush key.
    #[must_use]
    pub fn brush_keys(&self) -> Vec<String> {
        self.brushes.keys().cloned().collect()
    }
}

impl SpellCatalog for ConfiguredSpellCatalog {
    fn has_spell(&self, key: &str) -> bool {
        self.spells.contains_key(key)
    }

    fn has_brush(&self, key: &str) -> bool {
        self.brushes.contains_key(key)
    }

    fn base_cost(&self, key: &str) -> Option<f32> {
        self.spells.get(key).map(|spell| spell.cost)
    }

    fn min_level(&self, key: &str) -> Option<u32> {
        self.spells.get(key).map(|spell| spell.min_level)
    }

    fn worth(&self, key: &str) -> u64 {
        self.spells
            .get(key)
            .map(|spell| spell.worth)
            .or_else(|| self.brushes.get(key).map(|brush| brush.worth))
            .unwrap_or(0)
    }

    fn spell_keys(&self) -> Vec<String> {
        self.spells.keys().cloned().collect()
    }
}
