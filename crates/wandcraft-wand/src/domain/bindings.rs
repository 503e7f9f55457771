//! Binding registry: bound spells and brushes, their provenance, and the
//! active selections.
//!
//! The registry itself knows nothing about locks; the `Wand` checks the lock
//! before touching it.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::WandError;

/// Whether a binding is a spell or a brush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Spell,
    Brush,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spell => f.write_str("spell"),
            Self::Brush => f.write_str("brush"),
        }
    }
}

/// How a binding got onto the wand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingOrigin {
    /// Part of the template's default set.
    Template,
    /// Added explicitly (add, fill, merge).
    Manual,
    /// Granted by an upgrade tier or enchantment; stripped by `unenchant`.
    TierGranted,
}

impl BindingOrigin {
    /// Combines an existing origin with an incoming one. Anything that is
    /// not tier-granted wins, so a reset never strips an explicit binding.
    #[must_use]
    pub fn merge(self, incoming: Self) -> Self {
        match (self, incoming) {
            (Self::TierGranted, other) => other,
            (existing, _) => existing,
        }
    }
}

/// A spell key with an optional level suffix: `fire` or `fire|3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellKey {
    pub base: String,
    pub level: u32,
}

impl SpellKey {
    /// Parses `base` or `base|level`. Missing, zero or malformed levels
    /// read as 1.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let (base, level) = match raw.split_once('|') {
            Some((base, level)) => (base, level.trim().parse::<u32>().unwrap_or(1).max(1)),
            None => (raw, 1),
        };
        Self {
            base: base.trim().to_owned(),
            level,
        }
    }
}

impl fmt::Display for SpellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.level > 1 {
            write!(f, "{}|{}", self.base, self.level)
        } else {
            f.write_str(&self.base)
        }
    }
}

/// A bound spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellBinding {
    pub level: u32,
    pub origin: BindingOrigin,
}

/// What inserting a binding would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingChange {
    Added,
    LevelRaised,
    OriginPromoted,
    Unchanged,
}

impl BindingChange {
    /// Whether the change alters state.
    #[must_use]
    pub fn is_change(self) -> bool {
        self != Self::Unchanged
    }
}

/// Bound spells and brushes with at most one active of each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BindingRegistry {
    spells: BTreeMap<String, SpellBinding>,
    brushes: BTreeMap<String, BindingOrigin>,
    active_spell: Option<String>,
    active_brush: Option<String>,
}

impl BindingRegistry {
    /// Rebuilds a registry from stored parts. Active keys that are not bound
    /// are dropped.
    #[must_use]
    pub fn from_parts(
        spells: BTreeMap<String, SpellBinding>,
        brushes: BTreeMap<String, BindingOrigin>,
        active_spell: Option<String>,
        active_brush: Option<String>,
    ) -> Self {
        let active_spell = active_spell.filter(|key| spells.contains_key(key));
        let active_brush = active_brush.filter(|key| brushes.contains_key(key));
        Self {
            spells,
            brushes,
            active_spell,
            active_brush,
        }
    }

    /// What `insert_spell` would do, without doing it.
    #[must_use]
    pub fn spell_change(&self, key: &SpellKey, origin: BindingOrigin) -> BindingChange {
        match self.spells.get(&key.base) {
            None => BindingChange::Added,
            Some(existing) if key.level > existing.level => BindingChange::LevelRaised,
            Some(existing) if existing.origin.merge(origin) != existing.origin => {
                BindingChange::OriginPromoted
            }
            Some(_) => BindingChange::Unchanged,
        }
    }

    /// What `insert_brush` would do, without doing it.
    #[must_use]
    pub fn brush_change(&self, key: &str, origin: BindingOrigin) -> BindingChange {
        match self.brushes.get(key) {
            None => BindingChange::Added,
            Some(existing) if existing.merge(origin) != *existing => BindingChange::OriginPromoted,
            Some(_) => BindingChange::Unchanged,
        }
    }

    /// Binds a spell, raising its level or promoting its origin if already
    /// bound. Never lowers a level.
    pub fn insert_spell(&mut self, key: &SpellKey, origin: BindingOrigin) -> BindingChange {
        let change = self.spell_change(key, origin);
        match self.spells.get_mut(&key.base) {
            Some(existing) => {
                existing.level = existing.level.max(key.level);
                existing.origin = existing.origin.merge(origin);
            }
            None => {
                self.spells.insert(
                    key.base.clone(),
                    SpellBinding {
                        level: key.level,
                        origin,
                    },
                );
            }
        }
        change
    }

    /// Binds a brush, promoting its origin if already bound.
    pub fn insert_brush(&mut self, key: &str, origin: BindingOrigin) -> BindingChange {
        let change = self.brush_change(key, origin);
        let entry = self.brushes.entry(key.to_owned()).or_insert(origin);
        *entry = entry.merge(origin);
        change
    }

    /// Unbinds a spell, clearing the active selection if it pointed at it.
    ///
    /// # Errors
    ///
    /// Returns `WandError::NotBound` if the spell is not bound.
    pub fn remove_spell(&mut self, base: &str) -> Result<SpellBinding, WandError> {
        let removed = self.spells.remove(base).ok_or_else(|| WandError::NotBound {
            kind: BindingKind::Spell,
            key: base.to_owned(),
        })?;
        if self.active_spell.as_deref() == Some(base) {
            self.active_spell = None;
        }
        Ok(removed)
    }

    /// Unbinds a brush, clearing the active selection if it pointed at it.
    ///
    /// # Errors
    ///
    /// Returns `WandError::NotBound` if the brush is not bound.
    pub fn remove_brush(&mut self, key: &str) -> Result<BindingOrigin, WandError> {
        let removed = self.brushes.remove(key).ok_or_else(|| WandError::NotBound {
            kind: BindingKind::Brush,
            key: key.to_owned(),
        })?;
        if self.active_brush.as_deref() == Some(key) {
            self.active_brush = None;
        }
        Ok(removed)
    }

    /// Points the active spell at a bound spell, or clears it.
    ///
    /// # Errors
    ///
    /// Returns `WandError::NotBound` if the spell is not bound.
    pub fn set_active_spell(&mut self, base: Option<&str>) -> Result<(), WandError> {
        if let Some(key) = base {
            if !self.spells.contains_key(key) {
                return Err(WandError::NotBound {
                    kind: BindingKind::Spell,
                    key: key.to_owned(),
                });
            }
        }
        self.active_spell = base.map(str::to_owned);
        Ok(())
    }

    /// Points the active brush at a bound brush, or clears it.
    ///
    /// # Errors
    ///
    /// Returns `WandError::NotBound` if the brush is not bound.
    pub fn set_active_brush(&mut self, key: Option<&str>) -> Result<(), WandError> {
        if let Some(key) = key {
            if !self.brushes.contains_key(key) {
                return Err(WandError::NotBound {
                    kind: BindingKind::Brush,
                    key: key.to_owned(),
                });
            }
        }
        self.active_brush = key.map(str::to_owned);
        Ok(())
    }

    /// Keys of every tier-granted spell and brush.
    #[must_use]
    pub fn tier_granted(&self) -> (Vec<String>, Vec<String>) {
        let spells = self
            .spells
            .iter()
            .filter(|(_, binding)| binding.origin == BindingOrigin::TierGranted)
            .map(|(key, _)| key.clone())
            .collect();
        let brushes = self
            .brushes
            .iter()
            .filter(|(_, origin)| **origin == BindingOrigin::TierGranted)
            .map(|(key, _)| key.clone())
            .collect();
        (spells, brushes)
    }

    /// True if the spell is bound at the requested level or higher.
    #[must_use]
    pub fn has_spell(&self, raw: &str) -> bool {
        let key = SpellKey::parse(raw);
        self.spells
            .get(&key.base)
            .is_some_and(|binding| binding.level >= key.level)
    }

    #[must_use]
    pub fn has_brush(&self, key: &str) -> bool {
        self.brushes.contains_key(key)
    }

    /// Level of a bound spell.
    #[must_use]
    pub fn spell_level(&self, raw: &str) -> Option<u32> {
        self.spells
            .get(&SpellKey::parse(raw).base)
            .map(|binding| binding.level)
    }

    #[must_use]
    pub fn spell(&self, base: &str) -> Option<&SpellBinding> {
        self.spells.get(base)
    }

    #[must_use]
    pub fn brush_origin(&self, key: &str) -> Option<BindingOrigin> {
        self.brushes.get(key).copied()
    }

    /// Bound spells, sorted by key.
    #[must_use]
    pub fn spells(&self) -> &BTreeMap<String, SpellBinding> {
        &self.spells
    }

    /// Bound brushes, sorted by key.
    #[must_use]
    pub fn brushes(&self) -> &BTreeMap<String, BindingOrigin> {
        &self.brushes
    }

    /// Bound spells rendered as keys with level suffixes.
    #[must_use]
    pub fn spell_keys(&self) -> Vec<String> {
        self.spells
            .iter()
            .map(|(base, binding)| {
                SpellKey {
                    base: base.clone(),
                    level: binding.level,
                }
                .to_string()
            })
            .collect()
    }

    #[must_use]
    pub fn brush_keys(&self) -> Vec<String> {
        self.brushes.keys().cloned().collect()
    }

    #[must_use]
    pub fn active_spell(&self) -> Option<&str> {
        self.active_spell.as_deref()
    }

    #[must_use]
    pub fn active_brush(&self) -> Option<&str> {
        self.active_brush.as_deref()
    }
}
