//! Shared content for the domain tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use uuid::Uuid;
use wandcraft_test_support::FixedClock;

use super::aggregates::Wand;
use super::path::{PathTier, ProgressMetric, UpgradePath};
use super::ports::SpellCatalog;
use super::template::{TemplateRegistry, WandTemplate};

/// Catalog entry: base cost, minimum level, worth.
type SpellEntry = (f32, u32, u64);

#[derive(Debug)]
pub(crate) struct StubCatalog {
    spells: BTreeMap<String, SpellEntry>,
    brushes: BTreeMap<String, u64>,
}

impl SpellCatalog for StubCatalog {
    fn has_spell(&self, key: &str) -> bool {
        self.spells.contains_key(key)
    }

    fn has_brush(&self, key: &str) -> bool {
        self.brushes.contains_key(key)
    }

    fn base_cost(&self, key: &str) -> Option<f32> {
        self.spells.get(key).map(|entry| entry.0)
    }

    fn min_level(&self, key: &str) -> Option<u32> {
        self.spells.get(key).map(|entry| entry.1)
    }

    fn worth(&self, key: &str) -> u64 {
        self.spells
            .get(key)
            .map(|entry| entry.2)
            .or_else(|| self.brushes.get(key).copied())
            .unwrap_or(0)
    }

    fn spell_keys(&self) -> Vec<String> {
        self.spells.keys().cloned().collect()
    }
}

pub(crate) fn catalog() -> StubCatalog {
    let spells = [
        ("fire", (10.0, 1, 50)),
        ("heal", (20.0, 1, 40)),
        ("frost", (12.0, 1, 20)),
        ("blink", (15.0, 2, 30)),
        ("meteor", (50.0, 5, 200)),
    ];
    let brushes = [("digger", 10), ("glass", 5)];
    StubCatalog {
        spells: spells
            .into_iter()
            .map(|(key, entry)| (key.to_owned(), entry))
            .collect(),
        brushes: brushes
            .into_iter()
            .map(|(key, worth)| (key.to_owned(), worth))
            .collect(),
    }
}

/// `apprentice` path measured in casts: novice (0) → adept (3) → master (6).
pub(crate) fn apprentice_path() -> UpgradePath {
    let mut novice = PathTier::new("novice", 0);
    novice.brushes = vec!["glass".into()];
    let mut adept = PathTier::new("adept", 3);
    adept.spells = vec!["blink".into()];
    adept.mana_max_bonus = 20;
    adept.optional_spells = vec!["frost".into(), "meteor".into()];
    let mut master = PathTier::new("master", 6);
    master.spells = vec!["meteor".into()];
    master.mana_max_bonus = 30;
    UpgradePath::new(
        "apprentice",
        ProgressMetric::Casts,
        vec![novice, adept, master],
    )
    .unwrap()
}

pub(crate) fn registry() -> Arc<TemplateRegistry> {
    let mut beginner = WandTemplate::new("beginner");
    beginner.icon = "stick".into();
    beginner.spells = vec!["fire".into(), "heal".into()];
    beginner.mana_max = 100;
    beginner.mana_regeneration = 5;
    beginner.path = Some("apprentice".into());
    beginner.tags = vec!["starter".into()];

    let mut plain = WandTemplate::new("plain");
    plain.spells = vec!["fire".into()];
    plain.mana_max = 50;
    plain.mana_regeneration = 1;

    Arc::new(TemplateRegistry::from_parts(vec![beginner, plain], vec![apprentice_path()]).unwrap())
}

pub(crate) fn clock() -> FixedClock {
    FixedClock::standard()
}

/// A fresh wand with its creation event cleared.
pub(crate) fn wand(template_key: &str) -> Wand {
    use wandcraft_core::aggregate::AggregateRoot;

    let mut wand = Wand::from_template(
        Uuid::new_v4(),
        template_key,
        registry(),
        Uuid::new_v4(),
        &clock(),
    )
    .unwrap();
    wand.clear_uncommitted_events();
    wand
}
