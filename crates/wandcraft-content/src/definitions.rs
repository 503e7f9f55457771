//! Serde shapes of the YAML content document.
//!
//! ```yaml
//! spells:
//!   fire: { cost: 10, worth: 50 }
//! brushes:
//!   glass: { worth: 5 }
//! paths:
//!   apprentice:
//!     metric: casts
//!     tiers:
//!       - { key: novice, threshold: 0 }
//!       - { key: adept, threshold: 3, spells: [blink], mana_max_bonus: 20 }
//! templates:
//!   beginner:
//!     spells: [fire]
//!     mana_max: 100
//!     path: apprentice
//!     properties: { name: Ember, power: 0.5 }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use wandcraft_wand::domain::path::ProgressMetric;
use wandcraft_wand::domain::properties::PropertyValue;

/// The whole content document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContentDocument {
    pub spells: BTreeMap<String, SpellDefinition>,
    pub brushes: BTreeMap<String, BrushDefinition>,
    pub paths: BTreeMap<String, PathDefinition>,
    pub templates: BTreeMap<String, TemplateDefinition>,
}

/// A catalog spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpellDefinition {
    /// Mana cost of one cast before reductions.
    pub cost: f32,
    #[serde(default = "default_min_level")]
    pub min_level: u32,
    #[serde(default)]
    pub worth: u64,
}

fn default_min_level() -> u32 {
    1
}

/// A catalog brush.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrushDefinition {
    pub worth: u64,
}

/// An upgrade path and its tiers, lowest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathDefinition {
    #[serde(default)]
    pub metric: ProgressMetric,
    pub tiers: Vec<TierDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierDefinition {
    pub key: String,
    #[serde(default)]
    pub threshold: u64,
    #[serde(default)]
    pub spells: Vec<String>,
    #[serde(default)]
    pub brushes: Vec<String>,
    #[serde(default)]
    pub mana_max_bonus: u32,
    #[serde(default)]
    pub optional_spells: Vec<String>,
}

/// A wand template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateDefinition {
    pub icon: String,
    pub spells: Vec<String>,
    pub brushes: Vec<String>,
    pub mana_max: u32,
    pub mana_regeneration: u32,
    pub path: Option<String>,
    pub tags: Vec<String>,
    /// Defaults for any other property, keyed by property name.
    pub properties: BTreeMap<String, RawPropertyValue>,
}

/// A property value as written in YAML, before it is checked against the
/// property's kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPropertyValue {
    Flag(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<String>),
}

impl From<RawPropertyValue> for PropertyValue {
    fn from(raw: RawPropertyValue) -> Self {
        match raw {
            RawPropertyValue::Flag(b) => Self::Flag(b),
            RawPropertyValue::Integer(i) => Self::Integer(i),
            RawPropertyValue::Float(f) => Self::Float(f),
            RawPropertyValue::Text(s) => Self::Text(s),
            RawPropertyValue::List(items) => Self::List(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_parses_all_sections() {
        // Arrange
        let yaml = r"
spells:
  fire: { cost: 10, worth: 50 }
brushes:
  glass: { worth: 5 }
paths:
  apprentice:
    metric: casts
    tiers:
      - { key: novice }
      - { key: adept, threshold: 3, optional_spells: [fire] }
templates:
  beginner:
    spells: [fire]
    mana_max: 100
    path: apprentice
    properties:
      power: 0.5
      locked: true
      tags: [starter, wooden]
";

        // Act
        let document: ContentDocument = serde_yaml::from_str(yaml).unwrap();

        // Assert
        assert_eq!(document.spells["fire"].min_level, 1);
        assert_eq!(document.brushes["glass"].worth, 5);
        let path = &document.paths["apprentice"];
        assert_eq!(path.metric, ProgressMetric::Casts);
        assert_eq!(path.tiers[1].threshold, 3);
        let template = &document.templates["beginner"];
        assert_eq!(template.path.as_deref(), Some("apprentice"));
        assert_eq!(template.properties["power"], RawPropertyValue::Float(0.5));
        assert_eq!(template.properties["locked"], RawPropertyValue::Flag(true));
        assert_eq!(
            template.properties["tags"],
            RawPropertyValue::List(vec!["starter".into(), "wooden".into()])
        );
    }

    #[test]
    fn test_unknown_template_field_is_rejected() {
        let yaml = "templates:\n  beginner:\n    colour: red\n";

        let result: Result<ContentDocument, _> = serde_yaml::from_str(yaml);

        assert!(result.is_err());
    }

    #[test]
    fn test_empty_document_is_valid() {
        let document: ContentDocument = serde_yaml::from_str("{}").unwrap();

        assert_eq!(document, ContentDocument::default());
    }
}
