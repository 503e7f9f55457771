//! Content loading and validation.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};
use wandcraft_wand::domain::bindings::SpellKey;
use wandcraft_wand::domain::path::{PathTier, UpgradePath};
use wandcraft_wand::domain::ports::SpellCatalog;
use wandcraft_wand::domain::properties::{PropertyKey, PropertyMap};
use wandcraft_wand::domain::template::{TemplateRegistry, WandTemplate};

use crate::catalog::ConfiguredSpellCatalog;
use crate::definitions::{ContentDocument, PathDefinition, TemplateDefinition};
use crate::error::ContentError;

/// Everything the wand model needs from a validated content document.
#[derive(Debug, Clone)]
pub struct ContentBundle {
    pub registry: Arc<TemplateRegistry>,
    pub catalog: ConfiguredSpellCatalog,
    /// Hex SHA-256 of the source text.
    pub content_hash: String,
}

impl ContentBundle {
    /// Reads and validates a content file.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Io` if the file cannot be read, otherwise the
    /// errors of [`ContentBundle::from_yaml_str`].
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn load(path: &Path) -> Result<Self, ContentError> {
        let source = std::fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }

    /// Parses and validates a content document.
    ///
    /// # Errors
    ///
    /// Returns `ContentError::Yaml` on malformed YAML or unknown fields, and
    /// `ContentError::Invalid` / `ContentError::Rejected` when a reference
    /// does not resolve, a property name or value is wrong, or a path's
    /// tiers are out of order.
    pub fn from_yaml_str(source: &str) -> Result<Self, ContentError> {
        let document: ContentDocument = serde_yaml::from_str(source)?;
        let content_hash = hash(source);

        for (key, spell) in &document.spells {
            if !spell.cost.is_finite() || spell.cost < 0.0 {
                return Err(ContentError::invalid(
                    "spells",
                    key,
                    format!("cost must be a non-negative number, got {}", spell.cost),
                ));
            }
        }
        let catalog = ConfiguredSpellCatalog::new(document.spells, document.brushes);

        let paths = document
            .paths
            .into_iter()
            .map(|(key, definition)| build_path(&key, definition, &catalog))
            .collect::<Result<Vec<_>, _>>()?;
        let templates = document
            .templates
            .into_iter()
            .map(|(key, definition)| build_template(key, definition, &catalog))
            .collect::<Result<Vec<_>, _>>()?;
        let (template_count, path_count) = (templates.len(), paths.len());

        let known_paths: BTreeSet<&str> = paths.iter().map(|path| path.key.as_str()).collect();
        for template in &templates {
            if let Some(path) = template.path.as_deref() {
                if !known_paths.contains(path) {
                    return Err(ContentError::invalid(
                        "templates",
                        &template.key,
                        format!("unknown path {path}"),
                    ));
                }
            }
        }
        let registry = TemplateRegistry::from_parts(templates, paths)
            .map_err(|err| ContentError::rejected("templates", "registry", err))?;

        info!(
            templates = template_count,
            paths = path_count,
            spells = catalog.spell_keys().len(),
            content_hash = %content_hash,
            "content loaded"
        );
        Ok(Self {
            registry: Arc::new(registry),
            catalog,
            content_hash,
        })
    }
}

fn hash(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}

fn check_spells(
    section: &'static str,
    owner: &str,
    keys: &[String],
    catalog: &ConfiguredSpellCatalog,
) -> Result<(), ContentError> {
    match keys
        .iter()
        .map(|raw| SpellKey::parse(raw))
        .find(|key| !catalog.has_spell(&key.base))
    {
        Some(unknown) => Err(ContentError::invalid(
            section,
            owner,
            format!("unknown spell {}", unknown.base),
        )),
        None => Ok(()),
    }
}

fn check_brushes(
    section: &'static str,
    owner: &str,
    keys: &[String],
    catalog: &ConfiguredSpellCatalog,
) -> Result<(), ContentError> {
    match keys.iter().find(|key| !catalog.has_brush(key)) {
        Some(unknown) => Err(ContentError::invalid(
            section,
            owner,
            format!("unknown brush {unknown}"),
        )),
        None => Ok(()),
    }
}

fn build_path(
    key: &str,
    definition: PathDefinition,
    catalog: &ConfiguredSpellCatalog,
) -> Result<UpgradePath, ContentError> {
    let mut tiers = Vec::with_capacity(definition.tiers.len());
    for tier in definition.tiers {
        let owner = format!("{key}.{}", tier.key);
        check_spells("paths", &owner, &tier.spells, catalog)?;
        check_spells("paths", &owner, &tier.optional_spells, catalog)?;
        check_brushes("paths", &owner, &tier.brushes, catalog)?;

        let mut built = PathTier::new(tier.key, tier.threshold);
        built.spells = tier.spells;
        built.brushes = tier.brushes;
        built.mana_max_bonus = tier.mana_max_bonus;
        built.optional_spells = tier.optional_spells;
        tiers.push(built);
    }
    debug!(path = key, tiers = tiers.len(), "path built");
    UpgradePath::new(key, definition.metric, tiers)
        .map_err(|err| ContentError::rejected("paths", key, err))
}

fn build_template(
    key: String,
    definition: TemplateDefinition,
    catalog: &ConfiguredSpellCatalog,
) -> Result<WandTemplate, ContentError> {
    check_spells("templates", &key, &definition.spells, catalog)?;
    check_brushes("templates", &key, &definition.brushes, catalog)?;

    let mut properties = PropertyMap::new();
    for (name, raw) in definition.properties {
        let property: PropertyKey = name
            .parse()
            .map_err(|err| ContentError::rejected("templates", &key, err))?;
        let value = property
            .coerce(raw.into())
            .map_err(|err| ContentError::rejected("templates", &key, err))?;
        properties.insert(property, value);
    }

    let mut template = WandTemplate::new(key);
    template.icon = definition.icon;
    template.spells = definition.spells;
    template.brushes = definition.brushes;
    template.mana_max = definition.mana_max;
    template.mana_regeneration = definition.mana_regeneration;
    template.path = definition.path;
    template.tags = definition.tags;
    template.properties = properties;
    Ok(template)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use wandcraft_test_support::FixedClock;
    use wandcraft_wand::domain::aggregates::Wand;
    use wandcraft_wand::domain::error::WandError;
    use wandcraft_wand::domain::path::ProgressMetric;
    use wandcraft_wand::domain::properties::PropertyValue;

    use super::*;

    const CONTENT: &str = r"
spells:
  fire: { cost: 10, worth: 50 }
  heal: { cost: 20, worth: 40 }
  blink: { cost: 15, min_level: 2, worth: 30 }
brushes:
  glass: { worth: 5 }
paths:
  apprentice:
    metric: casts
    tiers:
      - { key: novice, threshold: 0, brushes: [glass] }
      - { key: adept, threshold: 3, spells: [blink], mana_max_bonus: 20 }
templates:
  beginner:
    icon: stick
    spells: [fire, heal|2]
    mana_max: 100
    mana_regeneration: 5
    path: apprentice
    tags: [starter]
    properties:
      name: Ember
      power: 1
      locked: true
";

    #[test]
    fn test_from_yaml_str_builds_registry_and_catalog() {
        // Act
        let bundle = ContentBundle::from_yaml_str(CONTENT).unwrap();

        // Assert
        let template = bundle.registry.template("beginner").unwrap();
        assert_eq!(template.mana_max, 100);
        assert_eq!(template.spells, vec!["fire", "heal|2"]);
        assert_eq!(
            template.default_value(PropertyKey::Name),
            Some(PropertyValue::Text("Ember".into()))
        );
        assert_eq!(
            template.default_value(PropertyKey::Power),
            Some(PropertyValue::Float(1.0))
        );
        let path = bundle.registry.path("apprentice").unwrap();
        assert_eq!(path.metric, ProgressMetric::Casts);
        assert_eq!(path.tiers().len(), 2);
        assert_eq!(bundle.catalog.min_level("blink"), Some(2));
        assert_eq!(bundle.content_hash.len(), 64);
    }

    #[test]
    fn test_loaded_template_creates_wand() {
        // Arrange
        let bundle = ContentBundle::from_yaml_str(CONTENT).unwrap();

        // Act
        let wand = Wand::from_template(
            Uuid::new_v4(),
            "beginner",
            Arc::clone(&bundle.registry),
            Uuid::new_v4(),
            &FixedClock::standard(),
        )
        .unwrap();

        // Assert
        assert_eq!(wand.name(), "Ember");
        assert!(wand.is_locked());
        assert_eq!(wand.spell_level("heal"), Some(2));
        assert!(wand.has_brush("glass"));
        assert_eq!(wand.tier_key(), Some("novice"));
    }

    #[test]
    fn test_content_hash_tracks_source_text() {
        let first = ContentBundle::from_yaml_str(CONTENT).unwrap();
        let again = ContentBundle::from_yaml_str(CONTENT).unwrap();
        let edited = ContentBundle::from_yaml_str(&CONTENT.replace("worth: 50", "worth: 55")).unwrap();

        assert_eq!(first.content_hash, again.content_hash);
        assert_ne!(first.content_hash, edited.content_hash);
    }

    #[test]
    fn test_template_with_unknown_path_is_rejected() {
        let source = CONTENT.replace("path: apprentice", "path: sorcerer");

        let result = ContentBundle::from_yaml_str(&source);

        let err = result.unwrap_err();
        assert!(matches!(err, ContentError::Invalid { section: "templates", .. }));
        assert!(err.to_string().contains("sorcerer"));
    }

    #[test]
    fn test_template_with_unknown_spell_is_rejected() {
        let source = CONTENT.replace("[fire, heal|2]", "[fire, void]");

        let err = ContentBundle::from_yaml_str(&source).unwrap_err();

        assert!(err.to_string().contains("unknown spell void"));
    }

    #[test]
    fn test_tier_with_unknown_brush_is_rejected() {
        let source = CONTENT.replace("brushes: [glass]", "brushes: [granite]");

        let err = ContentBundle::from_yaml_str(&source).unwrap_err();

        assert!(matches!(err, ContentError::Invalid { section: "paths", .. }));
    }

    #[test]
    fn test_unknown_property_name_is_rejected() {
        let source = CONTENT.replace("locked: true", "glowing: true");

        let err = ContentBundle::from_yaml_str(&source).unwrap_err();

        assert!(matches!(err, ContentError::Rejected { section: "templates", .. }));
    }

    #[test]
    fn test_mistyped_property_is_rejected() {
        let source = CONTENT.replace("power: 1", "power: strong");

        let err = ContentBundle::from_yaml_str(&source).unwrap_err();

        assert!(matches!(err, ContentError::Rejected { .. }));
    }

    #[test]
    fn test_non_finite_property_is_rejected() {
        for bad in ["power: .nan", "power: .inf", "power: -.inf"] {
            let source = CONTENT.replace("power: 1", bad);

            let err = ContentBundle::from_yaml_str(&source).unwrap_err();

            assert!(
                matches!(
                    &err,
                    ContentError::Rejected {
                        section: "templates",
                        source: WandError::InvalidProperty { .. },
                        ..
                    }
                ),
                "{bad} produced {err:?}"
            );
        }
    }

    #[test]
    fn test_decreasing_thresholds_are_rejected() {
        let source = CONTENT.replace("threshold: 3", "threshold: 0").replace(
            "{ key: novice, threshold: 0,",
            "{ key: novice, threshold: 5,",
        );

        let err = ContentBundle::from_yaml_str(&source).unwrap_err();

        assert!(matches!(err, ContentError::Rejected { section: "paths", .. }));
    }

    #[test]
    fn test_negative_cost_is_rejected() {
        let source = CONTENT.replace("cost: 10", "cost: -1");

        let err = ContentBundle::from_yaml_str(&source).unwrap_err();

        assert!(matches!(err, ContentError::Invalid { section: "spells", .. }));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = ContentBundle::load(Path::new("/nonexistent/wandcraft/content.yaml")).unwrap_err();

        assert!(matches!(err, ContentError::Io { .. }));
    }
}
