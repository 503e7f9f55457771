//! Wand templates and the registry that holds them.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::error::WandError;
use super::path::UpgradePath;
use super::properties::{PropertyKey, PropertyMap, PropertyValue};

/// An immutable blueprint shared by every wand created from it.
#[derive(Debug, Clone, PartialEq)]
pub struct WandTemplate {
    /// Unique template key.
    pub key: String,
    /// Default icon.
    pub icon: String,
    /// Spells bound to a fresh wand.
    pub spells: Vec<String>,
    /// Brushes bound to a fresh wand.
    pub brushes: Vec<String>,
    /// Base mana capacity.
    pub mana_max: u32,
    /// Base mana regained per tick.
    pub mana_regeneration: u32,
    /// Upgrade path a fresh wand starts on.
    pub path: Option<String>,
    /// Tags reported by `has_tag`.
    pub tags: Vec<String>,
    /// Defaults for every other property.
    pub properties: PropertyMap,
}

impl WandTemplate {
    /// Creates an empty template with the given key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            icon: String::new(),
            spells: Vec::new(),
            brushes: Vec::new(),
            mana_max: 0,
            mana_regeneration: 0,
            path: None,
            tags: Vec::new(),
            properties: PropertyMap::new(),
        }
    }

    /// The template-tier value for a property, if the template supplies one.
    #[must_use]
    pub fn default_value(&self, key: PropertyKey) -> Option<PropertyValue> {
        match key {
            PropertyKey::Icon | PropertyKey::InactiveIcon if !self.icon.is_empty() => {
                Some(self.properties.get(&key).cloned().unwrap_or_else(|| {
                    PropertyValue::Text(self.icon.clone())
                }))
            }
            PropertyKey::ManaMax => Some(PropertyValue::Integer(i64::from(self.mana_max))),
            PropertyKey::ManaRegeneration => {
                Some(PropertyValue::Integer(i64::from(self.mana_regeneration)))
            }
            PropertyKey::Tags if !self.tags.is_empty() => Some(PropertyValue::List(self.tags.clone())),
            _ => self.properties.get(&key).cloned(),
        }
    }
}

/// Read-only registry of templates and upgrade paths, loaded once at
/// startup.
#[derive(Debug, Clone, Default)]
pub struct TemplateRegistry {
    templates: BTreeMap<String, Arc<WandTemplate>>,
    paths: BTreeMap<String, Arc<UpgradePath>>,
}

impl TemplateRegistry {
    /// Builds a registry, checking that every template's path exists.
    ///
    /// # Errors
    ///
    /// Returns `WandError::UnknownPath` naming the first dangling reference.
    pub fn from_parts(
        templates: impl IntoIterator<Item = WandTemplate>,
        paths: impl IntoIterator<Item = UpgradePath>,
    ) -> Result<Self, WandError> {
        let paths: BTreeMap<String, Arc<UpgradePath>> = paths
            .into_iter()
            .map(|path| (path.key.clone(), Arc::new(path)))
            .collect();
        let mut registry = Self {
            templates: BTreeMap::new(),
            paths,
        };
        for template in templates {
            if let Some(path) = &template.path {
                if !registry.paths.contains_key(path) {
                    return Err(WandError::UnknownPath(path.clone()));
                }
            }
            registry
                .templates
                .insert(template.key.clone(), Arc::new(template));
        }
        Ok(registry)
    }

    /// Looks up a template.
    ///
    /// # Errors
    ///
    /// Returns `WandError::UnknownTemplate` if no template has the key.
    pub fn template(&self, key: &str) -> Result<Arc<WandTemplate>, WandError> {
        self.templates
            .get(key)
            .cloned()
            .ok_or_else(|| WandError::UnknownTemplate(key.to_owned()))
    }

    /// Looks up an upgrade path.
    ///
    /// # Errors
    ///
    /// Returns `WandError::UnknownPath` if no path has the key.
    pub fn path(&self, key: &str) -> Result<Arc<UpgradePath>, WandError> {
        self.paths
            .get(key)
            .cloned()
            .ok_or_else(|| WandError::UnknownPath(key.to_owned()))
    }

    /// Template keys in sorted order.
    pub fn template_keys(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    /// Path keys in sorted order.
    pub fn path_keys(&self) -> impl Iterator<Item = &str> {
        self.paths.keys().map(String::as_str)
    }
}
