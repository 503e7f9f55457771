//! Wand properties and the override layer.
//!
//! Every recognized property has a fixed name and value kind. An effective
//! value is resolved through four tiers, first hit wins:
//!
//! 1. the per-instance override (a raw string, parsed on read),
//! 2. the value stored directly on the instance,
//! 3. the template default,
//! 4. the built-in hard default.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::WandError;
use super::template::WandTemplate;

/// Recognized wand property names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKey {
    Name,
    Description,
    Icon,
    InactiveIcon,
    ManaMax,
    ManaRegeneration,
    CostReduction,
    CooldownReduction,
    ConsumeReduction,
    Power,
    Protection,
    HealthRegeneration,
    HungerRegeneration,
    Worth,
    Locked,
    Bound,
    Soul,
    Indestructible,
    Undroppable,
    QuickCast,
    QuickCastDisabled,
    ShowMessages,
    ShowCastMessages,
    Upgrade,
    Tags,
}

/// The value type a property accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Text,
    Integer,
    Float,
    Flag,
    List,
}

impl PropertyKey {
    /// Every recognized property, in declaration order.
    pub const ALL: [Self; 25] = [
        Self::Name,
        Self::Description,
        Self::Icon,
        Self::InactiveIcon,
        Self::ManaMax,
        Self::ManaRegeneration,
        Self::CostReduction,
        Self::CooldownReduction,
        Self::ConsumeReduction,
        Self::Power,
        Self::Protection,
        Self::HealthRegeneration,
        Self::HungerRegeneration,
        Self::Worth,
        Self::Locked,
        Self::Bound,
        Self::Soul,
        Self::Indestructible,
        Self::Undroppable,
        Self::QuickCast,
        Self::QuickCastDisabled,
        Self::ShowMessages,
        Self::ShowCastMessages,
        Self::Upgrade,
        Self::Tags,
    ];

    /// The configuration name of the property.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Description => "description",
            Self::Icon => "icon",
            Self::InactiveIcon => "inactive_icon",
            Self::ManaMax => "mana_max",
            Self::ManaRegeneration => "mana_regeneration",
            Self::CostReduction => "cost_reduction",
            Self::CooldownReduction => "cooldown_reduction",
            Self::ConsumeReduction => "consume_reduction",
            Self::Power => "power",
            Self::Protection => "protection",
            Self::HealthRegeneration => "health_regeneration",
            Self::HungerRegeneration => "hunger_regeneration",
            Self::Worth => "worth",
            Self::Locked => "locked",
            Self::Bound => "bound",
            Self::Soul => "soul",
            Self::Indestructible => "indestructible",
            Self::Undroppable => "undroppable",
            Self::QuickCast => "quick_cast",
            Self::QuickCastDisabled => "quick_cast_disabled",
            Self::ShowMessages => "show_messages",
            Self::ShowCastMessages => "show_cast_messages",
            Self::Upgrade => "upgrade",
            Self::Tags => "tags",
        }
    }

    /// The value kind this property accepts.
    #[must_use]
    pub fn kind(self) -> PropertyKind {
        match self {
            Self::Name | Self::Description | Self::Icon | Self::InactiveIcon => PropertyKind::Text,
            Self::ManaMax | Self::ManaRegeneration | Self::Worth => PropertyKind::Integer,
            Self::CostReduction
            | Self::CooldownReduction
            | Self::ConsumeReduction
            | Self::Power
            | Self::Protection
            | Self::HealthRegeneration
            | Self::HungerRegeneration => PropertyKind::Float,
            Self::Locked
            | Self::Bound
            | Self::Soul
            | Self::Indestructible
            | Self::Undroppable
            | Self::QuickCast
            | Self::QuickCastDisabled
            | Self::ShowMessages
            | Self::ShowCastMessages
            | Self::Upgrade => PropertyKind::Flag,
            Self::Tags => PropertyKind::List,
        }
    }

    /// The built-in value used when no tier supplies one.
    #[must_use]
    pub fn hard_default(self) -> PropertyValue {
        match self {
            Self::Name => PropertyValue::Text("Wand".to_owned()),
            Self::Icon | Self::InactiveIcon => PropertyValue::Text("wand".to_owned()),
            Self::ShowMessages | Self::ShowCastMessages => PropertyValue::Flag(true),
            other => match other.kind() {
                PropertyKind::Text => PropertyValue::Text(String::new()),
                PropertyKind::Integer => PropertyValue::Integer(0),
                PropertyKind::Float => PropertyValue::Float(0.0),
                PropertyKind::Flag => PropertyValue::Flag(false),
                PropertyKind::List => PropertyValue::List(Vec::new()),
            },
        }
    }

    /// Parses a raw string into a value of this property's kind.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidProperty` if the string does not parse.
    pub fn parse_value(self, raw: &str) -> Result<PropertyValue, WandError> {
        let trimmed = raw.trim();
        let invalid = |reason: &str| WandError::InvalidProperty {
            name: self.as_str().to_owned(),
            reason: format!("{reason}: {raw:?}"),
        };
        match self.kind() {
            PropertyKind::Text => Ok(PropertyValue::Text(raw.to_owned())),
            PropertyKind::Integer => trimmed
                .parse::<i64>()
                .map(PropertyValue::Integer)
                .map_err(|_| invalid("expected an integer")),
            PropertyKind::Float => trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(PropertyValue::Float)
                .ok_or_else(|| invalid("expected a number")),
            PropertyKind::Flag => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => Ok(PropertyValue::Flag(true)),
                "false" | "no" | "0" => Ok(PropertyValue::Flag(false)),
                _ => Err(invalid("expected true or false")),
            },
            PropertyKind::List => Ok(PropertyValue::List(
                trimmed
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
                    .collect(),
            )),
        }
    }

    /// Converts a typed value to this property's kind, widening integers to
    /// floats and splitting text into lists where needed.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidProperty` on a kind mismatch or a
    /// non-finite number.
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn coerce(self, value: PropertyValue) -> Result<PropertyValue, WandError> {
        match (self.kind(), value) {
            (PropertyKind::Text, v @ PropertyValue::Text(_))
            | (PropertyKind::Integer, v @ PropertyValue::Integer(_))
            | (PropertyKind::Flag, v @ PropertyValue::Flag(_))
            | (PropertyKind::List, v @ PropertyValue::List(_)) => Ok(v),
            (PropertyKind::Float, PropertyValue::Float(f)) if f.is_finite() => {
                Ok(PropertyValue::Float(f))
            }
            (PropertyKind::Float, PropertyValue::Integer(i)) => Ok(PropertyValue::Float(i as f64)),
            (PropertyKind::Integer, PropertyValue::Float(f)) if f.fract() == 0.0 => {
                Ok(PropertyValue::Integer(f as i64))
            }
            (_, PropertyValue::Text(raw)) => self.parse_value(&raw),
            (_, other) => Err(WandError::InvalidProperty {
                name: self.as_str().to_owned(),
                reason: format!("unexpected value {other}"),
            }),
        }
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PropertyKey {
    type Err = WandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| WandError::InvalidProperty {
                name: s.to_owned(),
                reason: "unrecognized property".to_owned(),
            })
    }
}

/// A typed property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Flag(bool),
    List(Vec<String>),
}

impl PropertyValue {
    /// Numeric view; non-numeric values read as `0.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Integer(i) => *i as f64,
            Self::Float(f) => *f,
            _ => 0.0,
        }
    }

    /// Integer view; floats truncate, non-numeric values read as `0`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Integer(i) => *i,
            Self::Float(f) => *f as i64,
            _ => 0,
        }
    }

    /// Flag view; non-flag values read as `false`.
    #[must_use]
    pub fn as_bool(&self) -> bool {
        matches!(self, Self::Flag(true))
    }

    /// Text view; non-text values read as the empty string.
    #[must_use]
    pub fn as_text(&self) -> &str {
        match self {
            Self::Text(s) => s,
            _ => "",
        }
    }

    /// List view; non-list values read as empty.
    #[must_use]
    pub fn as_list(&self) -> &[String] {
        match self {
            Self::List(items) => items,
            _ => &[],
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Flag(b) => write!(f, "{b}"),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// Typed property values keyed by property.
pub type PropertyMap = BTreeMap<PropertyKey, PropertyValue>;

/// Raw override strings keyed by property.
pub type OverrideMap = BTreeMap<PropertyKey, String>;

/// Which tier an effective value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertySource {
    Override,
    Instance,
    Template,
    Default,
}

/// The instance-owned property tiers: overrides and stored values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyLayers {
    overrides: OverrideMap,
    instance: PropertyMap,
}

impl PropertyLayers {
    /// Creates layers from already-validated parts.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidProperty` if any override does not parse or
    /// any stored value has the wrong kind.
    pub fn from_parts(instance: PropertyMap, overrides: OverrideMap) -> Result<Self, WandError> {
        let mut checked = PropertyMap::new();
        for (key, value) in instance {
            checked.insert(key, key.coerce(value)?);
        }
        for (key, raw) in &overrides {
            key.parse_value(raw)?;
        }
        Ok(Self {
            overrides,
            instance: checked,
        })
    }

    /// Resolves the effective value of a property.
    #[must_use]
    pub fn resolve(&self, key: PropertyKey, template: &WandTemplate) -> PropertyValue {
        self.resolve_with_source(key, template).0
    }

    /// Resolves the effective value and reports which tier supplied it.
    #[must_use]
    pub fn resolve_with_source(
        &self,
        key: PropertyKey,
        template: &WandTemplate,
    ) -> (PropertyValue, PropertySource) {
        // Overrides are validated on write, so a parse failure cannot happen
        // here; falling through keeps reads total regardless.
        if let Some(value) = self
            .overrides
            .get(&key)
            .and_then(|raw| key.parse_value(raw).ok())
        {
            return (value, PropertySource::Override);
        }
        self.resolve_base(key, template)
    }

    /// Resolves a property ignoring the override tier.
    #[must_use]
    pub fn resolve_base(
        &self,
        key: PropertyKey,
        template: &WandTemplate,
    ) -> (PropertyValue, PropertySource) {
        if let Some(value) = self.instance.get(&key) {
            return (value.clone(), PropertySource::Instance);
        }
        if let Some(value) = template.default_value(key) {
            return (value, PropertySource::Template);
        }
        (key.hard_default(), PropertySource::Default)
    }

    /// The override map.
    #[must_use]
    pub fn overrides(&self) -> &OverrideMap {
        &self.overrides
    }

    /// Values stored directly on the instance.
    #[must_use]
    pub fn instance(&self) -> &PropertyMap {
        &self.instance
    }

    /// Sets an override after validating that it parses. Returns the
    /// previous raw value.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidProperty` if the value does not parse.
    pub fn set_override(
        &mut self,
        key: PropertyKey,
        raw: String,
    ) -> Result<Option<String>, WandError> {
        key.parse_value(&raw)?;
        Ok(self.overrides.insert(key, raw))
    }

    /// Removes an override. Returns the removed raw value.
    pub fn remove_override(&mut self, key: PropertyKey) -> Option<String> {
        self.overrides.remove(&key)
    }

    /// Replaces the whole override map. Nothing changes unless every entry
    /// parses.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidProperty` for the first entry that does
    /// not parse.
    pub fn replace_overrides(&mut self, overrides: OverrideMap) -> Result<(), WandError> {
        for (key, raw) in &overrides {
            key.parse_value(raw)?;
        }
        self.overrides = overrides;
        Ok(())
    }

    /// Stores a value on the instance tier. Returns the previous value.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidProperty` on a kind mismatch.
    pub fn set_instance(
        &mut self,
        key: PropertyKey,
        value: PropertyValue,
    ) -> Result<Option<PropertyValue>, WandError> {
        let value = key.coerce(value)?;
        Ok(self.instance.insert(key, value))
    }

    /// Drops an instance-stored value so the template tier shows through.
    pub fn remove_instance(&mut self, key: PropertyKey) -> Option<PropertyValue> {
        self.instance.remove(&key)
    }
}
