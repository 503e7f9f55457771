//! The `Wand` aggregate root.
//!
//! The wand owns one of each sub-model (property layers, mana pool, binding
//! registry, upgrade-path position, owner binding) and coordinates the rules
//! that cut across them: lock checks, cost resolution and notifications.
//! Progression lives in `progression.rs`, persistence in `snapshot.rs`.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;
use wandcraft_core::aggregate::AggregateRoot;
use wandcraft_core::clock::Clock;
use wandcraft_core::event::EventMetadata;

use super::bindings::{BindingChange, BindingKind, BindingOrigin, BindingRegistry, SpellKey};
use super::error::{MergeConflict, WandError};
use super::events::{
    ActiveBrushChanged, ActiveSpellChanged, BindingPromoted, BrushAdded, BrushRemoved,
    LockChanged, ManaChangeReason, ManaChanged, OverrideRemoved, OverrideSet, OverridesReplaced,
    OwnerBound, OwnerUnbound, PropertiesChanged, SpellAdded, SpellCast, SpellRemoved,
    WandCreated, WandEvent, WandEventKind, WandMerged,
};
use super::lost::{LostWand, WorldPosition};
use super::mana::ManaPool;
use super::path::{PathTier, ProgressCounters, UpgradePath};
use super::ports::{SpellCatalog, WandOwner};
use super::properties::{
    OverrideMap, PropertyKey, PropertyLayers, PropertyMap, PropertySource, PropertyValue,
};
use super::template::{TemplateRegistry, WandTemplate};

/// Result of a successful cast: what the ability execution engine runs.
#[derive(Debug, Clone, PartialEq)]
pub struct CastReceipt {
    /// Base key of the spell cast.
    pub spell: String,
    /// Bound level of the spell.
    pub level: u32,
    /// Mana actually deducted.
    pub cost: f32,
    /// Balance left after the cast.
    pub remaining: f32,
    /// Effective power multiplier.
    pub power: f32,
}

/// The aggregate root for a wand.
#[derive(Debug)]
pub struct Wand {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Current version (applied event count).
    pub(crate) version: i64,
    /// Content the wand resolves templates and paths against.
    pub(crate) registry: Arc<TemplateRegistry>,
    pub(crate) template: Arc<WandTemplate>,
    pub(crate) path: Option<Arc<UpgradePath>>,
    /// Index of the current tier on `path`.
    pub(crate) tier: usize,
    pub(crate) properties: PropertyLayers,
    pub(crate) mana: ManaPool,
    pub(crate) bindings: BindingRegistry,
    pub(crate) owner: Option<WandOwner>,
    pub(crate) progress: ProgressCounters,
    /// Set by every applied event, cleared by `save_state`.
    pub(crate) dirty: bool,
    uncommitted_events: Vec<WandEvent>,
}

impl Wand {
    /// Builds an empty wand around resolved content. State is filled in by
    /// applying events (or by the snapshot loader).
    pub(crate) fn blank(
        id: Uuid,
        registry: Arc<TemplateRegistry>,
        template: Arc<WandTemplate>,
        path: Option<Arc<UpgradePath>>,
    ) -> Self {
        Self {
            id,
            version: 0,
            registry,
            template,
            path,
            tier: 0,
            properties: PropertyLayers::default(),
            mana: ManaPool::new(0, 0),
            bindings: BindingRegistry::default(),
            owner: None,
            progress: ProgressCounters::default(),
            dirty: false,
            uncommitted_events: Vec::new(),
        }
    }

    /// Creates a wand from a template. The wand starts on the template's
    /// path at `T0` with a full mana pool, the template's bindings and the
    /// starting tier's grants.
    ///
    /// # Errors
    ///
    /// Returns `WandError::UnknownTemplate` or `WandError::UnknownPath` if
    /// the template or its path cannot be resolved.
    pub fn from_template(
        id: Uuid,
        template_key: &str,
        registry: Arc<TemplateRegistry>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Self, WandError> {
        let template = registry.template(template_key)?;
        let path = template
            .path
            .as_deref()
            .map(|key| registry.path(key))
            .transpose()?;
        let mut wand = Self::blank(id, registry, Arc::clone(&template), path);
        let (granted_spells, granted_brushes) = match wand.path.as_ref().and_then(|p| p.tier(0)) {
            Some(tier) => wand.pending_grants(tier),
            None => (Vec::new(), Vec::new()),
        };

        wand.record(
            WandEventKind::WandCreated(WandCreated {
                wand_id: id,
                template_key: template.key.clone(),
                path: template.path.clone(),
                spells: template.spells.clone(),
                brushes: template.brushes.clone(),
                granted_spells,
                granted_brushes,
                duplicated_from: None,
            }),
            correlation_id,
            clock,
        );
        debug!(wand_id = %id, template = %template.key, "wand created");
        Ok(wand)
    }

    /// Copies this wand under a new identifier. Bindings, overrides, mana,
    /// path position and progress are deep-copied; the owner binding is not.
    #[must_use]
    pub fn duplicate(&self, new_id: Uuid, correlation_id: Uuid, clock: &dyn Clock) -> Self {
        let mut copy = Self::blank(
            new_id,
            Arc::clone(&self.registry),
            Arc::clone(&self.template),
            self.path.clone(),
        );
        copy.tier = self.tier;
        copy.properties = self.properties.clone();
        copy.properties.remove_instance(PropertyKey::Bound);
        copy.mana = self.mana.clone();
        copy.bindings = self.bindings.clone();
        copy.progress = self.progress.clone();

        copy.record(
            WandEventKind::WandCreated(WandCreated {
                wand_id: new_id,
                template_key: self.template.key.clone(),
                path: self.path_key().map(str::to_owned),
                spells: Vec::new(),
                brushes: Vec::new(),
                granted_spells: Vec::new(),
                granted_brushes: Vec::new(),
                duplicated_from: Some(self.id),
            }),
            correlation_id,
            clock,
        );
        copy
    }

    /// Records an event: applies it at once and queues it for dispatch.
    pub(crate) fn record(&mut self, kind: WandEventKind, correlation_id: Uuid, clock: &dyn Clock) {
        let event = WandEvent {
            metadata: EventMetadata::for_command(
                kind.event_type(),
                self.id,
                self.version + 1,
                correlation_id,
                clock.now(),
            ),
            kind,
        };
        self.apply(&event);
        self.uncommitted_events.push(event);
    }

    fn ensure_unlocked(&self, operation: &str) -> Result<(), WandError> {
        if self.is_locked() {
            warn!(wand_id = %self.id, operation, "rejected: wand is locked");
            return Err(WandError::Locked);
        }
        Ok(())
    }

    /// Bindings a tier would grant that the wand does not already have.
    pub(crate) fn pending_grants(&self, tier: &PathTier) -> (Vec<String>, Vec<String>) {
        let spells = tier
            .spells
            .iter()
            .filter(|raw| {
                self.bindings
                    .spell_change(&SpellKey::parse(raw), BindingOrigin::TierGranted)
                    .is_change()
            })
            .cloned()
            .collect();
        let brushes = tier
            .brushes
            .iter()
            .filter(|key| !self.bindings.has_brush(key))
            .cloned()
            .collect();
        (spells, brushes)
    }

    pub(crate) fn grant(&mut self, spells: &[String], brushes: &[String], origin: BindingOrigin) {
        for raw in spells {
            self.bindings.insert_spell(&SpellKey::parse(raw), origin);
        }
        for key in brushes {
            self.bindings.insert_brush(key, origin);
        }
    }

    /// Re-derives the pool's capacity and rate from effective properties and
    /// the current tier.
    pub(crate) fn sync_mana(&mut self) {
        let base = saturate_u32(self.property(PropertyKey::ManaMax).as_i64());
        let bonus = self
            .path
            .as_ref()
            .map_or(0, |path| path.mana_bonus_through(self.tier));
        self.mana.set_maximum(base.saturating_add(bonus));
        self.mana
            .set_regeneration(saturate_u32(self.property(PropertyKey::ManaRegeneration).as_i64()));
    }

    // ---------------------------------------------------------------------
    // Identity and content
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn template(&self) -> &WandTemplate {
        &self.template
    }

    #[must_use]
    pub fn template_key(&self) -> &str {
        &self.template.key
    }

    #[must_use]
    pub fn path(&self) -> Option<&UpgradePath> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn path_key(&self) -> Option<&str> {
        self.path.as_ref().map(|path| path.key.as_str())
    }

    /// Index of the current tier.
    #[must_use]
    pub fn tier(&self) -> usize {
        self.tier
    }

    /// Key of the current tier, if the wand follows a path.
    #[must_use]
    pub fn tier_key(&self) -> Option<&str> {
        self.path
            .as_ref()
            .and_then(|path| path.tier(self.tier))
            .map(|tier| tier.key.as_str())
    }

    #[must_use]
    pub fn owner(&self) -> Option<&WandOwner> {
        self.owner.as_ref()
    }

    #[must_use]
    pub fn progress(&self) -> &ProgressCounters {
        &self.progress
    }

    #[must_use]
    pub fn mana(&self) -> &ManaPool {
        &self.mana
    }

    #[must_use]
    pub fn bindings(&self) -> &BindingRegistry {
        &self.bindings
    }

    /// Whether state changed since the last `save_state`.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ---------------------------------------------------------------------
    // Effective properties
    // ---------------------------------------------------------------------

    /// Effective value of a property after override resolution.
    #[must_use]
    pub fn property(&self, key: PropertyKey) -> PropertyValue {
        self.properties.resolve(key, &self.template)
    }

    /// Effective value and the tier that supplied it.
    #[must_use]
    pub fn property_with_source(&self, key: PropertyKey) -> (PropertyValue, PropertySource) {
        self.properties.resolve_with_source(key, &self.template)
    }

    /// Numeric property as `f32`. Non-finite values read as `0`.
    #[allow(clippy::cast_possible_truncation)]
    fn factor(&self, key: PropertyKey) -> f32 {
        let value = self.property(key).as_f64() as f32;
        if value.is_finite() { value } else { 0.0 }
    }

    fn flag(&self, key: PropertyKey) -> bool {
        self.property(key).as_bool()
    }

    #[must_use]
    pub fn name(&self) -> String {
        self.property(PropertyKey::Name).to_string()
    }

    #[must_use]
    pub fn description(&self) -> String {
        self.property(PropertyKey::Description).to_string()
    }

    #[must_use]
    pub fn icon(&self) -> String {
        self.property(PropertyKey::Icon).to_string()
    }

    #[must_use]
    pub fn inactive_icon(&self) -> String {
        self.property(PropertyKey::InactiveIcon).to_string()
    }

    /// Cost reduction clamped into `[0, 1]`.
    #[must_use]
    pub fn cost_reduction(&self) -> f32 {
        self.factor(PropertyKey::CostReduction).clamp(0.0, 1.0)
    }

    /// Cooldown reduction clamped into `[0, 1]`.
    #[must_use]
    pub fn cooldown_reduction(&self) -> f32 {
        self.factor(PropertyKey::CooldownReduction).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn consume_reduction(&self) -> f32 {
        self.factor(PropertyKey::ConsumeReduction).clamp(0.0, 1.0)
    }

    #[must_use]
    pub fn power(&self) -> f32 {
        self.factor(PropertyKey::Power).max(0.0)
    }

    #[must_use]
    pub fn protection(&self) -> f32 {
        self.factor(PropertyKey::Protection).max(0.0)
    }

    #[must_use]
    pub fn health_regeneration(&self) -> f32 {
        self.factor(PropertyKey::HealthRegeneration)
    }

    #[must_use]
    pub fn hunger_regeneration(&self) -> f32 {
        self.factor(PropertyKey::HungerRegeneration)
    }

    #[must_use]
    pub fn is_cost_free(&self) -> bool {
        self.cost_reduction() >= 1.0
    }

    #[must_use]
    pub fn is_consume_free(&self) -> bool {
        self.consume_reduction() >= 1.0
    }

    #[must_use]
    pub fn is_cooldown_free(&self) -> bool {
        self.cooldown_reduction() >= 1.0
    }

    #[must_use]
    pub fn is_super_powered(&self) -> bool {
        self.power() >= 1.0
    }

    #[must_use]
    pub fn is_super_protected(&self) -> bool {
        self.protection() >= 1.0
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.flag(PropertyKey::Locked)
    }

    /// Whether the wand is bound to an owner.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.flag(PropertyKey::Bound)
    }

    #[must_use]
    pub fn is_soul(&self) -> bool {
        self.flag(PropertyKey::Soul)
    }

    #[must_use]
    pub fn is_undroppable(&self) -> bool {
        self.flag(PropertyKey::Undroppable)
    }

    #[must_use]
    pub fn is_indestructible(&self) -> bool {
        self.flag(PropertyKey::Indestructible)
    }

    #[must_use]
    pub fn is_quick_cast(&self) -> bool {
        self.flag(PropertyKey::QuickCast)
    }

    #[must_use]
    pub fn is_quick_cast_disabled(&self) -> bool {
        self.flag(PropertyKey::QuickCastDisabled)
    }

    #[must_use]
    pub fn show_messages(&self) -> bool {
        self.flag(PropertyKey::ShowMessages)
    }

    #[must_use]
    pub fn show_cast_messages(&self) -> bool {
        self.flag(PropertyKey::ShowCastMessages)
    }

    /// Whether this wand is an upgrade item meant to be merged into others.
    #[must_use]
    pub fn is_upgrade(&self) -> bool {
        self.flag(PropertyKey::Upgrade)
    }

    /// Whether the effective `tags` list contains `tag`.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.property(PropertyKey::Tags)
            .as_list()
            .iter()
            .any(|t| t == tag)
    }

    /// Mana cost of a spell after cost reduction, floored at zero.
    #[must_use]
    pub fn effective_cost(&self, base_cost: f32) -> f32 {
        (base_cost * (1.0 - self.cost_reduction())).max(0.0)
    }

    // ---------------------------------------------------------------------
    // Property edits
    // ---------------------------------------------------------------------

    /// Records already-coerced values that differ from what is stored.
    fn store_properties(
        &mut self,
        values: PropertyMap,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> bool {
        let changed: PropertyMap = values
            .into_iter()
            .filter(|(key, value)| self.properties.instance().get(key) != Some(value))
            .collect();
        if changed.is_empty() {
            return false;
        }
        self.record(
            WandEventKind::PropertiesChanged(PropertiesChanged {
                wand_id: self.id,
                values: changed,
            }),
            correlation_id,
            clock,
        );
        true
    }

    fn store_property(
        &mut self,
        key: PropertyKey,
        value: PropertyValue,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> bool {
        self.store_properties(BTreeMap::from([(key, value)]), correlation_id, clock)
    }

    /// Stores a value on the instance tier.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidProperty` on a kind mismatch.
    pub fn set_property(
        &mut self,
        key: PropertyKey,
        value: PropertyValue,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        let value = key.coerce(value)?;
        Ok(self.store_property(key, value, correlation_id, clock))
    }

    pub fn set_name(&mut self, name: &str, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        self.store_property(
            PropertyKey::Name,
            PropertyValue::Text(name.to_owned()),
            correlation_id,
            clock,
        )
    }

    pub fn set_description(
        &mut self,
        description: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> bool {
        self.store_property(
            PropertyKey::Description,
            PropertyValue::Text(description.to_owned()),
            correlation_id,
            clock,
        )
    }

    pub fn set_icon(&mut self, icon: &str, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        self.store_property(
            PropertyKey::Icon,
            PropertyValue::Text(icon.to_owned()),
            correlation_id,
            clock,
        )
    }

    pub fn set_inactive_icon(
        &mut self,
        icon: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> bool {
        self.store_property(
            PropertyKey::InactiveIcon,
            PropertyValue::Text(icon.to_owned()),
            correlation_id,
            clock,
        )
    }

    /// Overwrites instance values. Nothing is stored unless every value has
    /// the right kind. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidProperty` for the first bad value.
    pub fn configure(
        &mut self,
        values: PropertyMap,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        let coerced = coerce_all(values)?;
        Ok(self.store_properties(coerced, correlation_id, clock))
    }

    /// Like `configure`, but numbers only ever go up, flags only ever turn
    /// on, and text or list values are replaced when they differ.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidProperty` for the first bad value.
    pub fn upgrade(
        &mut self,
        values: PropertyMap,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        let coerced = coerce_all(values)?;
        let improvements: PropertyMap = coerced
            .into_iter()
            .filter(|(key, value)| {
                let current = self.property(*key);
                match value {
                    PropertyValue::Integer(_) | PropertyValue::Float(_) => {
                        value.as_f64() > current.as_f64()
                    }
                    PropertyValue::Flag(on) => *on && !current.as_bool(),
                    PropertyValue::Text(_) | PropertyValue::List(_) => *value != current,
                }
            })
            .collect();
        Ok(self.store_properties(improvements, correlation_id, clock))
    }

    /// Sets the instance lock flag. A `locked` override that disagrees is
    /// removed in the same call, so the effective lock always ends up equal
    /// to `locked`. Returns whether anything changed.
    pub fn set_locked(&mut self, locked: bool, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        let (stored, _) = self.properties.resolve_base(PropertyKey::Locked, &self.template);
        let shadowed = self.get_override(PropertyKey::Locked).is_some_and(|raw| {
            PropertyKey::Locked
                .parse_value(raw)
                .is_ok_and(|value| value.as_bool() != locked)
        });
        if shadowed {
            self.record(
                WandEventKind::OverrideRemoved(OverrideRemoved {
                    wand_id: self.id,
                    property: PropertyKey::Locked,
                }),
                correlation_id,
                clock,
            );
            debug!(wand_id = %self.id, "conflicting lock override removed");
        }
        if stored.as_bool() == locked {
            return shadowed;
        }
        self.record(
            WandEventKind::LockChanged(LockChanged {
                wand_id: self.id,
                locked,
            }),
            correlation_id,
            clock,
        );
        debug!(wand_id = %self.id, locked, "lock changed");
        true
    }

    /// Marks the wand as an upgrade item.
    pub fn make_upgrade(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        self.store_property(PropertyKey::Upgrade, PropertyValue::Flag(true), correlation_id, clock)
    }

    // ---------------------------------------------------------------------
    // Overrides
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn overrides(&self) -> &OverrideMap {
        self.properties.overrides()
    }

    #[must_use]
    pub fn get_override(&self, key: PropertyKey) -> Option<&str> {
        self.properties.overrides().get(&key).map(String::as_str)
    }

    /// Sets an override. Returns whether the stored override changed.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidProperty` if the value does not parse as
    /// the property's kind.
    pub fn set_override(
        &mut self,
        key: PropertyKey,
        value: String,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        key.parse_value(&value)?;
        if self.get_override(key) == Some(value.as_str()) {
            return Ok(false);
        }
        self.record(
            WandEventKind::OverrideSet(OverrideSet {
                wand_id: self.id,
                property: key,
                value,
            }),
            correlation_id,
            clock,
        );
        Ok(true)
    }

    /// Removes an override. Returns `false` if none was set.
    pub fn remove_override(
        &mut self,
        key: PropertyKey,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> bool {
        if self.get_override(key).is_none() {
            return false;
        }
        self.record(
            WandEventKind::OverrideRemoved(OverrideRemoved {
                wand_id: self.id,
                property: key,
            }),
            correlation_id,
            clock,
        );
        true
    }

    /// Replaces the whole override map, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidProperty` for the first entry that does
    /// not parse; no override changes in that case.
    pub fn replace_overrides(
        &mut self,
        overrides: OverrideMap,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        for (key, raw) in &overrides {
            key.parse_value(raw)?;
        }
        if *self.properties.overrides() == overrides {
            return Ok(false);
        }
        self.record(
            WandEventKind::OverridesReplaced(OverridesReplaced {
                wand_id: self.id,
                overrides,
            }),
            correlation_id,
            clock,
        );
        Ok(true)
    }

    // ---------------------------------------------------------------------
    // Bindings
    // ---------------------------------------------------------------------

    #[must_use]
    pub fn has_spell(&self, key: &str) -> bool {
        self.bindings.has_spell(key)
    }

    #[must_use]
    pub fn has_brush(&self, key: &str) -> bool {
        self.bindings.has_brush(key)
    }

    #[must_use]
    pub fn spell_level(&self, key: &str) -> Option<u32> {
        self.bindings.spell_level(key)
    }

    #[must_use]
    pub fn active_spell(&self) -> Option<&str> {
        self.bindings.active_spell()
    }

    #[must_use]
    pub fn active_brush(&self) -> Option<&str> {
        self.bindings.active_brush()
    }

    /// Binds a spell manually. `key` may carry a level suffix (`fire|2`).
    /// Returns `true` if the spell was added or its level raised.
    ///
    /// # Errors
    ///
    /// Returns `WandError::Locked` if the wand is locked.
    pub fn add_spell(
        &mut self,
        key: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        self.ensure_unlocked("add_spell")?;
        let key = SpellKey::parse(key);
        let kind = match self.bindings.spell_change(&key, BindingOrigin::Manual) {
            BindingChange::Unchanged => return Ok(false),
            BindingChange::OriginPromoted => {
                self.record(
                    WandEventKind::BindingPromoted(BindingPromoted {
                        wand_id: self.id,
                        kind: BindingKind::Spell,
                        key: key.base,
                    }),
                    correlation_id,
                    clock,
                );
                return Ok(false);
            }
            BindingChange::Added | BindingChange::LevelRaised => SpellAdded {
                wand_id: self.id,
                spell: key.base,
                level: key.level,
                origin: BindingOrigin::Manual,
            },
        };
        self.record(WandEventKind::SpellAdded(kind), correlation_id, clock);
        Ok(true)
    }

    /// Binds a brush manually. Returns `true` if it was added.
    ///
    /// # Errors
    ///
    /// Returns `WandError::Locked` if the wand is locked.
    pub fn add_brush(
        &mut self,
        key: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        self.ensure_unlocked("add_brush")?;
        let event = match self.bindings.brush_change(key, BindingOrigin::Manual) {
            BindingChange::Unchanged | BindingChange::LevelRaised => return Ok(false),
            BindingChange::OriginPromoted => {
                self.record(
                    WandEventKind::BindingPromoted(BindingPromoted {
                        wand_id: self.id,
                        kind: BindingKind::Brush,
                        key: key.to_owned(),
                    }),
                    correlation_id,
                    clock,
                );
                return Ok(false);
            }
            BindingChange::Added => WandEventKind::BrushAdded(BrushAdded {
                wand_id: self.id,
                brush: key.to_owned(),
                origin: BindingOrigin::Manual,
            }),
        };
        self.record(event, correlation_id, clock);
        Ok(true)
    }

    /// Unbinds a spell. A level suffix on `key` is ignored.
    ///
    /// # Errors
    ///
    /// Returns `WandError::Locked` if the wand is locked, or
    /// `WandError::NotBound` if the spell is not bound.
    pub fn remove_spell(
        &mut self,
        key: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), WandError> {
        self.ensure_unlocked("remove_spell")?;
        let base = SpellKey::parse(key).base;
        if self.bindings.spell(&base).is_none() {
            return Err(WandError::NotBound {
                kind: BindingKind::Spell,
                key: base,
            });
        }
        self.record(
            WandEventKind::SpellRemoved(SpellRemoved {
                wand_id: self.id,
                spell: base,
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Unbinds a brush.
    ///
    /// # Errors
    ///
    /// Returns `WandError::Locked` if the wand is locked, or
    /// `WandError::NotBound` if the brush is not bound.
    pub fn remove_brush(
        &mut self,
        key: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), WandError> {
        self.ensure_unlocked("remove_brush")?;
        if !self.bindings.has_brush(key) {
            return Err(WandError::NotBound {
                kind: BindingKind::Brush,
                key: key.to_owned(),
            });
        }
        self.record(
            WandEventKind::BrushRemoved(BrushRemoved {
                wand_id: self.id,
                brush: key.to_owned(),
            }),
            correlation_id,
            clock,
        );
        Ok(())
    }

    /// Points the active spell at a bound spell, or clears it with `None`.
    /// Returns whether the pointer moved.
    ///
    /// # Errors
    ///
    /// Returns `WandError::Locked` if the wand is locked, or
    /// `WandError::NotBound` if the spell is not bound.
    pub fn set_active_spell(
        &mut self,
        key: Option<&str>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        self.ensure_unlocked("set_active_spell")?;
        let base = key.map(|raw| SpellKey::parse(raw).base);
        if let Some(base) = &base {
            if self.bindings.spell(base).is_none() {
                return Err(WandError::NotBound {
                    kind: BindingKind::Spell,
                    key: base.clone(),
                });
            }
        }
        if self.bindings.active_spell() == base.as_deref() {
            return Ok(false);
        }
        self.record(
            WandEventKind::ActiveSpellChanged(ActiveSpellChanged {
                wand_id: self.id,
                spell: base,
            }),
            correlation_id,
            clock,
        );
        Ok(true)
    }

    /// Points the active brush at a bound brush, or clears it with `None`.
    ///
    /// # Errors
    ///
    /// Returns `WandError::Locked` if the wand is locked, or
    /// `WandError::NotBound` if the brush is not bound.
    pub fn set_active_brush(
        &mut self,
        key: Option<&str>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        self.ensure_unlocked("set_active_brush")?;
        if let Some(key) = key {
            if !self.bindings.has_brush(key) {
                return Err(WandError::NotBound {
                    kind: BindingKind::Brush,
                    key: key.to_owned(),
                });
            }
        }
        if self.bindings.active_brush() == key {
            return Ok(false);
        }
        self.record(
            WandEventKind::ActiveBrushChanged(ActiveBrushChanged {
                wand_id: self.id,
                brush: key.map(str::to_owned),
            }),
            correlation_id,
            clock,
        );
        Ok(true)
    }

    /// Binds every catalog spell available at or below `max_level` that the
    /// wand does not have yet. Returns whether anything was added.
    ///
    /// # Errors
    ///
    /// Returns `WandError::Locked` if the wand is locked.
    pub fn fill(
        &mut self,
        max_level: u32,
        catalog: &dyn SpellCatalog,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        self.ensure_unlocked("fill")?;
        let missing: Vec<String> = catalog
            .spell_keys()
            .into_iter()
            .filter(|key| catalog.min_level(key).unwrap_or(1) <= max_level)
            .filter(|key| self.bindings.spell(key).is_none())
            .collect();
        for spell in &missing {
            self.record(
                WandEventKind::SpellAdded(SpellAdded {
                    wand_id: self.id,
                    spell: spell.clone(),
                    level: 1,
                    origin: BindingOrigin::Manual,
                }),
                correlation_id,
                clock,
            );
        }
        Ok(!missing.is_empty())
    }

    /// Absorbs the bindings of `other`. All or nothing: either every missing
    /// spell and brush is added, or the call fails and nothing changes.
    /// Returns whether anything was gained; a repeated merge is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `WandError::IncompatibleMerge` naming the conflict.
    pub fn add(
        &mut self,
        other: &Wand,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        let conflict = if self.id == other.id {
            Some(MergeConflict::SameInstance)
        } else if self.is_locked() {
            Some(MergeConflict::TargetLocked)
        } else if other.is_bound() || other.is_soul() {
            Some(MergeConflict::SourceBound)
        } else if other.is_indestructible() {
            Some(MergeConflict::SourceIndestructible)
        } else {
            match (self.path_key(), other.path_key()) {
                (Some(mine), Some(theirs)) if mine != theirs => Some(MergeConflict::PathMismatch),
                _ => None,
            }
        };
        if let Some(conflict) = conflict {
            warn!(wand_id = %self.id, source_id = %other.id, %conflict, "merge rejected");
            return Err(WandError::IncompatibleMerge(conflict));
        }

        let spells: Vec<String> = other
            .bindings
            .spells()
            .iter()
            .map(|(base, binding)| SpellKey {
                base: base.clone(),
                level: binding.level,
            })
            .filter(|key| {
                matches!(
                    self.bindings.spell_change(key, BindingOrigin::Manual),
                    BindingChange::Added | BindingChange::LevelRaised
                )
            })
            .map(|key| key.to_string())
            .collect();
        let brushes: Vec<String> = other
            .bindings
            .brushes()
            .keys()
            .filter(|key| !self.bindings.has_brush(key))
            .cloned()
            .collect();
        if spells.is_empty() && brushes.is_empty() {
            return Ok(false);
        }

        self.record(
            WandEventKind::WandMerged(WandMerged {
                wand_id: self.id,
                source_id: other.id,
                spells,
                brushes,
            }),
            correlation_id,
            clock,
        );
        info!(wand_id = %self.id, source_id = %other.id, "wand merged");
        Ok(true)
    }

    // ---------------------------------------------------------------------
    // Mana
    // ---------------------------------------------------------------------

    fn record_mana(
        &mut self,
        current: f32,
        reason: ManaChangeReason,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        self.record(
            WandEventKind::ManaChanged(ManaChanged {
                wand_id: self.id,
                current,
                reason,
            }),
            correlation_id,
            clock,
        );
    }

    /// Regenerates `elapsed_ticks` worth of mana. Returns the amount gained;
    /// a full pool or zero ticks records nothing.
    pub fn regenerate(
        &mut self,
        elapsed_ticks: u32,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> f32 {
        let mut preview = self.mana.clone();
        let gained = preview.regenerate(elapsed_ticks);
        if gained > 0.0 {
            self.record_mana(
                preview.current(),
                ManaChangeReason::Regenerated,
                correlation_id,
                clock,
            );
        }
        gained
    }

    /// Charges mana directly. Cost-free and consume-free wands accept the
    /// charge without deducting. Returns the amount deducted.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InsufficientResource` if the balance is too low.
    pub fn charge_mana(
        &mut self,
        amount: f32,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<f32, WandError> {
        let mut preview = self.mana.clone();
        let charged = preview.charge(amount, self.is_cost_free() || self.is_consume_free())?;
        if charged > 0.0 {
            self.record_mana(preview.current(), ManaChangeReason::Charged, correlation_id, clock);
        }
        Ok(charged)
    }

    /// Sets the balance, clamped into range. Returns whether it changed.
    pub fn set_mana(&mut self, value: f32, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        let mut preview = self.mana.clone();
        preview.set_current(value);
        if (preview.current() - self.mana.current()).abs() < f32::EPSILON {
            return false;
        }
        self.record_mana(preview.current(), ManaChangeReason::Set, correlation_id, clock);
        true
    }

    /// Removes up to `amount` mana, stopping at zero. Returns the amount
    /// removed.
    pub fn remove_mana(&mut self, amount: f32, correlation_id: Uuid, clock: &dyn Clock) -> f32 {
        let mut preview = self.mana.clone();
        let removed = preview.drain(amount);
        if removed > 0.0 {
            self.record_mana(preview.current(), ManaChangeReason::Removed, correlation_id, clock);
        }
        removed
    }

    /// Stores a new base mana capacity. Tier bonuses still apply on top.
    pub fn set_mana_max(&mut self, maximum: u32, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        self.store_property(
            PropertyKey::ManaMax,
            PropertyValue::Integer(i64::from(maximum)),
            correlation_id,
            clock,
        )
    }

    // ---------------------------------------------------------------------
    // Casting
    // ---------------------------------------------------------------------

    /// Casts the active spell.
    ///
    /// # Errors
    ///
    /// Returns `WandError::NoActiveSpell` if nothing is active, otherwise
    /// the errors of `cast_spell`.
    pub fn cast(
        &mut self,
        catalog: &dyn SpellCatalog,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<CastReceipt, WandError> {
        let active = self
            .bindings
            .active_spell()
            .map(str::to_owned)
            .ok_or(WandError::NoActiveSpell)?;
        self.cast_spell(&active, catalog, correlation_id, clock)
    }

    /// Casts a bound spell: resolves its effective cost, charges it and
    /// records the cast. Either all of that happens or none of it.
    ///
    /// # Errors
    ///
    /// Returns `WandError::NotBound` if the spell is not bound,
    /// `WandError::UnknownSpell` if the catalog has no cost for it, or
    /// `WandError::InsufficientResource` if the balance is too low.
    pub fn cast_spell(
        &mut self,
        key: &str,
        catalog: &dyn SpellCatalog,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<CastReceipt, WandError> {
        let base = SpellKey::parse(key).base;
        let level = self
            .bindings
            .spell(&base)
            .map(|binding| binding.level)
            .ok_or_else(|| WandError::NotBound {
                kind: BindingKind::Spell,
                key: base.clone(),
            })?;
        let base_cost = catalog
            .base_cost(&base)
            .ok_or_else(|| WandError::UnknownSpell(base.clone()))?;
        let cost = self.effective_cost(base_cost);

        let mut preview = self.mana.clone();
        let charged = preview
            .charge(cost, self.is_consume_free())
            .inspect_err(|_| {
                warn!(wand_id = %self.id, spell = %base, cost, "cast rejected: not enough mana");
            })?;

        let receipt = CastReceipt {
            spell: base,
            level,
            cost: charged,
            remaining: preview.current(),
            power: self.power(),
        };
        self.record(
            WandEventKind::SpellCast(SpellCast {
                wand_id: self.id,
                spell: receipt.spell.clone(),
                level: receipt.level,
                cost: receipt.cost,
                remaining: receipt.remaining,
                power: receipt.power,
            }),
            correlation_id,
            clock,
        );
        Ok(receipt)
    }

    // ---------------------------------------------------------------------
    // Owner
    // ---------------------------------------------------------------------

    /// Binds the wand to an owner. Returns whether anything changed.
    pub fn bind(&mut self, owner: WandOwner, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        if self.is_bound() && self.owner.as_ref() == Some(&owner) {
            return false;
        }
        self.record(
            WandEventKind::OwnerBound(OwnerBound {
                wand_id: self.id,
                owner,
            }),
            correlation_id,
            clock,
        );
        true
    }

    /// Releases the owner binding. Returns `false` if there was none.
    pub fn unbind(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        let Some(previous) = self.owner.clone() else {
            return false;
        };
        self.record(
            WandEventKind::OwnerUnbound(OwnerUnbound {
                wand_id: self.id,
                previous,
            }),
            correlation_id,
            clock,
        );
        true
    }

    /// Whether `actor_id` may use the wand.
    #[must_use]
    pub fn can_use(&self, actor_id: Uuid) -> bool {
        !self.is_bound() || self.owner.as_ref().is_none_or(|owner| owner.id == actor_id)
    }

    // ---------------------------------------------------------------------
    // Lost and found
    // ---------------------------------------------------------------------

    /// Whether losing this wand should leave a recovery record.
    #[must_use]
    pub fn is_tracked_when_lost(&self) -> bool {
        self.is_bound() || self.is_soul() || self.is_undroppable() || self.is_indestructible()
    }

    /// Snapshots identity and position into a recovery record. The wand
    /// itself is left untouched.
    #[must_use]
    pub fn make_lost(&self, position: WorldPosition, clock: &dyn Clock) -> LostWand {
        LostWand {
            wand_id: self.id,
            name: self.name(),
            template_key: self.template.key.clone(),
            position,
            owner: self.owner.clone(),
            created_at: clock.now(),
        }
    }

    /// Whether `lost` records this wand.
    #[must_use]
    pub fn is_lost(&self, lost: &LostWand) -> bool {
        lost.wand_id == self.id
    }

    // ---------------------------------------------------------------------
    // Describe
    // ---------------------------------------------------------------------

    /// Human-readable summary, one line per aspect.
    #[must_use]
    pub fn describe(&self) -> Vec<String> {
        let mut lines = vec![format!("{} ({})", self.name(), self.template.key)];
        let description = self.description();
        if !description.is_empty() {
            lines.push(description);
        }
        lines.push(format!(
            "Mana: {:.0}/{} (+{}/tick)",
            self.mana.current(),
            self.mana.maximum(),
            self.mana.regeneration()
        ));
        if let (Some(path), Some(tier)) = (self.path.as_ref(), self.tier_key()) {
            lines.push(format!(
                "Path: {} at {} ({}/{})",
                path.key,
                tier,
                self.tier + 1,
                path.tiers().len()
            ));
        }
        let active = self.bindings.active_spell();
        let spells: Vec<String> = self
            .bindings
            .spells()
            .iter()
            .map(|(base, binding)| {
                let key = SpellKey {
                    base: base.clone(),
                    level: binding.level,
                };
                if active == Some(base.as_str()) {
                    format!("*{key}")
                } else {
                    key.to_string()
                }
            })
            .collect();
        if !spells.is_empty() {
            lines.push(format!("Spells: {}", spells.join(", ")));
        }
        let brushes = self.bindings.brush_keys();
        if !brushes.is_empty() {
            lines.push(format!("Brushes: {}", brushes.join(", ")));
        }
        if self.is_locked() {
            lines.push("Locked".to_owned());
        }
        if let Some(owner) = self.owner.as_ref().filter(|_| self.is_bound()) {
            lines.push(format!("Bound to {}", owner.name));
        }
        lines
    }
}

impl AggregateRoot for Wand {
    type Event = WandEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            WandEventKind::WandCreated(payload) => {
                self.grant(&payload.spells, &payload.brushes, BindingOrigin::Template);
                self.grant(
                    &payload.granted_spells,
                    &payload.granted_brushes,
                    BindingOrigin::TierGranted,
                );
                self.sync_mana();
                if payload.duplicated_from.is_none() {
                    self.mana.fill();
                }
            }
            WandEventKind::SpellAdded(payload) => {
                let key = SpellKey {
                    base: payload.spell.clone(),
                    level: payload.level,
                };
                self.bindings.insert_spell(&key, payload.origin);
            }
            WandEventKind::SpellRemoved(payload) => {
                let _ = self.bindings.remove_spell(&payload.spell);
            }
            WandEventKind::BrushAdded(payload) => {
                self.bindings.insert_brush(&payload.brush, payload.origin);
            }
            WandEventKind::BrushRemoved(payload) => {
                let _ = self.bindings.remove_brush(&payload.brush);
            }
            WandEventKind::BindingPromoted(payload) => match payload.kind {
                BindingKind::Spell => {
                    self.bindings
                        .insert_spell(&SpellKey::parse(&payload.key), BindingOrigin::Manual);
                }
                BindingKind::Brush => {
                    self.bindings.insert_brush(&payload.key, BindingOrigin::Manual);
                }
            },
            WandEventKind::ActiveSpellChanged(payload) => {
                let _ = self.bindings.set_active_spell(payload.spell.as_deref());
            }
            WandEventKind::ActiveBrushChanged(payload) => {
                let _ = self.bindings.set_active_brush(payload.brush.as_deref());
            }
            WandEventKind::ManaChanged(payload) => self.mana.set_current(payload.current),
            WandEventKind::SpellCast(payload) => {
                self.mana.set_current(payload.remaining);
                self.progress.casts += 1;
            }
            WandEventKind::OverrideSet(payload) => {
                let _ = self
                    .properties
                    .set_override(payload.property, payload.value.clone());
                self.sync_mana();
            }
            WandEventKind::OverrideRemoved(payload) => {
                self.properties.remove_override(payload.property);
                self.sync_mana();
            }
            WandEventKind::OverridesReplaced(payload) => {
                let _ = self.properties.replace_overrides(payload.overrides.clone());
                self.sync_mana();
            }
            WandEventKind::PropertiesChanged(payload) => {
                for (key, value) in &payload.values {
                    let _ = self.properties.set_instance(*key, value.clone());
                }
                self.sync_mana();
            }
            WandEventKind::LockChanged(payload) => {
                let _ = self
                    .properties
                    .set_instance(PropertyKey::Locked, PropertyValue::Flag(payload.locked));
            }
            WandEventKind::OwnerBound(payload) => {
                self.owner = Some(payload.owner.clone());
                let _ = self
                    .properties
                    .set_instance(PropertyKey::Bound, PropertyValue::Flag(true));
            }
            WandEventKind::OwnerUnbound(_) => {
                self.owner = None;
                let _ = self
                    .properties
                    .set_instance(PropertyKey::Bound, PropertyValue::Flag(false));
            }
            WandEventKind::TierAdvanced(payload) => {
                self.tier = payload.to_tier;
                self.grant(
                    &payload.granted_spells,
                    &payload.granted_brushes,
                    BindingOrigin::TierGranted,
                );
                self.sync_mana();
            }
            WandEventKind::PathChanged(payload) => {
                self.path = self.registry.path(&payload.path).ok();
                self.tier = 0;
                self.grant(
                    &payload.granted_spells,
                    &payload.granted_brushes,
                    BindingOrigin::TierGranted,
                );
                self.sync_mana();
            }
            WandEventKind::WandUnenchanted(payload) => {
                for spell in &payload.removed_spells {
                    let _ = self.bindings.remove_spell(spell);
                }
                for brush in &payload.removed_brushes {
                    let _ = self.bindings.remove_brush(brush);
                }
                self.tier = 0;
                self.progress.enchant_levels = 0;
                self.sync_mana();
            }
            WandEventKind::DamageRecorded(payload) => {
                self.progress.damage_dealt += payload.amount;
            }
            WandEventKind::WandEnchanted(payload) => {
                self.progress.enchant_levels =
                    self.progress.enchant_levels.saturating_add(payload.levels);
                if let Some(spell) = &payload.granted_spell {
                    self.bindings
                        .insert_spell(&SpellKey::parse(spell), BindingOrigin::TierGranted);
                }
            }
            WandEventKind::WandMerged(payload) => {
                self.grant(&payload.spells, &payload.brushes, BindingOrigin::Manual);
            }
        }
        self.version += 1;
        self.dirty = true;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}

fn coerce_all(values: PropertyMap) -> Result<PropertyMap, WandError> {
    values
        .into_iter()
        .map(|(key, value)| key.coerce(value).map(|value| (key, value)))
        .collect()
}

fn saturate_u32(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fixtures::{catalog, clock, registry, wand};
    use wandcraft_core::event::DomainEvent;

    fn cid() -> Uuid {
        Uuid::new_v4()
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_from_template_records_created_event_with_bindings() {
        // Arrange
        let id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let clock = clock();

        // Act
        let wand = Wand::from_template(id, "beginner", registry(), correlation_id, &clock).unwrap();

        // Assert
        let events = wand.uncommitted_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type(), "wand.created");
        let meta = events[0].metadata();
        assert_eq!(meta.aggregate_id, id);
        assert_eq!(meta.sequence_number, 1);
        assert_eq!(meta.correlation_id, correlation_id);
        assert_eq!(meta.occurred_at, clock.0);

        assert_eq!(wand.version(), 1);
        assert!(wand.has_spell("fire"));
        assert!(wand.has_spell("heal"));
        assert!(wand.has_brush("glass"));
        assert_eq!(wand.bindings().brush_origin("glass"), Some(BindingOrigin::TierGranted));
        assert_eq!(wand.tier_key(), Some("novice"));
        assert_eq!(wand.mana().maximum(), 100);
        assert!(wand.mana().is_full());
        assert_eq!(wand.icon(), "stick");
        assert!(wand.has_tag("starter"));
    }

    #[test]
    fn test_from_template_rejects_unknown_template() {
        let result = Wand::from_template(Uuid::new_v4(), "ghost", registry(), cid(), &clock());

        match result {
            Err(WandError::UnknownTemplate(key)) => assert_eq!(key, "ghost"),
            other => panic!("expected UnknownTemplate, got {other:?}"),
        }
    }

    #[test]
    fn test_charge_then_regenerate_reaches_ninety() {
        // Arrange
        let mut wand = wand("beginner");
        let clock = clock();

        // Act
        wand.charge_mana(30.0, cid(), &clock).unwrap();
        for _ in 0..4 {
            wand.regenerate(1, cid(), &clock);
        }

        // Assert
        assert!(approx(wand.mana().current(), 90.0));
    }

    #[test]
    fn test_regenerating_a_full_pool_records_nothing() {
        let mut wand = wand("beginner");

        let gained = wand.regenerate(10, cid(), &clock());

        assert!(approx(gained, 0.0));
        assert!(wand.uncommitted_events().is_empty());
    }

    #[test]
    fn test_cost_free_wand_charges_nothing() {
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_override(PropertyKey::CostReduction, "1".into(), cid(), &clock)
            .unwrap();

        let charged = wand.charge_mana(500.0, cid(), &clock).unwrap();

        assert!(approx(charged, 0.0));
        assert!(wand.mana().is_full());
        assert!(wand.is_cost_free());
    }

    #[test]
    fn test_non_finite_cost_reduction_is_rejected_and_casts_still_cost() {
        // Arrange
        let mut wand = wand("beginner");
        let clock = clock();

        // Act
        let result = wand.set_property(
            PropertyKey::CostReduction,
            PropertyValue::Float(f64::NAN),
            cid(),
            &clock,
        );
        wand.set_mana(0.0, cid(), &clock);
        let cast = wand.cast_spell("fire", &catalog(), cid(), &clock);

        // Assert
        assert!(matches!(result, Err(WandError::InvalidProperty { .. })));
        assert!(approx(wand.cost_reduction(), 0.0));
        assert!(matches!(cast, Err(WandError::InsufficientResource { .. })));
    }

    #[test]
    fn test_non_finite_template_factor_reads_as_zero() {
        let mut template = WandTemplate::new("cursed");
        template.mana_max = 50;
        template
            .properties
            .insert(PropertyKey::CostReduction, PropertyValue::Float(f64::INFINITY));
        template
            .properties
            .insert(PropertyKey::Power, PropertyValue::Float(f64::NAN));
        let registry = Arc::new(TemplateRegistry::from_parts(vec![template], Vec::new()).unwrap());

        let wand = Wand::from_template(Uuid::new_v4(), "cursed", registry, cid(), &clock()).unwrap();

        assert!(approx(wand.cost_reduction(), 0.0));
        assert!(!wand.is_cost_free());
        assert!(approx(wand.power(), 0.0));
        assert!(approx(wand.effective_cost(10.0), 10.0));
    }

    #[test]
    fn test_insufficient_mana_fails_without_change() {
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_mana(5.0, cid(), &clock);
        wand.clear_uncommitted_events();

        let result = wand.charge_mana(6.0, cid(), &clock);

        assert!(matches!(result, Err(WandError::InsufficientResource { .. })));
        assert!(approx(wand.mana().current(), 5.0));
        assert!(wand.uncommitted_events().is_empty());
    }

    #[test]
    fn test_remove_active_spell_clears_active_pointer() {
        // Arrange
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_active_spell(Some("fire"), cid(), &clock).unwrap();

        // Act
        wand.remove_spell("fire", cid(), &clock).unwrap();

        // Assert
        assert_eq!(wand.active_spell(), None);
        assert!(!wand.has_spell("fire"));
        assert!(wand.has_spell("heal"));
    }

    #[test]
    fn test_remove_other_spell_keeps_active_pointer() {
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_active_spell(Some("fire"), cid(), &clock).unwrap();

        wand.remove_spell("heal", cid(), &clock).unwrap();

        assert_eq!(wand.active_spell(), Some("fire"));
    }

    #[test]
    fn test_locked_wand_rejects_every_binding_edit() {
        // Arrange
        let mut wand = wand("beginner");
        let clock = clock();
        wand.add_brush("digger", cid(), &clock).unwrap();
        assert!(wand.set_locked(true, cid(), &clock));
        wand.clear_uncommitted_events();
        let before = wand.bindings().clone();

        // Act
        let results = [
            wand.add_spell("blink", cid(), &clock).map(|_| ()),
            wand.remove_spell("fire", cid(), &clock),
            wand.add_brush("stone", cid(), &clock).map(|_| ()),
            wand.remove_brush("digger", cid(), &clock),
            wand.set_active_spell(Some("fire"), cid(), &clock).map(|_| ()),
            wand.set_active_brush(Some("digger"), cid(), &clock).map(|_| ()),
        ];

        // Assert
        for result in results {
            assert_eq!(result, Err(WandError::Locked));
        }
        assert_eq!(wand.bindings(), &before);
        assert!(!wand.has_spell("blink"));
        assert!(wand.uncommitted_events().is_empty());
    }

    #[test]
    fn test_lock_override_also_locks() {
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_override(PropertyKey::Locked, "true".into(), cid(), &clock)
            .unwrap();

        assert_eq!(wand.add_spell("blink", cid(), &clock), Err(WandError::Locked));
    }

    #[test]
    fn test_set_locked_clears_conflicting_lock_override() {
        // Arrange
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_override(PropertyKey::Locked, "false".into(), cid(), &clock)
            .unwrap();
        wand.clear_uncommitted_events();

        // Act
        let changed = wand.set_locked(true, cid(), &clock);

        // Assert
        assert!(changed);
        assert!(wand.is_locked());
        assert_eq!(wand.get_override(PropertyKey::Locked), None);
        assert_eq!(wand.add_spell("blink", cid(), &clock), Err(WandError::Locked));
        assert_eq!(wand.uncommitted_events().len(), 2);
    }

    #[test]
    fn test_unlock_clears_lock_override_when_instance_already_unlocked() {
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_override(PropertyKey::Locked, "true".into(), cid(), &clock)
            .unwrap();

        assert!(wand.set_locked(false, cid(), &clock));
        assert!(!wand.is_locked());
        assert!(wand.add_spell("blink", cid(), &clock).unwrap());
        assert!(!wand.set_locked(false, cid(), &clock));
    }

    #[test]
    fn test_set_locked_keeps_agreeing_lock_override() {
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_override(PropertyKey::Locked, "true".into(), cid(), &clock)
            .unwrap();

        assert!(wand.set_locked(true, cid(), &clock));
        assert_eq!(wand.get_override(PropertyKey::Locked), Some("true"));
        assert!(wand.is_locked());
    }

    #[test]
    fn test_add_spell_is_idempotent() {
        let mut wand = wand("beginner");
        let clock = clock();

        assert!(wand.add_spell("frost", cid(), &clock).unwrap());
        assert!(!wand.add_spell("frost", cid(), &clock).unwrap());
        assert_eq!(wand.uncommitted_events().len(), 1);
    }

    #[test]
    fn test_add_spell_with_higher_level_raises_binding() {
        let mut wand = wand("beginner");
        let clock = clock();

        assert!(wand.add_spell("fire|3", cid(), &clock).unwrap());

        assert_eq!(wand.spell_level("fire"), Some(3));
        assert!(wand.has_spell("fire|2"));
        assert!(!wand.has_spell("fire|4"));
    }

    #[test]
    fn test_explicit_add_of_tier_grant_promotes_origin() {
        // Arrange
        let mut wand = wand("beginner");
        let clock = clock();

        // Act
        let changed = wand.add_brush("glass", cid(), &clock).unwrap();

        // Assert
        assert!(!changed);
        assert_eq!(wand.bindings().brush_origin("glass"), Some(BindingOrigin::Manual));
        assert_eq!(wand.uncommitted_events()[0].event_type(), "wand.binding_promoted");
    }

    #[test]
    fn test_set_active_spell_requires_binding() {
        let mut wand = wand("beginner");

        let result = wand.set_active_spell(Some("meteor"), cid(), &clock());

        match result {
            Err(WandError::NotBound { kind, key }) => {
                assert_eq!(kind, BindingKind::Spell);
                assert_eq!(key, "meteor");
            }
            other => panic!("expected NotBound, got {other:?}"),
        }
    }

    #[test]
    fn test_remove_unbound_brush_reports_not_bound() {
        let mut wand = wand("beginner");

        let result = wand.remove_brush("digger", cid(), &clock());

        assert!(matches!(result, Err(WandError::NotBound { .. })));
    }

    #[test]
    fn test_fill_adds_missing_spells_up_to_level() {
        // Arrange
        let mut wand = wand("beginner");
        let clock = clock();
        let catalog = catalog();

        // Act
        let changed = wand.fill(2, &catalog, cid(), &clock).unwrap();
        let again = wand.fill(2, &catalog, cid(), &clock).unwrap();

        // Assert
        assert!(changed);
        assert!(!again);
        assert!(wand.has_spell("frost"));
        assert!(wand.has_spell("blink"));
        assert!(!wand.has_spell("meteor"));
    }

    #[test]
    fn test_fill_rejected_when_locked() {
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_locked(true, cid(), &clock);

        assert_eq!(wand.fill(9, &catalog(), cid(), &clock), Err(WandError::Locked));
    }

    #[test]
    fn test_merge_adds_missing_brush_and_is_idempotent() {
        // Arrange
        let mut target = wand("plain");
        let mut source = wand("plain");
        let clock = clock();
        source.add_brush("digger", cid(), &clock).unwrap();
        source.add_spell("frost|2", cid(), &clock).unwrap();

        // Act
        let first = target.add(&source, cid(), &clock).unwrap();
        let spells_after_first = target.bindings().spell_keys();
        let brushes_after_first = target.bindings().brush_keys();
        let second = target.add(&source, cid(), &clock).unwrap();

        // Assert
        assert!(first);
        assert!(!second);
        assert!(target.has_brush("digger"));
        assert_eq!(target.spell_level("frost"), Some(2));
        assert_eq!(target.bindings().spell_keys(), spells_after_first);
        assert_eq!(target.bindings().brush_keys(), brushes_after_first);
    }

    #[test]
    fn test_merge_into_locked_wand_fails_without_change() {
        let mut target = wand("plain");
        let mut source = wand("plain");
        let clock = clock();
        source.add_brush("digger", cid(), &clock).unwrap();
        target.set_locked(true, cid(), &clock);

        let result = target.add(&source, cid(), &clock);

        assert_eq!(
            result,
            Err(WandError::IncompatibleMerge(MergeConflict::TargetLocked))
        );
        assert!(!target.has_brush("digger"));
    }

    #[test]
    fn test_merge_rejects_bound_or_indestructible_source() {
        let mut target = wand("plain");
        let mut bound = wand("plain");
        let mut sturdy = wand("plain");
        let clock = clock();
        bound.bind(WandOwner::new(Uuid::new_v4(), "Morgana"), cid(), &clock);
        sturdy
            .set_property(PropertyKey::Indestructible, PropertyValue::Flag(true), cid(), &clock)
            .unwrap();

        assert_eq!(
            target.add(&bound, cid(), &clock),
            Err(WandError::IncompatibleMerge(MergeConflict::SourceBound))
        );
        assert_eq!(
            target.add(&sturdy, cid(), &clock),
            Err(WandError::IncompatibleMerge(MergeConflict::SourceIndestructible))
        );
    }

    #[test]
    fn test_merge_rejects_self() {
        let mut target = wand("plain");
        let copy_of_self = target.duplicate(target.id, cid(), &clock());

        assert_eq!(
            target.add(&copy_of_self, cid(), &clock()),
            Err(WandError::IncompatibleMerge(MergeConflict::SameInstance))
        );
    }

    #[test]
    fn test_duplicate_is_independent_of_original() {
        // Arrange
        let mut original = wand("beginner");
        let clock = clock();
        original
            .set_override(PropertyKey::Power, "0.5".into(), cid(), &clock)
            .unwrap();
        original.bind(WandOwner::new(Uuid::new_v4(), "Morgana"), cid(), &clock);
        original.charge_mana(40.0, cid(), &clock).unwrap();

        // Act
        let mut copy = original.duplicate(Uuid::new_v4(), cid(), &clock);
        copy.add_spell("frost", cid(), &clock).unwrap();
        copy.remove_spell("fire", cid(), &clock).unwrap();
        copy.charge_mana(10.0, cid(), &clock).unwrap();
        copy.remove_override(PropertyKey::Power, cid(), &clock);

        // Assert
        assert_ne!(copy.id, original.id);
        assert!(copy.owner().is_none());
        assert!(!copy.is_bound());
        assert!(original.has_spell("fire"));
        assert!(!original.has_spell("frost"));
        assert!(approx(original.mana().current(), 60.0));
        assert!(approx(copy.mana().current(), 50.0));
        assert_eq!(original.get_override(PropertyKey::Power), Some("0.5"));
        match &copy.uncommitted_events()[0].kind {
            WandEventKind::WandCreated(payload) => {
                assert_eq!(payload.duplicated_from, Some(original.id));
            }
            other => panic!("expected WandCreated, got {other:?}"),
        }
    }

    #[test]
    fn test_override_round_trip_restores_resolved_value() {
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_property(PropertyKey::Power, PropertyValue::Float(0.3), cid(), &clock)
            .unwrap();
        let before = wand.property_with_source(PropertyKey::Power);

        wand.set_override(PropertyKey::Power, "0.9".into(), cid(), &clock)
            .unwrap();
        assert_eq!(wand.property(PropertyKey::Power), PropertyValue::Float(0.9));
        assert!(wand.remove_override(PropertyKey::Power, cid(), &clock));

        assert_eq!(wand.property_with_source(PropertyKey::Power), before);
        assert!(!wand.remove_override(PropertyKey::Power, cid(), &clock));
    }

    #[test]
    fn test_mana_max_override_resyncs_pool() {
        let mut wand = wand("beginner");
        let clock = clock();

        wand.set_override(PropertyKey::ManaMax, "40".into(), cid(), &clock)
            .unwrap();

        assert_eq!(wand.mana().maximum(), 40);
        assert!(approx(wand.mana().current(), 40.0));

        wand.remove_override(PropertyKey::ManaMax, cid(), &clock);
        assert_eq!(wand.mana().maximum(), 100);
        assert!(approx(wand.mana().current(), 40.0));
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let mut wand = wand("beginner");

        let result = wand.set_override(PropertyKey::ManaMax, "plenty".into(), cid(), &clock());

        assert!(matches!(result, Err(WandError::InvalidProperty { .. })));
        assert!(wand.overrides().is_empty());
        assert!(wand.uncommitted_events().is_empty());
    }

    #[test]
    fn test_cast_spell_charges_reduced_cost_and_counts_cast() {
        // Arrange
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_property(PropertyKey::CostReduction, PropertyValue::Float(0.5), cid(), &clock)
            .unwrap();
        wand.set_active_spell(Some("heal"), cid(), &clock).unwrap();
        wand.clear_uncommitted_events();

        // Act
        let receipt = wand.cast(&catalog(), cid(), &clock).unwrap();

        // Assert
        assert_eq!(receipt.spell, "heal");
        assert!(approx(receipt.cost, 10.0));
        assert!(approx(receipt.remaining, 90.0));
        assert!(approx(wand.mana().current(), 90.0));
        assert_eq!(wand.progress().casts, 1);
        assert_eq!(wand.uncommitted_events()[0].event_type(), "wand.spell_cast");
    }

    #[test]
    fn test_cast_without_mana_is_atomic() {
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_mana(3.0, cid(), &clock);
        wand.clear_uncommitted_events();

        let result = wand.cast_spell("fire", &catalog(), cid(), &clock);

        assert!(matches!(result, Err(WandError::InsufficientResource { .. })));
        assert!(approx(wand.mana().current(), 3.0));
        assert_eq!(wand.progress().casts, 0);
        assert!(wand.uncommitted_events().is_empty());
    }

    #[test]
    fn test_cast_requires_binding_and_active_spell() {
        let mut wand = wand("beginner");
        let clock = clock();
        let catalog = catalog();

        assert_eq!(wand.cast(&catalog, cid(), &clock), Err(WandError::NoActiveSpell));
        assert!(matches!(
            wand.cast_spell("meteor", &catalog, cid(), &clock),
            Err(WandError::NotBound { .. })
        ));
    }

    #[test]
    fn test_upgrade_only_raises_values() {
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_property(PropertyKey::Power, PropertyValue::Float(0.6), cid(), &clock)
            .unwrap();

        let lower = PropertyMap::from([(PropertyKey::Power, PropertyValue::Float(0.2))]);
        let higher = PropertyMap::from([
            (PropertyKey::Power, PropertyValue::Float(0.8)),
            (PropertyKey::QuickCast, PropertyValue::Flag(true)),
        ]);

        assert!(!wand.upgrade(lower, cid(), &clock).unwrap());
        assert!(wand.upgrade(higher, cid(), &clock).unwrap());
        assert_eq!(wand.property(PropertyKey::Power), PropertyValue::Float(0.8));
        assert!(wand.is_quick_cast());
    }

    #[test]
    fn test_configure_is_all_or_nothing() {
        let mut wand = wand("beginner");
        let values = PropertyMap::from([
            (PropertyKey::Power, PropertyValue::Float(0.4)),
            (PropertyKey::Locked, PropertyValue::Integer(3)),
        ]);

        let result = wand.configure(values, cid(), &clock());

        assert!(result.is_err());
        assert_eq!(wand.property(PropertyKey::Power), PropertyValue::Float(0.0));
    }

    #[test]
    fn test_bound_wand_is_usable_only_by_owner() {
        let mut wand = wand("beginner");
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let clock = clock();
        assert!(wand.can_use(stranger));

        wand.bind(WandOwner::new(owner, "Morgana"), cid(), &clock);

        assert!(wand.can_use(owner));
        assert!(!wand.can_use(stranger));
        assert!(wand.is_tracked_when_lost());
        assert!(wand.unbind(cid(), &clock));
        assert!(wand.can_use(stranger));
        assert!(!wand.unbind(cid(), &clock));
    }

    #[test]
    fn test_tradable_worth_is_none_for_bound_wand() {
        let mut wand = wand("beginner");
        let catalog = catalog();
        assert_eq!(wand.tradable_worth(&catalog), Some(wand.worth(&catalog)));

        wand.bind(WandOwner::new(Uuid::new_v4(), "Morgana"), cid(), &clock());

        assert_eq!(wand.tradable_worth(&catalog), None);
    }

    #[test]
    fn test_make_lost_snapshots_identity_without_mutation() {
        let wand = wand("beginner");
        let clock = clock();
        let version = wand.version();

        let lost = wand.make_lost(WorldPosition::new("overworld", 1.0, 2.0, 3.0), &clock);

        assert!(wand.is_lost(&lost));
        assert_eq!(lost.template_key, "beginner");
        assert_eq!(lost.created_at, clock.0);
        assert_eq!(wand.version(), version);
        assert!(!wand.is_dirty());
        assert!(!wand.is_lost(&LostWand {
            wand_id: Uuid::new_v4(),
            ..lost
        }));
    }

    #[test]
    fn test_describe_marks_active_spell_and_path() {
        let mut wand = wand("beginner");
        let clock = clock();
        wand.set_name("Ember", cid(), &clock);
        wand.set_active_spell(Some("fire"), cid(), &clock).unwrap();

        let lines = wand.describe();

        assert_eq!(lines[0], "Ember (beginner)");
        assert!(lines.contains(&"Mana: 100/100 (+5/tick)".to_owned()));
        assert!(lines.contains(&"Path: apprentice at novice (1/3)".to_owned()));
        assert!(lines.contains(&"Spells: *fire, heal".to_owned()));
    }

    #[test]
    fn test_sequence_numbers_follow_version() {
        let mut wand = wand("beginner");
        let clock = clock();

        wand.add_spell("frost", cid(), &clock).unwrap();
        wand.set_active_spell(Some("frost"), cid(), &clock).unwrap();

        let sequence: Vec<i64> = wand
            .uncommitted_events()
            .iter()
            .map(|event| event.metadata().sequence_number)
            .collect();
        assert_eq!(sequence, vec![2, 3]);
        assert_eq!(wand.version(), 3);
    }
}
