//! Upgrade-path progression, enchanting and worth.

use tracing::{debug, info, warn};
use uuid::Uuid;
use wandcraft_core::clock::Clock;
use wandcraft_core::rng::DeterministicRng;

use super::aggregates::Wand;
use super::bindings::SpellKey;
use super::error::WandError;
use super::events::{
    DamageRecorded, PathChanged, TierAdvanced, WandEnchanted, WandEventKind, WandUnenchanted,
};
use super::path::Eligibility;
use super::ports::{AdvancementPolicy, SpellCatalog};
use super::properties::PropertyKey;

/// What a `check_and_upgrade` call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The wand follows no upgrade path.
    NoPath,
    /// Already on the last tier.
    Terminal,
    /// Progress is below the next tier's threshold.
    NotYet { progress: u64, required: u64 },
    /// Moved up exactly one tier.
    Advanced {
        from_tier: usize,
        to_tier: usize,
        tier_key: String,
    },
}

impl UpgradeOutcome {
    #[must_use]
    pub fn advanced(&self) -> bool {
        matches!(self, Self::Advanced { .. })
    }
}

impl Wand {
    /// Base worth property plus the catalog worth of every binding.
    #[must_use]
    pub fn worth(&self, catalog: &dyn SpellCatalog) -> u64 {
        let base = u64::try_from(self.property(PropertyKey::Worth).as_i64().max(0)).unwrap_or(0);
        self.bindings
            .spells()
            .keys()
            .chain(self.bindings.brushes().keys())
            .map(|key| catalog.worth(key))
            .fold(base, u64::saturating_add)
    }

    /// Worth when the wand may be traded; `None` for bound, soul or
    /// indestructible wands.
    #[must_use]
    pub fn tradable_worth(&self, catalog: &dyn SpellCatalog) -> Option<u64> {
        if self.is_bound() || self.is_soul() || self.is_indestructible() {
            return None;
        }
        Some(self.worth(catalog))
    }

    /// Progress along the current path, measured by the path's metric.
    #[must_use]
    pub fn path_progress(&self, catalog: &dyn SpellCatalog) -> Option<u64> {
        self.path
            .as_ref()
            .map(|path| path.metric.measure(&self.progress, self.worth(catalog)))
    }

    /// Advances at most one tier if the next threshold is met. The new
    /// tier's grants are added on top of existing bindings and its mana
    /// bonus applies immediately. A `quiet` upgrade renders no message.
    ///
    /// # Errors
    ///
    /// Returns `WandError::PolicyBlocked` if `policy` refuses the next tier.
    pub fn check_and_upgrade(
        &mut self,
        quiet: bool,
        catalog: &dyn SpellCatalog,
        policy: &dyn AdvancementPolicy,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<UpgradeOutcome, WandError> {
        let Some(path) = self.path.clone() else {
            return Ok(UpgradeOutcome::NoPath);
        };
        let progress = path.metric.measure(&self.progress, self.worth(catalog));
        let next = match path.eligibility(self.tier, progress) {
            Eligibility::Terminal => return Ok(UpgradeOutcome::Terminal),
            Eligibility::NotYet { required, .. } => {
                return Ok(UpgradeOutcome::NotYet { progress, required });
            }
            Eligibility::Eligible { next } => next,
        };
        let Some(tier) = path.tier(next) else {
            return Ok(UpgradeOutcome::Terminal);
        };

        if policy.is_blocked(self.owner.as_ref(), &path.key, &tier.key) {
            warn!(
                wand_id = %self.id,
                path = %path.key,
                tier = %tier.key,
                "advancement blocked by policy"
            );
            return Err(WandError::PolicyBlocked {
                path: path.key.clone(),
                tier: tier.key.clone(),
            });
        }

        let from_tier = self.tier;
        let (granted_spells, granted_brushes) = self.pending_grants(tier);
        self.record(
            WandEventKind::TierAdvanced(TierAdvanced {
                wand_id: self.id,
                path: path.key.clone(),
                from_tier,
                to_tier: next,
                tier_key: tier.key.clone(),
                granted_spells,
                granted_brushes,
                quiet,
            }),
            correlation_id,
            clock,
        );
        info!(wand_id = %self.id, path = %path.key, tier = %tier.key, "wand advanced");
        Ok(UpgradeOutcome::Advanced {
            from_tier,
            to_tier: next,
            tier_key: tier.key.clone(),
        })
    }

    /// Adds enchant levels. With `add_spells`, one spell the wand does not
    /// know yet may be drawn from the next tier's optional pool. Returns
    /// `false` for zero levels.
    pub fn enchant(
        &mut self,
        levels: u64,
        add_spells: bool,
        rng: &mut dyn DeterministicRng,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> bool {
        if levels == 0 {
            return false;
        }
        let granted_spell = if add_spells {
            self.draw_optional_spell(rng)
        } else {
            None
        };
        self.record(
            WandEventKind::WandEnchanted(WandEnchanted {
                wand_id: self.id,
                levels,
                granted_spell,
            }),
            correlation_id,
            clock,
        );
        true
    }

    fn draw_optional_spell(&self, rng: &mut dyn DeterministicRng) -> Option<String> {
        let path = self.path.as_ref()?;
        let tier = path.tier(self.tier + 1).or_else(|| path.tier(self.tier))?;
        let candidates: Vec<&String> = tier
            .optional_spells
            .iter()
            .filter(|raw| self.bindings.spell(&SpellKey::parse(raw).base).is_none())
            .collect();
        let last = u32::try_from(candidates.len().checked_sub(1)?).unwrap_or(u32::MAX);
        let index = usize::try_from(rng.next_u32_range(0, last)).unwrap_or(0);
        candidates.get(index).map(|raw| (*raw).clone())
    }

    /// Adds to the damage counter. Non-positive and non-finite amounts are
    /// ignored.
    pub fn damage_dealt(&mut self, amount: f64, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        if !amount.is_finite() || amount <= 0.0 {
            return false;
        }
        self.record(
            WandEventKind::DamageRecorded(DamageRecorded {
                wand_id: self.id,
                amount,
            }),
            correlation_id,
            clock,
        );
        true
    }

    /// Moves the wand onto another path at its first tier. Bindings are
    /// kept; the first tier's grants are added.
    ///
    /// # Errors
    ///
    /// Returns `WandError::UnknownPath` if the registry has no such path.
    pub fn set_path(
        &mut self,
        key: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<bool, WandError> {
        let path = self.registry.path(key)?;
        if self.path_key() == Some(path.key.as_str()) {
            return Ok(false);
        }
        let (granted_spells, granted_brushes) = match path.tier(0) {
            Some(tier) => self.pending_grants(tier),
            None => (Vec::new(), Vec::new()),
        };
        self.record(
            WandEventKind::PathChanged(PathChanged {
                wand_id: self.id,
                path: path.key.clone(),
                previous: self.path_key().map(str::to_owned),
                granted_spells,
                granted_brushes,
            }),
            correlation_id,
            clock,
        );
        debug!(wand_id = %self.id, path = %path.key, "path changed");
        Ok(true)
    }

    /// Resets the wand to its first tier and strips tier-granted bindings,
    /// except those the first tier itself grants. Manually bound keys stay.
    /// Returns `false` if there was nothing to reset.
    pub fn unenchant(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> bool {
        let (spells, brushes) = self.bindings.tier_granted();
        let base_tier = self.path.as_ref().and_then(|path| path.tier(0));
        let kept_spells: Vec<String> = base_tier
            .map(|tier| tier.spells.iter().map(|raw| SpellKey::parse(raw).base).collect())
            .unwrap_or_default();
        let kept_brushes: &[String] = base_tier.map_or(&[], |tier| tier.brushes.as_slice());

        let removed_spells: Vec<String> = spells
            .into_iter()
            .filter(|key| !kept_spells.contains(key))
            .collect();
        let removed_brushes: Vec<String> = brushes
            .into_iter()
            .filter(|key| !kept_brushes.contains(key))
            .collect();

        if self.tier == 0
            && self.progress.enchant_levels == 0
            && removed_spells.is_empty()
            && removed_brushes.is_empty()
        {
            return false;
        }
        self.record(
            WandEventKind::WandUnenchanted(WandUnenchanted {
                wand_id: self.id,
                from_tier: self.tier,
                removed_spells,
                removed_brushes,
            }),
            correlation_id,
            clock,
        );
        true
    }
}
