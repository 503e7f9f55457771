//! Upgrade paths: ordered progression ladders.

use serde::{Deserialize, Serialize};

use super::error::WandError;

/// The counter a path measures progress with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressMetric {
    /// Total worth of the wand and its bindings.
    #[default]
    Worth,
    /// Number of successful casts.
    Casts,
    /// Damage dealt with the wand.
    DamageDealt,
    /// Enchantment levels applied.
    EnchantLevels,
}

/// Progress counters kept on every wand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressCounters {
    pub casts: u64,
    pub damage_dealt: f64,
    pub enchant_levels: u64,
}

impl ProgressMetric {
    /// Reads this metric from the wand's counters.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn measure(self, counters: &ProgressCounters, worth: u64) -> u64 {
        match self {
            Self::Worth => worth,
            Self::Casts => counters.casts,
            Self::DamageDealt => counters.damage_dealt.max(0.0).floor() as u64,
            Self::EnchantLevels => counters.enchant_levels,
        }
    }
}

/// One rung of an upgrade path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathTier {
    /// Tier key, unique within the path.
    pub key: String,
    /// Progress required to enter this tier.
    pub threshold: u64,
    /// Spells granted on entering the tier.
    pub spells: Vec<String>,
    /// Brushes granted on entering the tier.
    pub brushes: Vec<String>,
    /// Mana capacity added while at or above this tier.
    pub mana_max_bonus: u32,
    /// Pool that enchanting draws random spells from.
    pub optional_spells: Vec<String>,
}

impl PathTier {
    /// Creates a tier with no grants.
    #[must_use]
    pub fn new(key: impl Into<String>, threshold: u64) -> Self {
        Self {
            key: key.into(),
            threshold,
            spells: Vec::new(),
            brushes: Vec::new(),
            mana_max_bonus: 0,
            optional_spells: Vec::new(),
        }
    }
}

/// Where a wand stands relative to its next tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    /// Already on the last tier.
    Terminal,
    /// The next tier's threshold is met.
    Eligible { next: usize },
    /// More progress is needed.
    NotYet { next: usize, required: u64 },
}

/// An ordered ladder of tiers `T0 < T1 < … < Tn`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradePath {
    /// Unique path key.
    pub key: String,
    /// Progress metric used by this path.
    pub metric: ProgressMetric,
    tiers: Vec<PathTier>,
}

impl UpgradePath {
    /// Creates a path.
    ///
    /// # Errors
    ///
    /// Returns `WandError::InvalidPath` if there are no tiers, tier keys
    /// repeat, or thresholds decrease.
    pub fn new(
        key: impl Into<String>,
        metric: ProgressMetric,
        tiers: Vec<PathTier>,
    ) -> Result<Self, WandError> {
        let key = key.into();
        let invalid = |reason: String| WandError::InvalidPath {
            path: key.clone(),
            reason,
        };
        if tiers.is_empty() {
            return Err(invalid("a path needs at least one tier".to_owned()));
        }
        for (index, pair) in tiers.windows(2).enumerate() {
            if pair[1].threshold < pair[0].threshold {
                return Err(invalid(format!(
                    "tier {} threshold {} is below tier {} threshold {}",
                    pair[1].key,
                    pair[1].threshold,
                    pair[0].key,
                    pair[0].threshold
                )));
            }
            if tiers[..=index].iter().any(|t| t.key == pair[1].key) {
                return Err(invalid(format!("duplicate tier key {}", pair[1].key)));
            }
        }
        Ok(Self { key, metric, tiers })
    }

    /// All tiers, lowest first.
    #[must_use]
    pub fn tiers(&self) -> &[PathTier] {
        &self.tiers
    }

    /// The tier at `index`.
    #[must_use]
    pub fn tier(&self, index: usize) -> Option<&PathTier> {
        self.tiers.get(index)
    }

    /// Index of the last tier.
    #[must_use]
    pub fn last_index(&self) -> usize {
        self.tiers.len() - 1
    }

    /// Pure eligibility check for advancing from `current` with `progress`.
    #[must_use]
    pub fn eligibility(&self, current: usize, progress: u64) -> Eligibility {
        let next = current + 1;
        match self.tiers.get(next) {
            None => Eligibility::Terminal,
            Some(tier) if progress >= tier.threshold => Eligibility::Eligible { next },
            Some(tier) => Eligibility::NotYet {
                next,
                required: tier.threshold,
            },
        }
    }

    /// Total mana bonus from tiers `0..=tier`.
    #[must_use]
    pub fn mana_bonus_through(&self, tier: usize) -> u32 {
        self.tiers
            .iter()
            .take(tier.saturating_add(1))
            .map(|t| t.mana_max_bonus)
            .fold(0, u32::saturating_add)
    }
}
