//! Recovery records for wands whose physical item is gone.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ports::WandOwner;

/// A point in a named world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldPosition {
    pub world: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl WorldPosition {
    #[must_use]
    pub fn new(world: impl Into<String>, x: f64, y: f64, z: f64) -> Self {
        Self {
            world: world.into(),
            x,
            y,
            z,
        }
    }
}

/// Immutable snapshot of a detached wand's identity and last location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LostWand {
    /// Identifier of the wand that went missing.
    pub wand_id: Uuid,
    /// Display name at the time it was lost.
    pub name: String,
    /// Template the wand was created from.
    pub template_key: String,
    /// Last known position.
    pub position: WorldPosition,
    /// Owner at the time it was lost.
    pub owner: Option<WandOwner>,
    /// When the record was created.
    pub created_at: DateTime<Utc>,
}

impl LostWand {
    /// How long ago the record was created.
    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.created_at
    }

    /// Whether the record is older than `max_age`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now) > max_age
    }
}
