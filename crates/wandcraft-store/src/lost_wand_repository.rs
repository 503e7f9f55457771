//! In-memory lost-wand records with age-based expiry.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;
use wandcraft_core::error::DomainError;
use wandcraft_wand::application::lost_wands::LostWandRepository;
use wandcraft_wand::domain::lost::LostWand;

/// How long a lost-wand record is kept before it expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_age: Duration,
}

impl RetentionPolicy {
    #[must_use]
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::new(Duration::days(30))
    }
}

/// Lost-wand records keyed by wand ID.
#[derive(Debug, Default)]
pub struct InMemoryLostWandRepository {
    policy: RetentionPolicy,
    records: RwLock<HashMap<Uuid, LostWand>>,
}

impl InMemoryLostWandRepository {
    #[must_use]
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            policy,
            records: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }
}

fn oldest_first(mut records: Vec<LostWand>) -> Vec<LostWand> {
    records.sort_by(|a, b| {
        a.created_at
            .cmp(&b.created_at)
            .then_with(|| a.wand_id.cmp(&b.wand_id))
    });
    records
}

#[async_trait]
impl LostWandRepository for InMemoryLostWandRepository {
    async fn record(&self, lost: LostWand) -> Result<(), DomainError> {
        debug!(wand_id = %lost.wand_id, "lost wand stored");
        self.records.write().await.insert(lost.wand_id, lost);
        Ok(())
    }

    async fn get(&self, wand_id: Uuid) -> Result<Option<LostWand>, DomainError> {
        Ok(self.records.read().await.get(&wand_id).cloned())
    }

    async fn remove(&self, wand_id: Uuid) -> Result<Option<LostWand>, DomainError> {
        Ok(self.records.write().await.remove(&wand_id))
    }

    async fn list(&self) -> Result<Vec<LostWand>, DomainError> {
        let records = self.records.read().await.values().cloned().collect();
        Ok(oldest_first(records))
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<LostWand>, DomainError> {
        let records = self
            .records
            .read()
            .await
            .values()
            .filter(|lost| lost.owner.as_ref().is_some_and(|owner| owner.id == owner_id))
            .cloned()
            .collect();
        Ok(oldest_first(records))
    }

    async fn expire(&self, now: DateTime<Utc>) -> Result<Vec<LostWand>, DomainError> {
        let mut records = self.records.write().await;
        let expired_ids: Vec<Uuid> = records
            .values()
            .filter(|lost| lost.is_expired(now, self.policy.max_age))
            .map(|lost| lost.wand_id)
            .collect();
        let expired = expired_ids
            .iter()
            .filter_map(|id| records.remove(id))
            .collect();
        Ok(oldest_first(expired))
    }
}
