//! Bounded cache of loaded experience records using moka

use crate::experience::{Experience, ExperienceId, KnowledgeTier};
use moka::sync::Cache;
use std::sync::Arc;

/// Cache key: the same id may live in more than one tier
type RecordKey = (KnowledgeTier, ExperienceId);

/// Loaded-record cache shared by readers
#[derive(Debug, Clone)]
pub(crate) struct RecordCache {
    inner: Cache<RecordKey, Arc<Experience>>,
}

impl RecordCache {
    pub(crate) fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    pub(crate) fn get(&self, tier: KnowledgeTier, id: ExperienceId) -> Option<Arc<Experience>> {
        self.inner.get(&(tier, id))
    }

    pub(crate) fn insert(&self, tier: KnowledgeTier, experience: Experience) -> Arc<Experience> {
        let record = Arc::new(experience);
        self.inner.insert((tier, record.id), Arc::clone(&record));
        record
    }

    pub(crate) fn invalidate(&self, tier: KnowledgeTier, id: ExperienceId) {
        self.inner.invalidate(&(tier, id));
    }
}
