//! Tiered knowledge store
//!
//! Search walks the trusted tiers in priority order and accepts the first
//! tier whose best candidate clears its threshold. Mutations hold the
//! affected tier's write lock across the whole read-modify-write; when two
//! tiers are involved, locks are taken in [`KnowledgeTier::ALL`] order.

use crate::cache::RecordCache;
use crate::config::KnowledgeConfig;
use crate::error::KnowledgeError;
use crate::experience::{
    Experience, ExperienceId, ExperienceStatus, Fact, KnowledgeTier, PlanTemplate,
};
use crate::keywords::{extract_keywords, overlap};
use crate::repository::{ExperienceRepository, FileRepository, IndexEntry, MemoryRepository};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Outcome of a search
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeResult {
    /// Accepting tier, `None` when nothing cleared its threshold
    pub tier: Option<KnowledgeTier>,
    /// Accepted experience
    pub experience: Option<Experience>,
    /// Score of the accepted experience, 0 when none
    pub match_score: f64,
}

impl KnowledgeResult {
    /// Nothing accepted
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self {
            tier: None,
            experience: None,
            match_score: 0.0,
        }
    }

    /// Whether a tier accepted a result
    #[inline]
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.tier.is_some()
    }
}

/// Record counts of one tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierStats {
    /// Indexed records
    pub records: usize,
    /// Of which deprecated
    pub deprecated: usize,
}

/// Record counts per tier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    /// Counts by tier
    pub tiers: BTreeMap<KnowledgeTier, TierStats>,
}

impl KnowledgeStats {
    /// Records in one tier
    #[must_use]
    pub fn records(&self, tier: KnowledgeTier) -> usize {
        self.tiers.get(&tier).map_or(0, |s| s.records)
    }
}

#[derive(Debug, Default)]
struct TierState {
    index: RwLock<Vec<IndexEntry>>,
    write: Mutex<()>,
    dirty: AtomicBool,
}

impl TierState {
    fn new(entries: Vec<IndexEntry>) -> Self {
        Self {
            index: RwLock::new(entries),
            ..Self::default()
        }
    }

    fn contains(&self, id: ExperienceId) -> bool {
        self.index.read().iter().any(|e| e.id == id)
    }

    fn status(&self, id: ExperienceId) -> Option<ExperienceStatus> {
        self.index.read().iter().find(|e| e.id == id).map(|e| e.status)
    }
}

/// Tiered, trust-ranked experience store
///
/// An explicit value: open it once and share it by `Arc`.
#[derive(Debug)]
pub struct KnowledgeStore {
    config: KnowledgeConfig,
    repository: Arc<dyn ExperienceRepository>,
    tiers: [TierState; 4],
    cache: RecordCache,
}

impl KnowledgeStore {
    /// Open a store over a repository, loading every tier index
    ///
    /// Missing tiers start empty; they are reported once as a warning.
    ///
    /// # Errors
    /// Returns error on invalid config or an unreadable/malformed index
    pub fn open(
        config: KnowledgeConfig,
        repository: Arc<dyn ExperienceRepository>,
    ) -> Result<Self, KnowledgeError> {
        config.validate()?;

        let mut indexes = Vec::with_capacity(KnowledgeTier::ALL.len());
        let mut missing = Vec::new();
        for tier in KnowledgeTier::ALL {
            match repository.load_index(tier) {
                Ok(entries) => indexes.push(entries),
                Err(KnowledgeError::ConfigMissing { path }) => {
                    missing.push(path);
                    indexes.push(Vec::new());
                }
                Err(e) => return Err(e),
            }
        }
        if !missing.is_empty() {
            tracing::warn!(?missing, "knowledge tiers not found, starting empty");
        }

        let mut indexes = indexes.into_iter();
        let tiers = std::array::from_fn(|_| TierState::new(indexes.next().unwrap_or_default()));
        let cache = RecordCache::new(config.cache_capacity);

        let store = Self {
            config,
            repository,
            tiers,
            cache,
        };
        tracing::info!(stats = ?store.stats(), "opened knowledge store");
        Ok(store)
    }

    /// Open the store described by `config`: on disk when a root is set,
    /// otherwise in memory
    ///
    /// # Errors
    /// See [`KnowledgeStore::open`]
    pub fn from_config(config: KnowledgeConfig) -> Result<Self, KnowledgeError> {
        let repository: Arc<dyn ExperienceRepository> = match &config.root {
            Some(root) => Arc::new(FileRepository::new(root.clone())),
            None => Arc::new(MemoryRepository::new()),
        };
        Self::open(config, repository)
    }

    /// Empty in-memory store with default configuration
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            cache: RecordCache::new(KnowledgeConfig::default().cache_capacity),
            config: KnowledgeConfig::default(),
            repository: Arc::new(MemoryRepository::new()),
            tiers: std::array::from_fn(|_| TierState::default()),
        }
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &KnowledgeConfig {
        &self.config
    }

    /// Search the trusted tiers for a reusable experience
    ///
    /// # Errors
    /// Returns error if a candidate record cannot be loaded
    pub fn search(
        &self,
        query: &BTreeSet<String>,
        task_type: Option<&str>,
    ) -> Result<KnowledgeResult, KnowledgeError> {
        for tier in KnowledgeTier::SEARCH_ORDER {
            let Some((experience, score)) = self.best_in_tier(tier, query, task_type)? else {
                continue;
            };
            if self.accepts(tier, score) {
                tracing::debug!(%tier, id = %experience.id, score, "knowledge accepted");
                return Ok(KnowledgeResult {
                    tier: Some(tier),
                    experience: Some((*experience).clone()),
                    match_score: score,
                });
            }
            tracing::debug!(%tier, score, "best candidate below threshold");
        }
        Ok(KnowledgeResult::none())
    }

    /// Search using keywords extracted from request text
    ///
    /// # Errors
    /// See [`KnowledgeStore::search`]
    pub fn search_text(
        &self,
        request_text: &str,
        task_type: Option<&str>,
    ) -> Result<KnowledgeResult, KnowledgeError> {
        self.search(&extract_keywords(request_text), task_type)
    }

    /// Record a successful solution in the personal tier
    ///
    /// Merges into the personal experience sharing enough keywords with the
    /// request, or inserts a new one.
    ///
    /// # Errors
    /// Returns error if the record cannot be loaded or written
    pub fn learn(
        &self,
        request_text: &str,
        task_type: &str,
        solution: PlanTemplate,
        facts: Vec<Fact>,
        patterns: Vec<String>,
    ) -> Result<Experience, KnowledgeError> {
        let tier = KnowledgeTier::Personal;
        let _guard = self.state(tier).write.lock();

        let keywords = extract_keywords(request_text);
        #[allow(clippy::cast_precision_loss)]
        let needed = self.config.merge_overlap * keywords.len().max(1) as f64;
        #[allow(clippy::cast_precision_loss)]
        let target = self.best_personal_match(&keywords, |shared| shared as f64 >= needed);

        let existing = match target {
            Some(id) => self.load_record(tier, id)?,
            None => None,
        };

        let (experience, merged) = match existing {
            Some(current) => {
                let mut updated = (*current).clone();
                updated.merge_success(keywords, solution, facts, patterns);
                (updated, true)
            }
            None => {
                let mut created = Experience::new(request_text, task_type, solution)
                    .with_facts(facts)
                    .with_patterns(patterns);
                created.author.clone_from(&self.config.author);
                (created, false)
            }
        };

        let record = self.write_record(tier, experience)?;
        tracing::info!(
            id = %record.id,
            merged,
            usage = record.usage_count(),
            success = record.success_count(),
            "learned experience"
        );
        Ok((*record).clone())
    }

    /// Count a failed use against the best personal match
    ///
    /// Returns the id of the updated experience, if any shares a keyword.
    ///
    /// # Errors
    /// Returns error if the record cannot be loaded or written
    pub fn record_failure(&self, request_text: &str) -> Result<Option<ExperienceId>, KnowledgeError> {
        let tier = KnowledgeTier::Personal;
        let _guard = self.state(tier).write.lock();

        let keywords = extract_keywords(request_text);
        let Some(id) = self.best_personal_match(&keywords, |_| true) else {
            return Ok(None);
        };
        let Some(current) = self.load_record(tier, id)? else {
            return Ok(None);
        };

        let mut updated = (*current).clone();
        updated.record_failure();
        let record = self.write_record(tier, updated)?;
        tracing::info!(id = %record.id, usage = record.usage_count(), "recorded failure");
        Ok(Some(id))
    }

    /// Submit a personal experience for community review
    ///
    /// Returns false when the id is not a live personal experience or is
    /// already pending or verified.
    ///
    /// # Errors
    /// Returns error if the record cannot be loaded or written
    pub fn promote(&self, id: ExperienceId) -> Result<bool, KnowledgeError> {
        let _pending = self.state(KnowledgeTier::CommunityPending).write.lock();
        let _personal = self.state(KnowledgeTier::Personal).write.lock();

        let personal_status = self.state(KnowledgeTier::Personal).status(id);
        if matches!(personal_status, None | Some(ExperienceStatus::Deprecated))
            || self.state(KnowledgeTier::CommunityPending).contains(id)
            || self.state(KnowledgeTier::CommunityVerified).contains(id)
        {
            return Ok(false);
        }
        let Some(experience) = self.load_record(KnowledgeTier::Personal, id)? else {
            return Ok(false);
        };

        self.write_record(KnowledgeTier::CommunityPending, experience.to_pending())?;
        tracing::info!(%id, "promoted experience for review");
        Ok(true)
    }

    /// Resolve a pending review
    ///
    /// Approval moves the record to the community-verified tier; rejection
    /// deletes it. Returns false when the id is not pending.
    ///
    /// # Errors
    /// Returns error if the record cannot be loaded, written or deleted
    pub fn verify(&self, id: ExperienceId, approved: bool) -> Result<bool, KnowledgeError> {
        let _verified = self.state(KnowledgeTier::CommunityVerified).write.lock();
        let _pending = self.state(KnowledgeTier::CommunityPending).write.lock();

        if !self.state(KnowledgeTier::CommunityPending).contains(id) {
            return Ok(false);
        }
        if approved {
            let Some(pending) = self.load_record(KnowledgeTier::CommunityPending, id)? else {
                tracing::warn!(%id, "pending record missing, dropping index entry");
                self.delete_record(KnowledgeTier::CommunityPending, id)?;
                return Ok(false);
            };
            let mut verified = (*pending).clone();
            verified.status = ExperienceStatus::Verified;
            self.write_record(KnowledgeTier::CommunityVerified, verified)?;
        }
        self.delete_record(KnowledgeTier::CommunityPending, id)?;

        tracing::info!(%id, approved, "resolved review");
        Ok(true)
    }

    /// Insert or replace a curated record in a tier
    ///
    /// # Errors
    /// Returns error for the pending tier, for records violating the counter
    /// invariant, or on write failure
    pub fn import(&self, tier: KnowledgeTier, experience: Experience) -> Result<(), KnowledgeError> {
        if tier == KnowledgeTier::CommunityPending {
            return Err(KnowledgeError::ImportDenied(tier));
        }
        experience.check()?;
        let _guard = self.state(tier).write.lock();
        let record = self.write_record(tier, experience)?;
        tracing::debug!(%tier, id = %record.id, "imported experience");
        Ok(())
    }

    /// Fetch an experience by id with the tier holding it
    ///
    /// A promoted id lives in two tiers; the most trusted copy is returned.
    ///
    /// # Errors
    /// Returns error if the record cannot be loaded
    pub fn get(&self, id: ExperienceId) -> Result<Option<(KnowledgeTier, Experience)>, KnowledgeError> {
        for tier in KnowledgeTier::ALL {
            if self.state(tier).contains(id) {
                if let Some(record) = self.load_record(tier, id)? {
                    return Ok(Some((tier, (*record).clone())));
                }
            }
        }
        Ok(None)
    }

    /// All experiences of a tier in index order
    ///
    /// # Errors
    /// Returns error if a record cannot be loaded
    pub fn list(&self, tier: KnowledgeTier) -> Result<Vec<Experience>, KnowledgeError> {
        let ids: Vec<ExperienceId> = self.state(tier).index.read().iter().map(|e| e.id).collect();
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.load_record(tier, id)? {
                out.push((*record).clone());
            }
        }
        Ok(out)
    }

    /// Retire an experience in every tier holding it
    ///
    /// Returns false when no live copy was found.
    ///
    /// # Errors
    /// Returns error if a record cannot be loaded or written
    pub fn deprecate(&self, id: ExperienceId) -> Result<bool, KnowledgeError> {
        let mut changed = false;
        for tier in KnowledgeTier::ALL {
            let state = self.state(tier);
            let _guard = state.write.lock();
            if !matches!(state.status(id), Some(s) if s != ExperienceStatus::Deprecated) {
                continue;
            }
            if let Some(record) = self.load_record(tier, id)? {
                let mut retired = (*record).clone();
                retired.status = ExperienceStatus::Deprecated;
                self.write_record(tier, retired)?;
                changed = true;
            }
        }
        if changed {
            tracing::info!(%id, "deprecated experience");
        }
        Ok(changed)
    }

    /// Record counts per tier
    #[must_use]
    pub fn stats(&self) -> KnowledgeStats {
        let tiers = KnowledgeTier::ALL
            .iter()
            .map(|&tier| {
                let index = self.state(tier).index.read();
                let stats = TierStats {
                    records: index.len(),
                    deprecated: index
                        .iter()
                        .filter(|e| e.status == ExperienceStatus::Deprecated)
                        .count(),
                };
                (tier, stats)
            })
            .collect();
        KnowledgeStats { tiers }
    }

    /// Persist every tier index whose write-through failed
    ///
    /// Mutations save the tier index as they happen; this retries the ones
    /// that could not be written.
    ///
    /// # Errors
    /// Returns the first write failure; the failed tier stays dirty
    pub fn flush(&self) -> Result<(), KnowledgeError> {
        for tier in KnowledgeTier::ALL {
            let state = self.state(tier);
            let _guard = state.write.lock();
            if state.dirty.load(AtomicOrdering::Acquire) {
                self.persist_index(tier)?;
            }
        }
        Ok(())
    }

    fn state(&self, tier: KnowledgeTier) -> &TierState {
        &self.tiers[tier.slot()]
    }

    fn accepts(&self, tier: KnowledgeTier, score: f64) -> bool {
        let t = &self.config.thresholds;
        match tier {
            KnowledgeTier::Golden => score >= t.golden,
            KnowledgeTier::CommunityVerified => score >= t.community_verified,
            KnowledgeTier::Personal => score > t.personal,
            KnowledgeTier::CommunityPending => false,
        }
    }

    fn best_in_tier(
        &self,
        tier: KnowledgeTier,
        query: &BTreeSet<String>,
        task_type: Option<&str>,
    ) -> Result<Option<(Arc<Experience>, f64)>, KnowledgeError> {
        let candidates: Vec<ExperienceId> = self
            .state(tier)
            .index
            .read()
            .iter()
            .filter(|e| e.status != ExperienceStatus::Deprecated)
            .filter(|e| task_type.map_or(true, |t| e.task_type == t))
            .filter(|e| overlap(query, &e.keywords) > 0)
            .map(|e| e.id)
            .collect();

        #[allow(clippy::cast_precision_loss)]
        let denominator = query.len().max(1) as f64;
        let mut best: Option<(Arc<Experience>, f64)> = None;

        for id in candidates {
            let Some(experience) = self.load_record(tier, id)? else {
                tracing::warn!(%tier, %id, "indexed record missing");
                continue;
            };
            #[allow(clippy::cast_precision_loss)]
            let raw = overlap(query, &experience.keywords) as f64 / denominator;
            let mut score = raw * experience.success_rate();
            if tier == KnowledgeTier::Golden {
                score = (score * self.config.golden_amplification).min(1.0);
            }

            let better = match &best {
                None => true,
                Some((current, current_score)) => match score.total_cmp(current_score) {
                    Ordering::Greater => true,
                    Ordering::Equal => {
                        (experience.created_at, experience.id) < (current.created_at, current.id)
                    }
                    Ordering::Less => false,
                },
            };
            if better {
                best = Some((experience, score));
            }
        }

        Ok(best)
    }

    /// Live personal entry with the most shared keywords satisfying `accept`
    ///
    /// Ties keep the earlier index entry.
    fn best_personal_match(
        &self,
        keywords: &BTreeSet<String>,
        accept: impl Fn(usize) -> bool,
    ) -> Option<ExperienceId> {
        let index = self.state(KnowledgeTier::Personal).index.read();
        let mut best: Option<(ExperienceId, usize)> = None;
        for entry in index.iter() {
            if entry.status == ExperienceStatus::Deprecated {
                continue;
            }
            let shared = overlap(keywords, &entry.keywords);
            if shared == 0 || !accept(shared) {
                continue;
            }
            if best.map_or(true, |(_, b)| shared > b) {
                best = Some((entry.id, shared));
            }
        }
        best.map(|(id, _)| id)
    }

    fn load_record(
        &self,
        tier: KnowledgeTier,
        id: ExperienceId,
    ) -> Result<Option<Arc<Experience>>, KnowledgeError> {
        if let Some(hit) = self.cache.get(tier, id) {
            return Ok(Some(hit));
        }
        let Some(experience) = self.repository.load(tier, id)? else {
            return Ok(None);
        };
        experience.check()?;
        Ok(Some(self.cache.insert(tier, experience)))
    }

    fn write_record(
        &self,
        tier: KnowledgeTier,
        experience: Experience,
    ) -> Result<Arc<Experience>, KnowledgeError> {
        self.repository.save(tier, &experience)?;
        let entry = IndexEntry::from(&experience);
        let state = self.state(tier);
        {
            let mut index = state.index.write();
            match index.iter_mut().find(|e| e.id == entry.id) {
                Some(slot) => *slot = entry,
                None => index.push(entry),
            }
        }
        let record = self.cache.insert(tier, experience);
        self.persist_index(tier)?;
        Ok(record)
    }

    fn delete_record(&self, tier: KnowledgeTier, id: ExperienceId) -> Result<(), KnowledgeError> {
        self.repository.remove(tier, id)?;
        self.state(tier).index.write().retain(|e| e.id != id);
        self.cache.invalidate(tier, id);
        self.persist_index(tier)
    }

    /// Save the tier index; the caller holds the tier's write lock
    fn persist_index(&self, tier: KnowledgeTier) -> Result<(), KnowledgeError> {
        let state = self.state(tier);
        let snapshot = state.index.read().clone();
        match self.repository.save_index(tier, &snapshot) {
            Ok(()) => {
                state.dirty.store(false, AtomicOrdering::Release);
                tracing::debug!(%tier, entries = snapshot.len(), "saved tier index");
                Ok(())
            }
            Err(e) => {
                state.dirty.store(true, AtomicOrdering::Release);
                Err(e)
            }
        }
    }
}

impl Drop for KnowledgeStore {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(error = %e, "could not persist knowledge indexes on drop");
        }
    }
}
