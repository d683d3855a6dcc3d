//! Persistence backends
//!
//! Records are keyed by id under one directory per tier, next to an
//! `index.json` holding the search pre-filter entries.

use crate::error::KnowledgeError;
use crate::experience::{Experience, ExperienceId, ExperienceStatus, KnowledgeTier};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::path::{Path, PathBuf};

const INDEX_FILE: &str = "index.json";

/// Per-tier index entry; enough to pre-filter without loading records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IndexEntry {
    /// Experience id
    pub id: ExperienceId,
    /// Request keywords
    pub keywords: BTreeSet<String>,
    /// Task type label
    pub task_type: String,
    /// Lifecycle status
    pub status: ExperienceStatus,
}

impl From<&Experience> for IndexEntry {
    fn from(exp: &Experience) -> Self {
        Self {
            id: exp.id,
            keywords: exp.keywords.clone(),
            task_type: exp.task_type.clone(),
            status: exp.status,
        }
    }
}

/// Storage of experience records and tier indexes
pub trait ExperienceRepository: Send + Sync + Debug {
    /// Load a tier index
    ///
    /// # Errors
    /// [`KnowledgeError::ConfigMissing`] when the tier has never been
    /// written; I/O or parse errors otherwise.
    fn load_index(&self, tier: KnowledgeTier) -> Result<Vec<IndexEntry>, KnowledgeError>;

    /// Replace a tier index
    ///
    /// # Errors
    /// Returns error on write failure
    fn save_index(&self, tier: KnowledgeTier, entries: &[IndexEntry]) -> Result<(), KnowledgeError>;

    /// Load one record, `None` if absent
    ///
    /// # Errors
    /// Returns error on read or parse failure
    fn load(&self, tier: KnowledgeTier, id: ExperienceId)
        -> Result<Option<Experience>, KnowledgeError>;

    /// Write one record
    ///
    /// # Errors
    /// Returns error on write failure
    fn save(&self, tier: KnowledgeTier, experience: &Experience) -> Result<(), KnowledgeError>;

    /// Delete one record; deleting an absent record is not an error
    ///
    /// # Errors
    /// Returns error on delete failure
    fn remove(&self, tier: KnowledgeTier, id: ExperienceId) -> Result<(), KnowledgeError>;
}

/// JSON files on disk
#[derive(Debug, Clone)]
pub struct FileRepository {
    root: PathBuf,
}

impl FileRepository {
    /// Repository rooted at `root`; directories are created on first write
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Store root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn tier_dir(&self, tier: KnowledgeTier) -> PathBuf {
        self.root.join(tier.dir_name())
    }

    fn record_path(&self, tier: KnowledgeTier, id: ExperienceId) -> PathBuf {
        self.tier_dir(tier).join(format!("{id}.json"))
    }

    fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), KnowledgeError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| KnowledgeError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_vec_pretty(value).map_err(|source| KnowledgeError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        // write then rename so readers never see a torn file
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| KnowledgeError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, path).map_err(|source| KnowledgeError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Option<T>, KnowledgeError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(KnowledgeError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| KnowledgeError::Json {
                path: path.to_path_buf(),
                source,
            })
    }
}

impl ExperienceRepository for FileRepository {
    fn load_index(&self, tier: KnowledgeTier) -> Result<Vec<IndexEntry>, KnowledgeError> {
        let path = self.tier_dir(tier).join(INDEX_FILE);
        Self::read_json(&path)?.ok_or(KnowledgeError::ConfigMissing { path })
    }

    fn save_index(&self, tier: KnowledgeTier, entries: &[IndexEntry]) -> Result<(), KnowledgeError> {
        Self::write_json(&self.tier_dir(tier).join(INDEX_FILE), entries)
    }

    fn load(
        &self,
        tier: KnowledgeTier,
        id: ExperienceId,
    ) -> Result<Option<Experience>, KnowledgeError> {
        Self::read_json(&self.record_path(tier, id))
    }

    fn save(&self, tier: KnowledgeTier, experience: &Experience) -> Result<(), KnowledgeError> {
        Self::write_json(&self.record_path(tier, experience.id), experience)
    }

    fn remove(&self, tier: KnowledgeTier, id: ExperienceId) -> Result<(), KnowledgeError> {
        let path = self.record_path(tier, id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(KnowledgeError::Io { path, source }),
        }
    }
}

/// In-process repository, for tests and ephemeral stores
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: DashMap<(KnowledgeTier, ExperienceId), Experience>,
    indexes: DashMap<KnowledgeTier, Vec<IndexEntry>>,
}

impl MemoryRepository {
    /// Empty repository
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all tiers
    #[inline]
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

impl ExperienceRepository for MemoryRepository {
    fn load_index(&self, tier: KnowledgeTier) -> Result<Vec<IndexEntry>, KnowledgeError> {
        Ok(self
            .indexes
            .get(&tier)
            .map(|entries| entries.clone())
            .unwrap_or_default())
    }

    fn save_index(&self, tier: KnowledgeTier, entries: &[IndexEntry]) -> Result<(), KnowledgeError> {
        self.indexes.insert(tier, entries.to_vec());
        Ok(())
    }

    fn load(
        &self,
        tier: KnowledgeTier,
        id: ExperienceId,
    ) -> Result<Option<Experience>, KnowledgeError> {
        Ok(self.records.get(&(tier, id)).map(|r| r.clone()))
    }

    fn save(&self, tier: KnowledgeTier, experience: &Experience) -> Result<(), KnowledgeError> {
        self.records
            .insert((tier, experience.id), experience.clone());
        Ok(())
    }

    fn remove(&self, tier: KnowledgeTier, id: ExperienceId) -> Result<(), KnowledgeError> {
        self.records.remove(&(tier, id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experience::PlanTemplate;
    use lodestar_plan::Plan;
    use pretty_assertions::assert_eq;

    fn experience() -> Experience {
        Experience::new("grid of boxes", "create", PlanTemplate::new("grid", Plan::empty()))
    }

    #[test]
    fn missing_index_is_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path().join("absent"));
        assert!(matches!(
            repo.load_index(KnowledgeTier::Golden),
            Err(KnowledgeError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());
        let exp = experience();

        repo.save(KnowledgeTier::Personal, &exp).unwrap();
        repo.save_index(KnowledgeTier::Personal, &[IndexEntry::from(&exp)])
            .unwrap();

        assert!(dir.path().join("personal").join("index.json").exists());
        assert_eq!(
            repo.load(KnowledgeTier::Personal, exp.id).unwrap(),
            Some(exp.clone())
        );
        assert_eq!(
            repo.load_index(KnowledgeTier::Personal).unwrap(),
            vec![IndexEntry::from(&exp)]
        );
        assert_eq!(repo.load(KnowledgeTier::Golden, exp.id).unwrap(), None);
    }

    #[test]
    fn file_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());
        let exp = experience();
        repo.save(KnowledgeTier::CommunityPending, &exp).unwrap();
        repo.remove(KnowledgeTier::CommunityPending, exp.id).unwrap();
        repo.remove(KnowledgeTier::CommunityPending, exp.id).unwrap();
        assert_eq!(repo.load(KnowledgeTier::CommunityPending, exp.id).unwrap(), None);
    }

    #[test]
    fn malformed_record_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = FileRepository::new(dir.path());
        let exp = experience();
        let path = dir.path().join("golden").join(format!("{}.json", exp.id));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"id\": 1}").unwrap();
        assert!(matches!(
            repo.load(KnowledgeTier::Golden, exp.id),
            Err(KnowledgeError::Json { .. })
        ));
    }

    #[test]
    fn memory_tiers_are_separate() {
        let repo = MemoryRepository::new();
        let exp = experience();
        repo.save(KnowledgeTier::Personal, &exp).unwrap();
        assert!(repo.load(KnowledgeTier::Golden, exp.id).unwrap().is_none());
        assert!(repo.load_index(KnowledgeTier::Golden).unwrap().is_empty());
        assert_eq!(repo.record_count(), 1);
    }
}
