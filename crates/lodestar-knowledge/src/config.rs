//! Knowledge store configuration

use crate::error::KnowledgeError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Acceptance thresholds per searchable tier
///
/// Golden and community-verified results are accepted at or above their
/// threshold; personal results strictly above.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TierThresholds {
    /// Golden acceptance (after amplification)
    pub golden: f64,
    /// Community-verified acceptance
    pub community_verified: f64,
    /// Personal acceptance (exclusive)
    pub personal: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            golden: 0.8,
            community_verified: 0.7,
            personal: 0.0,
        }
    }
}

/// Knowledge store configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KnowledgeConfig {
    /// On-disk root; `None` keeps the store in memory
    pub root: Option<PathBuf>,
    /// Multiplier applied to golden scores before capping at 1.0
    pub golden_amplification: f64,
    /// Acceptance thresholds
    pub thresholds: TierThresholds,
    /// Fraction of the new keyword set a personal record must share to merge
    pub merge_overlap: f64,
    /// Maximum cached records
    pub cache_capacity: u64,
    /// Author stamped on personal experiences
    pub author: Option<String>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            root: None,
            golden_amplification: 1.5,
            thresholds: TierThresholds::default(),
            merge_overlap: 0.7,
            cache_capacity: 1_024,
            author: None,
        }
    }
}

impl KnowledgeConfig {
    /// With on-disk root
    #[inline]
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// With author for personal experiences
    #[inline]
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// With merge overlap
    #[inline]
    #[must_use]
    pub fn with_merge_overlap(mut self, overlap: f64) -> Self {
        self.merge_overlap = overlap;
        self
    }

    /// Validate ranges
    ///
    /// # Errors
    /// Returns the first out-of-range field
    pub fn validate(&self) -> Result<(), KnowledgeError> {
        let unit = [
            ("thresholds.golden", self.thresholds.golden),
            ("thresholds.community_verified", self.thresholds.community_verified),
            ("thresholds.personal", self.thresholds.personal),
            ("merge_overlap", self.merge_overlap),
        ];
        for (field, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("{value} is outside [0, 1]")));
            }
        }
        if !self.golden_amplification.is_finite() || self.golden_amplification < 1.0 {
            return Err(invalid(
                "golden_amplification",
                format!("{} must be finite and >= 1", self.golden_amplification),
            ));
        }
        if self.cache_capacity == 0 {
            return Err(invalid("cache_capacity", "must be positive".to_string()));
        }
        Ok(())
    }
}

fn invalid(field: &str, message: String) -> KnowledgeError {
    KnowledgeError::InvalidConfig {
        field: field.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(KnowledgeConfig::default().validate().is_ok());
    }

    #[test]
    fn overlap_out_of_range() {
        let config = KnowledgeConfig::default().with_merge_overlap(1.5);
        assert!(matches!(
            config.validate(),
            Err(KnowledgeError::InvalidConfig { field, .. }) if field == "merge_overlap"
        ));
    }

    #[test]
    fn amplification_below_one_rejected() {
        let config = KnowledgeConfig {
            golden_amplification: 0.5,
            ..KnowledgeConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
