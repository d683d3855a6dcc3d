//! Experience model
//!
//! An [`Experience`] is one reusable solution together with its usage
//! history. Counters are private and only move through methods that keep
//! `success_count <= usage_count`.

use crate::error::KnowledgeError;
use crate::keywords::extract_keywords;
use chrono::{DateTime, Utc};
use lodestar_plan::Plan;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Unique experience identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperienceId(pub Ulid);

impl ExperienceId {
    /// Generate new experience ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for ExperienceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExperienceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExperienceId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ulid::from_string(s).map(Self)
    }
}

/// Trust tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeTier {
    /// Curated, highest trust
    Golden,
    /// Community contributions that passed review
    CommunityVerified,
    /// Awaiting review; never searched
    CommunityPending,
    /// Learned locally
    Personal,
}

impl KnowledgeTier {
    /// Every tier, in lock order
    pub const ALL: [KnowledgeTier; 4] = [
        KnowledgeTier::Golden,
        KnowledgeTier::CommunityVerified,
        KnowledgeTier::CommunityPending,
        KnowledgeTier::Personal,
    ];

    /// Tiers visited by search, highest trust first
    pub const SEARCH_ORDER: [KnowledgeTier; 3] = [
        KnowledgeTier::Golden,
        KnowledgeTier::CommunityVerified,
        KnowledgeTier::Personal,
    ];

    /// Directory name under the store root
    #[must_use]
    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Golden => "golden",
            Self::CommunityVerified => "community_verified",
            Self::CommunityPending => "community_pending",
            Self::Personal => "personal",
        }
    }

    /// Whether search ever reads this tier
    #[inline]
    #[must_use]
    pub fn is_searchable(self) -> bool {
        !matches!(self, Self::CommunityPending)
    }

    pub(crate) const fn slot(self) -> usize {
        match self {
            Self::Golden => 0,
            Self::CommunityVerified => 1,
            Self::CommunityPending => 2,
            Self::Personal => 3,
        }
    }
}

impl fmt::Display for KnowledgeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperienceStatus {
    /// In use
    Active,
    /// Submitted for community review
    Pending,
    /// Approved by review
    Verified,
    /// Retired; never a search candidate
    Deprecated,
}

/// Domain fact learned alongside a solution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Fact {
    /// Fact key (union key on merge)
    pub key: String,
    /// Fact value
    pub value: String,
    /// Where the fact came from
    #[serde(default)]
    pub source: String,
    /// Free-form context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Fact {
    /// Create fact
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            source: String::new(),
            context: None,
        }
    }

    /// With source
    #[inline]
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// With context
    #[inline]
    #[must_use]
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Stored solution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanTemplate {
    /// Short description
    pub summary: String,
    /// Plan graph
    pub plan: Plan,
}

impl PlanTemplate {
    /// Create template
    #[inline]
    #[must_use]
    pub fn new(summary: impl Into<String>, plan: Plan) -> Self {
        Self {
            summary: summary.into(),
            plan,
        }
    }
}

/// One stored experience
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Experience {
    /// Identifier
    pub id: ExperienceId,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Original request text
    pub request_text: String,
    /// Normalized request keywords
    pub keywords: BTreeSet<String>,
    /// Task type label
    pub task_type: String,
    /// Solution
    pub solution: PlanTemplate,
    /// Domain facts, unique by key
    #[serde(default)]
    pub domain_facts: Vec<Fact>,
    /// Pattern names, unique, in first-seen order
    #[serde(default)]
    pub patterns: Vec<String>,
    usage_count: u32,
    success_count: u32,
    /// Lifecycle status
    pub status: ExperienceStatus,
    /// Personal author identifier; stripped on promotion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
}

impl Experience {
    /// New active experience from one successful use
    #[must_use]
    pub fn new(
        request_text: impl Into<String>,
        task_type: impl Into<String>,
        solution: PlanTemplate,
    ) -> Self {
        let request_text = request_text.into();
        Self {
            id: ExperienceId::new(),
            created_at: Utc::now(),
            keywords: extract_keywords(&request_text),
            request_text,
            task_type: task_type.into(),
            solution,
            domain_facts: Vec::new(),
            patterns: Vec::new(),
            usage_count: 1,
            success_count: 1,
            status: ExperienceStatus::Active,
            author: None,
        }
    }

    /// With explicit counters (curated seeds)
    ///
    /// # Errors
    /// Returns error if `success > usage`
    pub fn with_counts(mut self, usage: u32, success: u32) -> Result<Self, KnowledgeError> {
        if success > usage {
            return Err(KnowledgeError::CorruptRecord {
                id: self.id,
                reason: format!("success_count {success} exceeds usage_count {usage}"),
            });
        }
        self.usage_count = usage;
        self.success_count = success;
        Ok(self)
    }

    /// With keywords replacing the extracted ones
    #[must_use]
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    /// With facts (first value per key kept)
    #[must_use]
    pub fn with_facts(mut self, facts: impl IntoIterator<Item = Fact>) -> Self {
        self.union_facts(facts);
        self
    }

    /// With patterns (duplicates dropped)
    #[must_use]
    pub fn with_patterns(mut self, patterns: impl IntoIterator<Item = String>) -> Self {
        self.union_patterns(patterns);
        self
    }

    /// With author
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Times used
    #[inline]
    #[must_use]
    pub fn usage_count(&self) -> u32 {
        self.usage_count
    }

    /// Times used successfully
    #[inline]
    #[must_use]
    pub fn success_count(&self) -> u32 {
        self.success_count
    }

    /// `success / max(usage, 1)`
    #[inline]
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        f64::from(self.success_count) / f64::from(self.usage_count.max(1))
    }

    /// Count one successful use
    pub fn record_success(&mut self) {
        self.usage_count = self.usage_count.saturating_add(1);
        if self.success_count < self.usage_count {
            self.success_count += 1;
        }
    }

    /// Count one failed use
    pub fn record_failure(&mut self) {
        self.usage_count = self.usage_count.saturating_add(1);
    }

    /// Fold a later successful learn into this experience
    pub fn merge_success(
        &mut self,
        keywords: BTreeSet<String>,
        solution: PlanTemplate,
        facts: impl IntoIterator<Item = Fact>,
        patterns: impl IntoIterator<Item = String>,
    ) {
        self.record_success();
        self.keywords.extend(keywords);
        self.solution = solution;
        self.union_facts(facts);
        self.union_patterns(patterns);
    }

    /// Check the counter invariant on a loaded record
    ///
    /// # Errors
    /// Returns error if `success_count > usage_count`
    pub fn check(&self) -> Result<(), KnowledgeError> {
        if self.success_count > self.usage_count {
            return Err(KnowledgeError::CorruptRecord {
                id: self.id,
                reason: format!(
                    "success_count {} exceeds usage_count {}",
                    self.success_count, self.usage_count
                ),
            });
        }
        Ok(())
    }

    /// Copy for community review: author stripped, status pending
    #[must_use]
    pub(crate) fn to_pending(&self) -> Self {
        let mut copy = self.clone();
        copy.author = None;
        copy.status = ExperienceStatus::Pending;
        copy
    }

    fn union_facts(&mut self, facts: impl IntoIterator<Item = Fact>) {
        for fact in facts {
            if !self.domain_facts.iter().any(|f| f.key == fact.key) {
                self.domain_facts.push(fact);
            }
        }
    }

    fn union_patterns(&mut self, patterns: impl IntoIterator<Item = String>) {
        for pattern in patterns {
            if !self.patterns.contains(&pattern) {
                self.patterns.push(pattern);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn template(summary: &str) -> PlanTemplate {
        PlanTemplate::new(summary, Plan::empty())
    }

    #[test]
    fn new_experience_counts_one_success() {
        let exp = Experience::new("Make a grid of boxes", "create", template("grid"));
        assert_eq!(exp.usage_count(), 1);
        assert_eq!(exp.success_count(), 1);
        assert_eq!(exp.status, ExperienceStatus::Active);
        assert!(exp.keywords.contains("grid"));
    }

    #[test]
    fn success_rate_with_zero_usage() {
        let exp = Experience::new("x", "create", template("x"))
            .with_counts(0, 0)
            .unwrap();
        assert!(exp.success_rate().abs() < f64::EPSILON);
    }

    #[test]
    fn with_counts_rejects_inverted_counters() {
        let result = Experience::new("x", "create", template("x")).with_counts(1, 2);
        assert!(matches!(result, Err(KnowledgeError::CorruptRecord { .. })));
    }

    #[test]
    fn failure_lowers_rate() {
        let mut exp = Experience::new("x", "create", template("x"));
        exp.record_failure();
        assert_eq!(exp.usage_count(), 2);
        assert!((exp.success_rate() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn merge_keeps_first_fact_and_unions_patterns() {
        let mut exp = Experience::new("grid boxes", "create", template("old"))
            .with_facts([Fact::new("spacing", "10")])
            .with_patterns(["rectangular_grid".to_string()]);

        exp.merge_success(
            ["spacing".to_string()].into_iter().collect(),
            template("new"),
            [Fact::new("spacing", "20"), Fact::new("count", "5")],
            ["rectangular_grid".to_string(), "attractor_field".to_string()],
        );

        assert_eq!(exp.usage_count(), 2);
        assert_eq!(exp.success_count(), 2);
        assert_eq!(exp.solution.summary, "new");
        assert_eq!(exp.domain_facts.len(), 2);
        assert_eq!(exp.domain_facts[0].value, "10");
        assert_eq!(exp.patterns, vec!["rectangular_grid", "attractor_field"]);
        assert!(exp.keywords.contains("spacing"));
    }

    #[test]
    fn pending_copy_strips_author() {
        let exp = Experience::new("x", "create", template("x")).with_author("me");
        let pending = exp.to_pending();
        assert_eq!(pending.id, exp.id);
        assert_eq!(pending.author, None);
        assert_eq!(pending.status, ExperienceStatus::Pending);
    }

    #[test]
    fn unknown_fields_rejected() {
        let exp = Experience::new("x", "create", template("x"));
        let mut value = serde_json::to_value(&exp).unwrap();
        value["rating"] = serde_json::json!(5);
        assert!(serde_json::from_value::<Experience>(value).is_err());
    }

    #[test]
    fn id_parses_back() {
        let id = ExperienceId::new();
        assert_eq!(id.to_string().parse::<ExperienceId>().unwrap(), id);
    }
}
