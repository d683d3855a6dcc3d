//! Validation issue model
//!
//! Issues are plain values. Checkers return them; only the orchestrator
//! decides whether they block progression.

use crate::plan::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which validator phase produced an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Structural and identifier checks
    Syntax,
    /// Dataflow and pattern-risk checks
    Semantics,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Syntax => "syntax",
            Self::Semantics => "semantics",
        })
    }
}

/// Issue severity, ordered `Info < Warning < Critical`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational
    Info,
    /// Needs a human look
    Warning,
    /// Blocks progression
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critical => "critical",
        })
    }
}

/// Issue classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCategory {
    /// Edge endpoint does not exist
    DanglingEdge,
    /// Command on the deny-list
    DeniedCommand,
    /// Command on neither list
    UnknownCommand,
    /// Multi-identity kind without explicit identity
    AmbiguousIdentity,
    /// Port addressed by an ambiguous short name
    AmbiguousPort,
    /// Value-carrying node without a literal
    MissingLiteral,
    /// Node with no connections
    Orphan,
    /// Estimated output count above threshold
    Explosion,
    /// Declarative pattern-risk rule matched
    PatternRisk,
    /// Plan graph has no topological order
    CyclicGraph,
}

impl IssueCategory {
    /// Stable snake_case name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DanglingEdge => "dangling_edge",
            Self::DeniedCommand => "denied_command",
            Self::UnknownCommand => "unknown_command",
            Self::AmbiguousIdentity => "ambiguous_identity",
            Self::AmbiguousPort => "ambiguous_port",
            Self::MissingLiteral => "missing_literal",
            Self::Orphan => "orphan",
            Self::Explosion => "explosion",
            Self::PatternRisk => "pattern_risk",
            Self::CyclicGraph => "cyclic_graph",
        }
    }
}

impl fmt::Display for IssueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single validator finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// Producing phase
    pub phase: Phase,
    /// Severity
    pub severity: Severity,
    /// Classification
    pub category: IssueCategory,
    /// Node the issue is about, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Human-readable description
    pub message: String,
    /// Suggested remedy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ValidationIssue {
    /// Create issue
    #[inline]
    #[must_use]
    pub fn new(
        phase: Phase,
        severity: Severity,
        category: IssueCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            phase,
            severity,
            category,
            node_id: None,
            message: message.into(),
            suggestion: None,
        }
    }

    /// Syntax-phase issue
    #[inline]
    #[must_use]
    pub fn syntax(severity: Severity, category: IssueCategory, message: impl Into<String>) -> Self {
        Self::new(Phase::Syntax, severity, category, message)
    }

    /// Semantics-phase issue
    #[inline]
    #[must_use]
    pub fn semantics(
        severity: Severity,
        category: IssueCategory,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Phase::Semantics, severity, category, message)
    }

    /// Attach node
    #[inline]
    #[must_use]
    pub fn at(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Attach suggestion
    #[inline]
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}/{}", self.severity, self.phase, self.category)?;
        if let Some(node) = &self.node_id {
            write!(f, " @{node}")?;
        }
        write!(f, ": {}", self.message)?;
        if let Some(s) = &self.suggestion {
            write!(f, " (suggestion: {s})")?;
        }
        Ok(())
    }
}

/// Collected issues with their severity rollup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    issues: Vec<ValidationIssue>,
    overall_severity: Option<Severity>,
}

impl ValidationReport {
    /// Build report, computing the rollup
    #[must_use]
    pub fn from_issues(issues: Vec<ValidationIssue>) -> Self {
        let overall_severity = issues.iter().map(|i| i.severity).max();
        Self {
            issues,
            overall_severity,
        }
    }

    /// Append more issues, keeping order
    pub fn extend(&mut self, more: impl IntoIterator<Item = ValidationIssue>) {
        self.issues.extend(more);
        self.overall_severity = self.issues.iter().map(|i| i.severity).max();
    }

    /// All issues in emission order
    #[inline]
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        &self.issues
    }

    /// Consume into issues
    #[inline]
    #[must_use]
    pub fn into_issues(self) -> Vec<ValidationIssue> {
        self.issues
    }

    /// Highest severity, `None` for an empty report
    #[inline]
    #[must_use]
    pub fn overall_severity(&self) -> Option<Severity> {
        self.overall_severity
    }

    /// No issues at all
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Any critical issue present
    #[inline]
    #[must_use]
    pub fn has_critical(&self) -> bool {
        self.overall_severity == Some(Severity::Critical)
    }

    /// Count issues of a severity
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// Issues from one phase
    pub fn by_phase(&self, phase: Phase) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(move |i| i.phase == phase)
    }

    /// Whether the report stops progression
    ///
    /// Critical always blocks; warnings block only when the caller demands
    /// a warning-free plan.
    #[must_use]
    pub fn blocks(&self, require_zero_warnings: bool) -> bool {
        match self.overall_severity {
            Some(Severity::Critical) => true,
            Some(Severity::Warning) => require_zero_warnings,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_report_has_no_severity() {
        let report = ValidationReport::from_issues(Vec::new());
        assert!(report.is_empty());
        assert_eq!(report.overall_severity(), None);
        assert!(!report.blocks(true));
    }

    #[test]
    fn rollup_takes_max() {
        let report = ValidationReport::from_issues(vec![
            ValidationIssue::syntax(Severity::Info, IssueCategory::Orphan, "o"),
            ValidationIssue::syntax(Severity::Warning, IssueCategory::AmbiguousPort, "p"),
        ]);
        assert_eq!(report.overall_severity(), Some(Severity::Warning));
        assert!(!report.blocks(false));
        assert!(report.blocks(true));
        assert_eq!(report.count(Severity::Info), 1);
    }

    #[test]
    fn extend_recomputes_rollup() {
        let mut report = ValidationReport::from_issues(vec![ValidationIssue::syntax(
            Severity::Info,
            IssueCategory::Orphan,
            "o",
        )]);
        report.extend([ValidationIssue::semantics(
            Severity::Critical,
            IssueCategory::Explosion,
            "boom",
        )]);
        assert!(report.has_critical());
        assert_eq!(report.by_phase(Phase::Semantics).count(), 1);
    }

    #[test]
    fn issue_display() {
        let issue = ValidationIssue::syntax(
            Severity::Critical,
            IssueCategory::DeniedCommand,
            "command 'x' is denied",
        )
        .at(NodeId::new("n1"))
        .with_suggestion("use 'y'");
        assert_eq!(
            issue.to_string(),
            "[critical] syntax/denied_command @n1: command 'x' is denied (suggestion: use 'y')"
        );
    }
}
