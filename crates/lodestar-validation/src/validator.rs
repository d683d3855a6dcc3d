//! Two-phase plan validator

use crate::error::{AnalysisError, TablesError};
use crate::registry::KindRegistry;
use crate::semantics::{CardinalityMap, SemanticAnalyzer};
use crate::syntax::SyntaxChecker;
use crate::tables::ValidationTables;
use lodestar_plan::{
    IssueCategory, Plan, Severity, ValidationIssue, ValidationReport,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Validation configuration section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Optional YAML/JSON tables file; built-in tables when absent
    pub tables_path: Option<PathBuf>,
    /// Overrides the tables' explosion threshold
    pub explosion_threshold: Option<f64>,
}

/// Syntax then semantics over one compiled registry
#[derive(Debug, Clone)]
pub struct PlanValidator {
    registry: KindRegistry,
}

impl PlanValidator {
    /// Create validator from tables
    ///
    /// # Errors
    /// Returns error if the tables do not compile
    pub fn new(tables: &ValidationTables) -> Result<Self, TablesError> {
        Ok(Self {
            registry: KindRegistry::compile(tables)?,
        })
    }

    /// Create validator over an already compiled registry
    #[inline]
    #[must_use]
    pub fn with_registry(registry: KindRegistry) -> Self {
        Self { registry }
    }

    /// Build validator from its configuration section
    ///
    /// A configured tables file that does not exist falls back to the
    /// built-in tables with a warning.
    ///
    /// # Errors
    /// Returns error on an unreadable/malformed tables file or invalid threshold
    pub fn from_config(config: &ValidationConfig) -> Result<Self, TablesError> {
        let tables = match &config.tables_path {
            Some(path) if path.exists() => ValidationTables::load(path)?,
            Some(path) => {
                tracing::warn!(path = %path.display(), "validation tables not found, using built-in tables");
                ValidationTables::default()
            }
            None => ValidationTables::default(),
        };
        let mut registry = KindRegistry::compile(&tables)?;
        if let Some(threshold) = config.explosion_threshold {
            registry.set_explosion_threshold(threshold)?;
        }
        Ok(Self { registry })
    }

    /// Compiled registry
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &KindRegistry {
        &self.registry
    }

    /// Syntax phase only
    #[must_use]
    pub fn check_syntax(&self, plan: &Plan) -> Vec<ValidationIssue> {
        SyntaxChecker::new(&self.registry).check(plan)
    }

    /// Semantics phase only
    ///
    /// # Errors
    /// [`AnalysisError::CyclicGraph`] if the dataflow has a cycle
    pub fn check_semantics(&self, plan: &Plan) -> Result<Vec<ValidationIssue>, AnalysisError> {
        SemanticAnalyzer::new(&self.registry).check(plan)
    }

    /// Cardinality estimates for every node
    ///
    /// # Errors
    /// [`AnalysisError::CyclicGraph`] if the dataflow has a cycle
    pub fn estimate(&self, plan: &Plan) -> Result<CardinalityMap, AnalysisError> {
        SemanticAnalyzer::new(&self.registry).estimate(plan)
    }

    /// Run both phases and always produce a report
    ///
    /// Critical syntax issues skip semantics. A cycle becomes a single
    /// critical semantics issue.
    #[must_use]
    pub fn validate(&self, plan: &Plan) -> ValidationReport {
        let mut report = ValidationReport::from_issues(self.check_syntax(plan));
        if report.has_critical() {
            tracing::debug!("critical syntax issues, semantics skipped");
            return report;
        }

        match self.check_semantics(plan) {
            Ok(issues) => report.extend(issues),
            Err(AnalysisError::CyclicGraph { node }) => report.extend([ValidationIssue::semantics(
                Severity::Critical,
                IssueCategory::CyclicGraph,
                format!("dataflow contains a cycle through '{node}'"),
            )
            .at(node)
            .with_suggestion("break the feedback loop")]),
        }
        report
    }
}

impl Default for PlanValidator {
    fn default() -> Self {
        Self {
            // built-in tables always compile
            registry: KindRegistry::compile(&ValidationTables::default())
                .unwrap_or_else(|_| unreachable!("built-in validation tables compile")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lodestar_plan::{PlanEdge, PlanNode};
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_plan_has_empty_report() {
        let report = PlanValidator::default().validate(&Plan::empty());
        assert!(report.is_empty());
        assert_eq!(report.overall_severity(), None);
    }

    #[test]
    fn critical_syntax_skips_semantics() {
        let plan = Plan {
            nodes: vec![PlanNode::new("l", "Loft")],
            edges: vec![PlanEdge::new("l", 0u32, "ghost", 0u32)],
            commands: vec![],
        };
        let report = PlanValidator::default().validate(&plan);
        assert!(report.has_critical());
        assert_eq!(report.by_phase(lodestar_plan::Phase::Semantics).count(), 0);
    }

    #[test]
    fn cycle_becomes_issue() {
        let plan = Plan {
            nodes: vec![PlanNode::new("a", "Move"), PlanNode::new("b", "Move")],
            edges: vec![
                PlanEdge::new("a", 0u32, "b", 0u32),
                PlanEdge::new("b", 0u32, "a", 0u32),
            ],
            commands: vec![],
        };
        let validator = PlanValidator::default();
        assert!(validator.check_semantics(&plan).is_err());

        let report = validator.validate(&plan);
        let cyclic: Vec<_> = report
            .issues()
            .iter()
            .filter(|i| i.category == IssueCategory::CyclicGraph)
            .collect();
        assert_eq!(cyclic.len(), 1);
        assert!(report.has_critical());
    }

    #[test]
    fn config_threshold_overrides_tables() {
        let config = ValidationConfig {
            tables_path: None,
            explosion_threshold: Some(5_000.0),
        };
        let validator = PlanValidator::from_config(&config).unwrap();
        assert!((validator.registry().explosion_threshold() - 5_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_tables_file_falls_back() {
        let config = ValidationConfig {
            tables_path: Some(PathBuf::from("/nonexistent/lodestar/validation.yaml")),
            explosion_threshold: None,
        };
        assert!(PlanValidator::from_config(&config).is_ok());
    }

    #[test]
    fn tables_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("validation.yaml");
        std::fs::write(&path, "denied_commands:\n  purge: delete_component\n").unwrap();
        let validator = PlanValidator::from_config(&ValidationConfig {
            tables_path: Some(path),
            explosion_threshold: None,
        })
        .unwrap();

        let plan = Plan {
            commands: vec!["purge".into()],
            ..Plan::empty()
        };
        let report = validator.validate(&plan);
        assert_eq!(report.issues()[0].category, IssueCategory::DeniedCommand);
    }
}
