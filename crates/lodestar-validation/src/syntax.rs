//! Syntactic checker
//!
//! Pure pass over the plan. Checks are independent and always reported in
//! the same order, each in plan order.

use crate::registry::{CommandPolicy, KindRegistry, LiteralRequirement};
use lodestar_plan::{IssueCategory, Plan, PlanEdge, PortRef, Severity, ValidationIssue};

/// Structural and identifier checks
#[derive(Debug, Clone, Copy)]
pub struct SyntaxChecker<'a> {
    registry: &'a KindRegistry,
}

impl<'a> SyntaxChecker<'a> {
    /// Create checker over a registry
    #[inline]
    #[must_use]
    pub fn new(registry: &'a KindRegistry) -> Self {
        Self { registry }
    }

    /// Run every check
    #[must_use]
    pub fn check(&self, plan: &Plan) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        self.dangling_edges(plan, &mut issues);
        self.commands(plan, &mut issues);
        self.identities(plan, &mut issues);
        self.ports(plan, &mut issues);
        self.literals(plan, &mut issues);
        self.orphans(plan, &mut issues);

        tracing::debug!(
            nodes = plan.node_count(),
            issues = issues.len(),
            "syntax check finished"
        );
        issues
    }

    fn dangling_edges(&self, plan: &Plan, issues: &mut Vec<ValidationIssue>) {
        for edge in &plan.edges {
            for end in [&edge.from, &edge.to] {
                if !plan.contains(end.as_str()) {
                    issues.push(
                        ValidationIssue::syntax(
                            Severity::Critical,
                            IssueCategory::DanglingEdge,
                            format!("{} references missing node '{end}'", describe(edge)),
                        )
                        .with_suggestion("add the node or remove the edge"),
                    );
                }
            }
        }
    }

    fn commands(&self, plan: &Plan, issues: &mut Vec<ValidationIssue>) {
        for command in &plan.commands {
            match self.registry.command_policy(command) {
                CommandPolicy::Allowed => {}
                CommandPolicy::Denied(replacement) => issues.push(
                    ValidationIssue::syntax(
                        Severity::Critical,
                        IssueCategory::DeniedCommand,
                        format!("command '{command}' is denied"),
                    )
                    .with_suggestion(format!("use '{replacement}'")),
                ),
                CommandPolicy::Unknown => issues.push(ValidationIssue::syntax(
                    Severity::Warning,
                    IssueCategory::UnknownCommand,
                    format!("command '{command}' is unknown, verify manually"),
                )),
            }
        }
    }

    fn identities(&self, plan: &Plan, issues: &mut Vec<ValidationIssue>) {
        for node in &plan.nodes {
            if node.identity.is_some() {
                continue;
            }
            if let Some(default) = &self.registry.traits(&node.kind).identity_default {
                issues.push(
                    ValidationIssue::syntax(
                        Severity::Warning,
                        IssueCategory::AmbiguousIdentity,
                        format!(
                            "kind '{}' has several implementations; '{default}' will be used",
                            node.kind
                        ),
                    )
                    .at(node.id.clone())
                    .with_suggestion(format!("set identity explicitly (trusted default: '{default}')")),
                );
            }
        }
    }

    fn ports(&self, plan: &Plan, issues: &mut Vec<ValidationIssue>) {
        for edge in &plan.edges {
            let ends = [(&edge.from, &edge.from_port, "output"), (&edge.to, &edge.to_port, "input")];
            for (node, port, side) in ends {
                let PortRef::Name(name) = port else {
                    continue;
                };
                if self.registry.is_ambiguous_port(name) {
                    issues.push(
                        ValidationIssue::syntax(
                            Severity::Warning,
                            IssueCategory::AmbiguousPort,
                            format!("{side} port '{name}' on '{node}' is ambiguous by name"),
                        )
                        .at(node.clone())
                        .with_suggestion("address the port by positional index"),
                    );
                }
            }
        }
    }

    fn literals(&self, plan: &Plan, issues: &mut Vec<ValidationIssue>) {
        for node in &plan.nodes {
            if node.literal.is_some() {
                continue;
            }
            let severity = match self.registry.traits(&node.kind).literal {
                LiteralRequirement::None => continue,
                LiteralRequirement::Recommended => Severity::Info,
                LiteralRequirement::Required => Severity::Warning,
            };
            issues.push(
                ValidationIssue::syntax(
                    severity,
                    IssueCategory::MissingLiteral,
                    format!("'{}' ({}) carries no literal value", node.id, node.kind),
                )
                .at(node.id.clone())
                .with_suggestion("set an explicit value"),
            );
        }
    }

    fn orphans(&self, plan: &Plan, issues: &mut Vec<ValidationIssue>) {
        for node in &plan.nodes {
            if self.registry.traits(&node.kind).input_source {
                continue;
            }
            let connected = plan
                .edges
                .iter()
                .any(|e| e.from == node.id || e.to == node.id);
            if !connected {
                issues.push(
                    ValidationIssue::syntax(
                        Severity::Info,
                        IssueCategory::Orphan,
                        format!("'{}' ({}) has no connections", node.id, node.kind),
                    )
                    .at(node.id.clone()),
                );
            }
        }
    }
}

fn describe(edge: &PlanEdge) -> String {
    format!(
        "edge {}.{} -> {}.{}",
        edge.from, edge.from_port, edge.to, edge.to_port
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::ValidationTables;
    use lodestar_plan::{NodeId, PlanEdge, PlanNode};
    use pretty_assertions::assert_eq;

    fn registry() -> KindRegistry {
        KindRegistry::compile(&ValidationTables::default()).unwrap()
    }

    fn categories(issues: &[ValidationIssue]) -> Vec<(Severity, IssueCategory)> {
        issues.iter().map(|i| (i.severity, i.category)).collect()
    }

    #[test]
    fn empty_plan_is_clean() {
        let registry = registry();
        assert!(SyntaxChecker::new(&registry).check(&Plan::empty()).is_empty());
    }

    #[test]
    fn dangling_edge_is_critical() {
        let registry = registry();
        let plan = Plan {
            nodes: vec![PlanNode::new("a", "Series")],
            edges: vec![PlanEdge::new("a", 0u32, "ghost", 0u32)],
            commands: vec![],
        };
        let issues = SyntaxChecker::new(&registry).check(&plan);
        assert_eq!(
            categories(&issues),
            vec![(Severity::Critical, IssueCategory::DanglingEdge)]
        );
        assert!(issues[0].message.contains("ghost"));
    }

    #[test]
    fn command_lists() {
        let registry = registry();
        let plan = Plan {
            commands: vec!["connect".into(), "delete_all".into(), "launch".into()],
            ..Plan::empty()
        };
        let issues = SyntaxChecker::new(&registry).check(&plan);
        assert_eq!(
            categories(&issues),
            vec![
                (Severity::Critical, IssueCategory::DeniedCommand),
                (Severity::Warning, IssueCategory::UnknownCommand),
            ]
        );
        assert_eq!(issues[0].suggestion.as_deref(), Some("use 'delete_component'"));
        assert!(issues[1].message.contains("verify manually"));
    }

    #[test]
    fn multi_identity_needs_explicit_identity() {
        let registry = registry();
        let plan = Plan {
            nodes: vec![
                PlanNode::new("b1", "Box"),
                PlanNode::new("b2", "Box").with_identity("box_corner"),
            ],
            edges: vec![PlanEdge::new("b1", 0u32, "b2", 0u32)],
            commands: vec![],
        };
        let issues = SyntaxChecker::new(&registry).check(&plan);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].category, IssueCategory::AmbiguousIdentity);
        assert_eq!(issues[0].node_id, Some(NodeId::new("b1")));
        assert!(issues[0].message.contains("box_center"));
    }

    #[test]
    fn ambiguous_port_unless_indexed() {
        let registry = registry();
        let plan = Plan {
            nodes: vec![PlanNode::new("g", "Geo"), PlanNode::new("m", "Move")],
            edges: vec![
                PlanEdge::new("g", 0u32, "m", "T"),
                PlanEdge::new("g", 0u32, "m", 0u32),
                PlanEdge::new("g", "Geometry", "m", "G"),
            ],
            commands: vec![],
        };
        let issues = SyntaxChecker::new(&registry).check(&plan);
        assert_eq!(
            categories(&issues),
            vec![(Severity::Warning, IssueCategory::AmbiguousPort)]
        );
        assert_eq!(issues[0].node_id, Some(NodeId::new("m")));
    }

    #[test]
    fn literal_requirements() {
        let registry = registry();
        let plan = Plan {
            nodes: vec![
                PlanNode::new("s", "Number Slider"),
                PlanNode::new("p", "Panel"),
                PlanNode::new("ok", "Number Slider").with_number(3.0),
            ],
            edges: vec![],
            commands: vec![],
        };
        let issues = SyntaxChecker::new(&registry).check(&plan);
        // sliders and panels are input sources, so no orphan findings
        assert_eq!(
            categories(&issues),
            vec![
                (Severity::Warning, IssueCategory::MissingLiteral),
                (Severity::Info, IssueCategory::MissingLiteral),
            ]
        );
    }

    #[test]
    fn orphan_is_single_info() {
        let registry = registry();
        let plan = Plan {
            nodes: vec![PlanNode::new("lonely", "Loft")],
            edges: vec![],
            commands: vec![],
        };
        let issues = SyntaxChecker::new(&registry).check(&plan);
        assert_eq!(categories(&issues), vec![(Severity::Info, IssueCategory::Orphan)]);
    }

    #[test]
    fn checks_run_in_fixed_order() {
        let registry = registry();
        let plan = Plan {
            nodes: vec![PlanNode::new("lonely", "Loft"), PlanNode::new("b", "Box")],
            edges: vec![PlanEdge::new("b", "x", "nowhere", 0u32)],
            commands: vec!["bake_all".into()],
        };
        let issues = SyntaxChecker::new(&registry).check(&plan);
        assert_eq!(
            issues.iter().map(|i| i.category).collect::<Vec<_>>(),
            vec![
                IssueCategory::DanglingEdge,
                IssueCategory::DeniedCommand,
                IssueCategory::AmbiguousIdentity,
                IssueCategory::AmbiguousPort,
                IssueCategory::Orphan,
            ]
        );
    }
}
