//! End-to-end behavior of the two-phase validator
//!
//! Tenet: the same plan always produces the same report, and every
//! finding names where it came from.

use lodestar_plan::{IssueCategory, Phase, Plan, PlanEdge, PlanNode, Severity};
use lodestar_validation::{PlanValidator, ValidationTables};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn box_faces(count: f64) -> Plan {
    let mut b = Plan::builder();
    for id in ["x", "y", "z"] {
        b.add_node(PlanNode::new(id, "Number Slider").with_number(count))
            .unwrap();
    }
    b.add_node(PlanNode::new("faces", "Box Array Faces")).unwrap();
    b.add_node(PlanNode::new("area", "Area")).unwrap();
    b.add_node(PlanNode::new("preview", "Preview")).unwrap();
    // indexed ports: single-letter names are ambiguous
    b.add_edge(PlanEdge::new("x", 0u32, "faces", 0u32)).unwrap();
    b.add_edge(PlanEdge::new("y", 0u32, "faces", 1u32)).unwrap();
    b.add_edge(PlanEdge::new("z", 0u32, "faces", 2u32)).unwrap();
    b.add_edge(PlanEdge::new("faces", 0u32, "area", 0u32)).unwrap();
    b.add_edge(PlanEdge::new("area", 0u32, "preview", 0u32)).unwrap();
    b.build()
}

#[test]
fn explosion_reported_once_at_origin() {
    let validator = PlanValidator::default();
    let plan = box_faces(10.0);

    let estimates = validator.estimate(&plan).unwrap();
    assert_eq!(estimates.value("faces"), Some(6000.0));
    assert_eq!(estimates.value("area"), Some(6000.0));
    assert_eq!(estimates.value("preview"), Some(6000.0));

    let report = validator.validate(&plan);
    let explosions: Vec<_> = report
        .issues()
        .iter()
        .filter(|i| i.category == IssueCategory::Explosion)
        .collect();
    assert_eq!(explosions.len(), 1);
    assert_eq!(explosions[0].severity, Severity::Critical);
    assert_eq!(explosions[0].node_id.as_ref().map(|n| n.as_str()), Some("faces"));
    assert!(explosions[0].message.contains("6000"));
}

#[test]
fn small_counts_are_clean() {
    let report = PlanValidator::default().validate(&box_faces(2.0));
    assert!(report.is_empty(), "{:?}", report.issues());
}

#[test]
fn orphan_is_single_info() {
    let plan = Plan {
        nodes: vec![PlanNode::new("lonely", "Area")],
        edges: vec![],
        commands: vec![],
    };
    let report = PlanValidator::default().validate(&plan);
    assert_eq!(report.issues().len(), 1);
    assert_eq!(report.issues()[0].category, IssueCategory::Orphan);
    assert_eq!(report.overall_severity(), Some(Severity::Info));
    assert!(!report.blocks(false));
    assert!(!report.blocks(true));
}

#[test]
fn cycle_is_a_critical_semantics_issue() {
    let plan = Plan {
        nodes: vec![PlanNode::new("a", "Area"), PlanNode::new("b", "Area")],
        edges: vec![
            PlanEdge::new("a", 0u32, "b", 0u32),
            PlanEdge::new("b", 0u32, "a", 0u32),
        ],
        commands: vec![],
    };
    let report = PlanValidator::default().validate(&plan);
    let semantic: Vec<_> = report.by_phase(Phase::Semantics).collect();
    assert_eq!(semantic.len(), 1);
    assert_eq!(semantic[0].category, IssueCategory::CyclicGraph);
    assert_eq!(semantic[0].severity, Severity::Critical);
}

#[test]
fn syntax_critical_skips_semantics() {
    let mut plan = box_faces(10.0);
    plan.commands.push("delete_all".into());
    let report = PlanValidator::default().validate(&plan);
    assert!(report.has_critical());
    assert_eq!(report.by_phase(Phase::Semantics).count(), 0);
}

#[test]
fn validation_is_repeatable() {
    let validator = PlanValidator::default();
    let mut plan = box_faces(10.0);
    plan.nodes.push(PlanNode::new("loft", "Loft"));
    plan.commands.push("launch".into());

    let first = validator.validate(&plan);
    let second = validator.validate(&plan);
    assert_eq!(first, second);
}

#[test]
fn empty_plan_has_no_severity() {
    let report = PlanValidator::default().validate(&Plan::empty());
    assert_eq!(report.overall_severity(), None);
    assert!(!report.blocks(true));
}

#[test]
fn custom_tables_from_yaml() {
    let tables = ValidationTables::from_yaml(
        r"
explosion_threshold: 10
input_sources: [Count]
behaviors:
  Fan:
    inputs:
      N: count
    output: '1:N*N'
",
    )
    .unwrap();
    let validator = PlanValidator::new(&tables).unwrap();

    let mut b = Plan::builder();
    b.add_node(PlanNode::new("n", "Count").with_number(4.0)).unwrap();
    b.add_node(PlanNode::new("fan", "Fan")).unwrap();
    b.add_edge(PlanEdge::new("n", 0u32, "fan", 0u32)).unwrap();

    let report = validator.validate(&b.build());
    assert_eq!(report.count(Severity::Critical), 1);
    assert_eq!(report.issues()[0].node_id.as_ref().map(|n| n.as_str()), Some("fan"));
}

proptest! {
    #[test]
    fn prop_explosion_iff_above_threshold(count in 1u32..30) {
        let validator = PlanValidator::default();
        let report = validator.validate(&box_faces(f64::from(count)));
        let cells = f64::from(count).powi(3) * 6.0;
        let exploded = report
            .issues()
            .iter()
            .filter(|i| i.category == IssueCategory::Explosion)
            .count();
        prop_assert_eq!(exploded, usize::from(cells > validator.registry().explosion_threshold()));
    }
}
