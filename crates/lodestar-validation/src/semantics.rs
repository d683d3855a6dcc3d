//! Semantic analyzer
//!
//! Dataflow cardinality estimation over a topological order, explosion
//! detection and declarative pattern-risk rules.

use crate::error::AnalysisError;
use crate::expr::ExprInputs;
use crate::registry::{Behavior, KindRegistry};
use crate::tables::PatternRule;
use indexmap::IndexMap;
use lodestar_plan::{
    IssueCategory, LiteralValue, NodeId, Plan, PlanIndex, PlanNode, PortRef, Severity,
    ValidationIssue,
};
use petgraph::algo::toposort;
use petgraph::graph::DiGraph;
use std::collections::BTreeSet;

/// Estimated output count of one node
#[derive(Debug, Clone, PartialEq)]
pub struct Estimate {
    /// Estimated number of output items
    pub value: f64,
    /// How the value was derived
    pub explanation: String,
    /// Largest upstream estimate feeding this node (0 with no inputs)
    pub max_upstream: f64,
}

/// Estimates for every node, in plan order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CardinalityMap {
    estimates: IndexMap<NodeId, Estimate>,
}

impl CardinalityMap {
    /// Estimate of a node
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Estimate> {
        self.estimates.get(&NodeId::new(id))
    }

    /// Estimated value of a node
    #[must_use]
    pub fn value(&self, id: &str) -> Option<f64> {
        self.get(id).map(|e| e.value)
    }

    /// All estimates in plan order
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &Estimate)> {
        self.estimates.iter()
    }

    /// Number of estimated nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.estimates.len()
    }

    /// No estimates
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.estimates.is_empty()
    }
}

/// Dataflow and pattern-risk analysis
#[derive(Debug, Clone, Copy)]
pub struct SemanticAnalyzer<'a> {
    registry: &'a KindRegistry,
}

impl<'a> SemanticAnalyzer<'a> {
    /// Create analyzer over a registry
    #[inline]
    #[must_use]
    pub fn new(registry: &'a KindRegistry) -> Self {
        Self { registry }
    }

    /// Run estimation, explosion detection and rules
    ///
    /// # Errors
    /// [`AnalysisError::CyclicGraph`] if the dataflow has no topological order
    pub fn check(&self, plan: &Plan) -> Result<Vec<ValidationIssue>, AnalysisError> {
        let estimates = self.estimate(plan)?;
        let mut issues = self.explosions(plan, &estimates);
        issues.extend(self.rules(plan));

        tracing::debug!(
            nodes = estimates.len(),
            issues = issues.len(),
            "semantic check finished"
        );
        Ok(issues)
    }

    /// Estimate output cardinality of every node
    ///
    /// Edges with unresolved endpoints are ignored.
    ///
    /// # Errors
    /// [`AnalysisError::CyclicGraph`] before any estimate is recorded
    pub fn estimate(&self, plan: &Plan) -> Result<CardinalityMap, AnalysisError> {
        let index = plan.index();
        let order = topological_order(&index)?;

        let mut values: Vec<Option<Estimate>> = vec![None; plan.nodes.len()];
        for pos in order {
            let node = &plan.nodes[pos];
            let estimate = match &self.registry.traits(&node.kind).behavior {
                Some(behavior) => estimate_behavior(&index, &values, node, pos, behavior),
                None => estimate_passive(&index, &values, pos),
            };
            values[pos] = Some(estimate);
        }

        let estimates = plan
            .nodes
            .iter()
            .zip(values)
            .filter_map(|(node, est)| est.map(|e| (node.id.clone(), e)))
            .collect();
        Ok(CardinalityMap { estimates })
    }

    fn explosions(&self, plan: &Plan, estimates: &CardinalityMap) -> Vec<ValidationIssue> {
        let threshold = self.registry.explosion_threshold();
        let mut issues = Vec::new();
        for node in &plan.nodes {
            let Some(est) = estimates.get(node.id.as_str()) else {
                continue;
            };
            // report where the count grows past the limit, not where it is carried
            if est.value > threshold && est.value > est.max_upstream {
                issues.push(
                    ValidationIssue::semantics(
                        Severity::Critical,
                        IssueCategory::Explosion,
                        format!(
                            "'{}' ({}) produces an estimated {} items, above the limit of {}; {}",
                            node.id,
                            node.kind,
                            number(est.value),
                            number(threshold),
                            est.explanation
                        ),
                    )
                    .at(node.id.clone())
                    .with_suggestion("reduce the driving counts or partition the data tree"),
                );
            }
        }
        issues
    }

    fn rules(&self, plan: &Plan) -> Vec<ValidationIssue> {
        let kinds = plan.kinds();
        self.registry
            .rules()
            .iter()
            .filter_map(|rule| evaluate_rule(self.registry, rule, plan, &kinds))
            .collect()
    }
}

fn topological_order(index: &PlanIndex<'_>) -> Result<Vec<usize>, AnalysisError> {
    let plan = index.plan();
    let mut graph: DiGraph<usize, ()> = DiGraph::with_capacity(plan.nodes.len(), plan.edges.len());
    let handles: Vec<_> = (0..plan.nodes.len()).map(|pos| graph.add_node(pos)).collect();
    for (from, to) in index.resolved_pairs() {
        graph.add_edge(handles[from], handles[to], ());
    }

    toposort(&graph, None)
        .map(|order| order.into_iter().map(|h| graph[h]).collect())
        .map_err(|cycle| AnalysisError::CyclicGraph {
            node: plan.nodes[graph[cycle.node_id()]].id.clone(),
        })
}

fn upstream(values: &[Option<Estimate>], pos: usize) -> f64 {
    values[pos].as_ref().map_or(1.0, |e| e.value)
}

/// Numeric value an edge source contributes: its literal, else its estimate
fn source_value(index: &PlanIndex<'_>, values: &[Option<Estimate>], source: &NodeId) -> (f64, f64) {
    let Some(pos) = index.position(source.as_str()) else {
        return (1.0, 1.0);
    };
    let cardinality = upstream(values, pos);
    let value = index.plan().nodes[pos]
        .literal
        .as_ref()
        .and_then(LiteralValue::as_number)
        .unwrap_or(cardinality);
    (value, cardinality)
}

fn feeds(port: &PortRef, name: &str, position: usize) -> bool {
    match port {
        PortRef::Name(n) => n.eq_ignore_ascii_case(name),
        PortRef::Index(i) => usize::try_from(*i).is_ok_and(|i| i == position),
    }
}

fn estimate_behavior(
    index: &PlanIndex<'_>,
    values: &[Option<Estimate>],
    node: &PlanNode,
    pos: usize,
    behavior: &Behavior,
) -> Estimate {
    let mut inputs = ExprInputs::default();
    let mut parts = Vec::with_capacity(behavior.inputs.len());
    let mut max_upstream: f64 = 0.0;

    for edge in index.incoming(pos) {
        let (_, card) = source_value(index, values, &edge.from);
        max_upstream = max_upstream.max(card);
    }

    for (position, (name, _meaning)) in behavior.inputs.iter().enumerate() {
        let mut fed = false;
        let mut value = 0.0;
        let mut cardinality = 0.0;
        for edge in index.incoming(pos).filter(|e| feeds(&e.to_port, name, position)) {
            let (v, c) = source_value(index, values, &edge.from);
            value += v;
            cardinality += c;
            fed = true;
        }
        if fed {
            parts.push(format!("{name}={}", number(value)));
        } else {
            let attribute = node
                .attributes
                .get(name)
                .and_then(|raw| raw.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite());
            match attribute {
                Some(v) => {
                    value = v;
                    parts.push(format!("{name}={} (attribute)", number(v)));
                }
                None => {
                    value = 1.0;
                    parts.push(format!("{name}=1 (unconnected, assumed)"));
                }
            }
            cardinality = 1.0;
        }
        inputs.values.insert(name.clone(), value);
        inputs.cardinalities.insert(name.clone(), cardinality);
    }

    let value = behavior.output.evaluate(&inputs);
    let explanation = if parts.is_empty() {
        format!("{} with no inputs", behavior.output)
    } else {
        format!("{} with {}", behavior.output, parts.join(", "))
    };

    Estimate {
        value,
        explanation,
        max_upstream,
    }
}

fn estimate_passive(index: &PlanIndex<'_>, values: &[Option<Estimate>], pos: usize) -> Estimate {
    let max_upstream = index
        .incoming(pos)
        .filter_map(|e| index.position(e.from.as_str()))
        .map(|p| upstream(values, p))
        .fold(0.0_f64, f64::max);
    if max_upstream > 0.0 {
        Estimate {
            value: max_upstream,
            explanation: format!("carries largest upstream count {}", number(max_upstream)),
            max_upstream,
        }
    } else {
        Estimate {
            value: 1.0,
            explanation: "no inputs".to_string(),
            max_upstream: 0.0,
        }
    }
}

fn evaluate_rule(
    registry: &KindRegistry,
    rule: &PatternRule,
    plan: &Plan,
    kinds: &BTreeSet<&str>,
) -> Option<ValidationIssue> {
    if !rule.present.iter().all(|k| kinds.contains(k.as_str())) {
        return None;
    }
    if rule.absent.iter().any(|k| kinds.contains(k.as_str())) {
        return None;
    }

    let anchor = match &rule.unconnected {
        Some(target) => {
            // positional references resolve only when the kind declares its inputs
            let position = registry
                .traits(&target.kind)
                .behavior
                .as_ref()
                .and_then(|b| b.input_position(&target.input));
            let fed: BTreeSet<&str> = plan
                .edges
                .iter()
                .filter(|e| match &e.to_port {
                    PortRef::Name(n) => n.eq_ignore_ascii_case(&target.input),
                    PortRef::Index(i) => {
                        position.is_some_and(|p| usize::try_from(*i).is_ok_and(|i| i == p))
                    }
                })
                .map(|e| e.to.as_str())
                .collect();
            let node = plan
                .nodes
                .iter()
                .find(|n| n.kind == target.kind && !fed.contains(n.id.as_str()))?;
            Some(node.id.clone())
        }
        None => rule.present.first().and_then(|kind| {
            plan.nodes
                .iter()
                .find(|n| &n.kind == kind)
                .map(|n| n.id.clone())
        }),
    };

    let mut issue = ValidationIssue::semantics(
        rule.severity,
        IssueCategory::PatternRisk,
        format!("{}: {}", rule.name, rule.message),
    );
    if let Some(id) = anchor {
        issue = issue.at(id);
    }
    if let Some(suggestion) = &rule.suggestion {
        issue = issue.with_suggestion(suggestion.clone());
    }
    Some(issue)
}

/// Whole numbers print without a fractional part
fn number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{value:.0}")
    } else {
        format!("{value:.2}")
    }
}
