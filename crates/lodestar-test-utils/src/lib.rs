//! Testing utilities for the Lodestar workspace
//!
//! Sample plans, seeded stores and scripted collaborators.

#![allow(missing_docs)]

use lodestar_core::{ExecutionOutcome, Executor, PlanProducer, ProducedPlan};
use lodestar_knowledge::{Experience, Fact, KnowledgeStore, KnowledgeTier, PlanTemplate};
use lodestar_plan::{Plan, PlanEdge, PlanNode};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Request that routes Direct with the built-in tables
pub const TOWER_REQUEST: &str = "create a twisted tower";

/// Slider-driven series; clean under the built-in tables
pub fn series_plan(count: f64) -> Plan {
    let mut b = Plan::builder();
    b.add_node(PlanNode::new("count", "Number Slider").with_number(count))
        .unwrap();
    b.add_node(PlanNode::new("series", "Series")).unwrap();
    b.add_edge(PlanEdge::new("count", 0u32, "series", 2u32))
        .unwrap();
    b.add_command("add_component");
    b.add_command("connect");
    b.build()
}

/// Box array with six faces per cell: `count^3 * 6` items
pub fn box_faces_plan(count: f64) -> Plan {
    let mut b = Plan::builder();
    for id in ["x", "y", "z"] {
        b.add_node(PlanNode::new(id, "Number Slider").with_number(count))
            .unwrap();
    }
    b.add_node(PlanNode::new("faces", "Box Array Faces")).unwrap();
    b.add_node(PlanNode::new("area", "Area")).unwrap();
    for (i, id) in ["x", "y", "z"].into_iter().enumerate() {
        let port = u32::try_from(i).unwrap();
        b.add_edge(PlanEdge::new(id, 0u32, "faces", port)).unwrap();
    }
    b.add_edge(PlanEdge::new("faces", 0u32, "area", 0u32)).unwrap();
    b.build()
}

/// Clean plan plus an unknown command (one syntax warning)
pub fn warning_plan() -> Plan {
    let mut plan = series_plan(4.0);
    plan.commands.push("launch_rockets".to_string());
    plan
}

/// Two nodes feeding each other
pub fn cyclic_plan() -> Plan {
    Plan {
        nodes: vec![PlanNode::new("a", "Area"), PlanNode::new("b", "Area")],
        edges: vec![
            PlanEdge::new("a", 0u32, "b", 0u32),
            PlanEdge::new("b", 0u32, "a", 0u32),
        ],
        commands: vec![],
    }
}

/// In-memory store with one golden experience for [`TOWER_REQUEST`]
pub fn seeded_store() -> (Arc<KnowledgeStore>, Experience) {
    let store = Arc::new(KnowledgeStore::in_memory());
    let golden = Experience::new(
        TOWER_REQUEST,
        "create",
        PlanTemplate::new("curated tower", series_plan(12.0)),
    )
    .with_facts([Fact::new("floors", "12").with_source("curator")])
    .with_patterns(["twisted_tower".to_string()]);
    store.import(KnowledgeTier::Golden, golden.clone()).unwrap();
    (store, golden)
}

/// Producer returning a fixed plan and remembering the references it saw
#[derive(Debug, Clone, Default)]
pub struct StubProducer {
    plan: Plan,
    facts: Vec<Fact>,
    references: Arc<Mutex<Vec<Option<String>>>>,
}

impl StubProducer {
    pub fn new(plan: Plan) -> Self {
        Self {
            plan,
            ..Self::default()
        }
    }

    pub fn with_facts(mut self, facts: Vec<Fact>) -> Self {
        self.facts = facts;
        self
    }

    /// Summaries of the references passed so far, `None` for no reference
    pub fn references(&self) -> Vec<Option<String>> {
        self.references.lock().clone()
    }
}

impl PlanProducer for StubProducer {
    fn produce(&self, _request: &str, reference: Option<&PlanTemplate>) -> anyhow::Result<ProducedPlan> {
        self.references
            .lock()
            .push(reference.map(|t| t.summary.clone()));
        Ok(ProducedPlan::new(self.plan.clone()).with_facts(self.facts.clone()))
    }
}

/// Executor replaying scripted outcomes, then succeeding
#[derive(Debug, Clone, Default)]
pub struct ScriptedExecutor {
    script: Arc<Mutex<VecDeque<Result<ExecutionOutcome, String>>>>,
    executed: Arc<Mutex<Vec<Plan>>>,
}

impl ScriptedExecutor {
    pub fn succeeding() -> Self {
        Self::default()
    }

    pub fn then_fail(self, errors: &[&str]) -> Self {
        self.script
            .lock()
            .push_back(Ok(ExecutionOutcome::failed(errors.iter().copied())));
        self
    }

    pub fn then_error(self, message: &str) -> Self {
        self.script.lock().push_back(Err(message.to_string()));
        self
    }

    pub fn executed(&self) -> Vec<Plan> {
        self.executed.lock().clone()
    }
}

impl Executor for ScriptedExecutor {
    fn execute(&self, plan: &Plan) -> anyhow::Result<ExecutionOutcome> {
        self.executed.lock().push(plan.clone());
        match self.script.lock().pop_front() {
            Some(Ok(outcome)) => Ok(outcome),
            Some(Err(message)) => Err(anyhow::anyhow!(message)),
            None => Ok(ExecutionOutcome::succeeded()),
        }
    }
}
