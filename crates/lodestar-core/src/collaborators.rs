//! External collaborators driven by the orchestrator
//!
//! Plan production and execution live outside Lodestar. Their failures are
//! opaque to the pipeline, so both seams return [`anyhow::Result`].

use lodestar_knowledge::{Fact, PlanTemplate};
use lodestar_plan::Plan;
use serde::{Deserialize, Serialize};

/// Plan produced for a request, with the facts gathered while producing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProducedPlan {
    /// Candidate plan
    pub plan: Plan,
    /// Domain facts worth remembering
    #[serde(default)]
    pub facts: Vec<Fact>,
}

impl ProducedPlan {
    /// Plan without facts
    #[inline]
    #[must_use]
    pub fn new(plan: Plan) -> Self {
        Self {
            plan,
            facts: Vec::new(),
        }
    }

    /// With facts
    #[inline]
    #[must_use]
    pub fn with_facts(mut self, facts: Vec<Fact>) -> Self {
        self.facts = facts;
        self
    }
}

/// Result reported by the executor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Whether the design tool accepted the plan
    pub success: bool,
    /// Diagnostics reported by the tool
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ExecutionOutcome {
    /// Successful execution
    #[inline]
    #[must_use]
    pub fn succeeded() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
        }
    }

    /// Failed execution with diagnostics
    #[must_use]
    pub fn failed(errors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            success: false,
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }
}

/// Turns a request into a candidate plan
///
/// `reference` is the accepted stored solution, when knowledge is reused.
pub trait PlanProducer {
    /// Produce a plan
    ///
    /// # Errors
    /// Any failure; the run fails with the error text
    fn produce(&self, request: &str, reference: Option<&PlanTemplate>) -> anyhow::Result<ProducedPlan>;
}

impl<F> PlanProducer for F
where
    F: Fn(&str, Option<&PlanTemplate>) -> anyhow::Result<ProducedPlan>,
{
    fn produce(&self, request: &str, reference: Option<&PlanTemplate>) -> anyhow::Result<ProducedPlan> {
        self(request, reference)
    }
}

/// Dispatches a validated plan to the design tool
#[cfg_attr(test, mockall::automock)]
pub trait Executor {
    /// Execute a plan
    ///
    /// # Errors
    /// Transport or tool failure; treated as a failed execution
    fn execute(&self, plan: &Plan) -> anyhow::Result<ExecutionOutcome>;
}
