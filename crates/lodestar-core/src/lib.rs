//! Lodestar Core
//!
//! Ties routing, knowledge and validation together:
//! - [`Lodestar`]: configured components behind one facade
//! - [`Orchestrator`]: staged run with explicit confirmation points
//! - [`PlanProducer`] / [`Executor`]: external collaborator seams
//! - [`LodestarConfig`]: TOML configuration with `LODESTAR_*` overrides
//!
//! # Example
//!
//! ```rust
//! use lodestar_core::{
//!     ExecutionOutcome, Lodestar, OrchestratorPolicy, OrchestratorResult, ProducedPlan,
//! };
//! use lodestar_knowledge::PlanTemplate;
//! use lodestar_plan::{Plan, PlanEdge, PlanNode};
//!
//! struct AlwaysOk;
//!
//! impl lodestar_core::Executor for AlwaysOk {
//!     fn execute(&self, _plan: &Plan) -> anyhow::Result<ExecutionOutcome> {
//!         Ok(ExecutionOutcome::succeeded())
//!     }
//! }
//!
//! let producer = |_: &str, _: Option<&PlanTemplate>| -> anyhow::Result<ProducedPlan> {
//!     let mut b = Plan::builder();
//!     b.add_node(PlanNode::new("n", "Number Slider").with_number(5.0))?;
//!     b.add_node(PlanNode::new("s", "Series"))?;
//!     b.add_edge(PlanEdge::new("n", 0u32, "s", 2u32))?;
//!     Ok(ProducedPlan::new(b.build()))
//! };
//!
//! let lodestar = Lodestar::in_memory().with_policy(OrchestratorPolicy::unattended());
//! let mut orchestrator = lodestar.orchestrator(producer, AlwaysOk);
//!
//! let result = orchestrator.run("create a twisted tower").unwrap();
//! assert!(matches!(result, OrchestratorResult::Completed(_)));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod capabilities;
mod collaborators;
mod config;
mod error;
mod lodestar;
pub mod logging;
mod orchestrator;
mod stage;

pub use capabilities::{Capabilities, Preview};
pub use collaborators::{ExecutionOutcome, Executor, PlanProducer, ProducedPlan};
pub use config::{
    LodestarConfig, ENV_EXPLOSION_THRESHOLD, ENV_KNOWLEDGE_ROOT, ENV_REQUIRE_ZERO_WARNINGS,
};
pub use error::{ConfigError, OrchestratorError};
pub use lodestar::Lodestar;
pub use orchestrator::{
    ConfirmationDecision, ContinuationToken, FailureReason, KnowledgeMatch, Orchestrator,
    OrchestratorPolicy, OrchestratorResult, PendingConfirmation, RunCancelled, RunFailure,
    RunSummary,
};
pub use stage::{allowed_transitions, validate_transition, Stage};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
