//! Lodestar Plan
//!
//! Data model shared by every stage of the pipeline:
//! - [`Plan`], [`PlanNode`], [`PlanEdge`]: the candidate graph
//! - [`ValidationIssue`], [`ValidationReport`]: what the validator returns
//!
//! # Example
//!
//! ```rust
//! use lodestar_plan::{Plan, PlanEdge, PlanNode};
//!
//! let mut builder = Plan::builder();
//! builder.add_node(PlanNode::new("count", "Number Slider").with_number(10.0)).unwrap();
//! builder.add_node(PlanNode::new("series", "Series")).unwrap();
//! builder.add_edge(PlanEdge::new("count", 0u32, "series", "C")).unwrap();
//! let plan = builder.build();
//!
//! assert_eq!(plan.node_count(), 2);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod issue;
mod plan;

pub use error::PlanError;
pub use issue::{IssueCategory, Phase, Severity, ValidationIssue, ValidationReport};
pub use plan::{LiteralValue, NodeId, Plan, PlanBuilder, PlanEdge, PlanIndex, PlanNode, PortRef};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
