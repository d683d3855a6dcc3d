//! Lodestar Validation
//!
//! Static validation of candidate plans before anything executes:
//! - [`SyntaxChecker`]: dangling edges, command lists, identities, ports,
//!   literals and orphans
//! - [`SemanticAnalyzer`]: dataflow cardinality estimation, explosion
//!   detection and pattern-risk rules
//! - [`PlanValidator`]: both phases, producing a [`ValidationReport`]
//!
//! Everything the checks know about node kinds comes from
//! [`ValidationTables`], compiled once into a [`KindRegistry`].
//!
//! # Example
//!
//! ```rust
//! use lodestar_plan::{Plan, PlanEdge, PlanNode, Severity};
//! use lodestar_validation::PlanValidator;
//!
//! let mut builder = Plan::builder();
//! builder.add_node(PlanNode::new("x", "Number Slider").with_number(10.0)).unwrap();
//! builder.add_node(PlanNode::new("y", "Number Slider").with_number(10.0)).unwrap();
//! builder.add_node(PlanNode::new("z", "Number Slider").with_number(10.0)).unwrap();
//! builder.add_node(PlanNode::new("faces", "Box Array Faces")).unwrap();
//! builder.add_edge(PlanEdge::new("x", 0u32, "faces", 0u32)).unwrap();
//! builder.add_edge(PlanEdge::new("y", 0u32, "faces", 1u32)).unwrap();
//! builder.add_edge(PlanEdge::new("z", 0u32, "faces", 2u32)).unwrap();
//!
//! let report = PlanValidator::default().validate(&builder.build());
//! assert_eq!(report.overall_severity(), Some(Severity::Critical));
//! ```
//!
//! [`ValidationReport`]: lodestar_plan::ValidationReport

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod expr;
mod registry;
mod semantics;
mod syntax;
mod tables;
mod validator;

pub use error::{AnalysisError, TablesError};
pub use expr::{CardinalityExpr, ExprInputs, Factor};
pub use registry::{Behavior, CommandPolicy, KindRegistry, KindTraits, LiteralRequirement};
pub use semantics::{CardinalityMap, Estimate, SemanticAnalyzer};
pub use syntax::SyntaxChecker;
pub use tables::{BehaviorSpec, KindInput, PatternRule, ValidationTables};
pub use validator::{PlanValidator, ValidationConfig};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
