//! Error types for plan construction and loading

use crate::plan::NodeId;

/// Structural errors raised at the plan API boundary
///
/// Validation findings are never raised; they are returned as
/// [`ValidationIssue`](crate::ValidationIssue)s.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Two nodes share an id
    #[error("duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// Edge references a node that does not exist
    #[error("edge references unknown node: {0}")]
    UnknownNode(NodeId),

    /// Literal is NaN or infinite
    #[error("non-finite literal on node: {0}")]
    NonFiniteLiteral(NodeId),

    /// Malformed plan document
    #[error("invalid plan document: {0}")]
    Json(#[from] serde_json::Error),
}
