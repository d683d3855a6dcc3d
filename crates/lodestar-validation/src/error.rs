//! Validation errors
//!
//! Findings about a plan are [`ValidationIssue`](lodestar_plan::ValidationIssue)s,
//! never errors. Errors cover broken tables and plans that cannot be
//! analysed at all.

use lodestar_plan::NodeId;
use std::path::PathBuf;

/// Errors loading or compiling validation tables
#[derive(Debug, thiserror::Error)]
pub enum TablesError {
    /// Output expression does not parse
    #[error("invalid output expression for kind '{kind}': {message}")]
    Expression {
        /// Node kind
        kind: String,
        /// Parse failure
        message: String,
    },

    /// Explosion threshold is not a positive finite number
    #[error("invalid explosion threshold: {0}")]
    InvalidThreshold(f64),

    /// Tables file could not be read
    #[error("failed to read validation tables {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed YAML tables
    #[error("invalid validation tables (yaml): {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed JSON tables
    #[error("invalid validation tables (json): {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that stop semantic analysis
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// Dataflow contains a cycle; no estimate was recorded
    #[error("plan graph contains a cycle through node {node}")]
    CyclicGraph {
        /// A node on the cycle
        node: NodeId,
    },
}
