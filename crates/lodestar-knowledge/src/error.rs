//! Knowledge store errors

use crate::experience::{ExperienceId, KnowledgeTier};
use std::path::PathBuf;

/// Errors raised by the knowledge store and its repositories
#[derive(Debug, thiserror::Error)]
pub enum KnowledgeError {
    /// Store root, tier directory or index absent
    ///
    /// Non-fatal on open: the tier starts empty.
    #[error("knowledge data missing: {path}")]
    ConfigMissing {
        /// Expected location
        path: PathBuf,
    },

    /// Filesystem failure
    #[error("knowledge I/O error at {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed record or index document
    #[error("invalid knowledge document {path}: {source}")]
    Json {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// Record violates an invariant
    #[error("corrupt experience {id}: {reason}")]
    CorruptRecord {
        /// Experience id
        id: ExperienceId,
        /// What is wrong
        reason: String,
    },

    /// Import into a tier that only fills through review
    #[error("cannot import into tier {0}")]
    ImportDenied(KnowledgeTier),

    /// Invalid store configuration
    #[error("invalid knowledge config {field}: {message}")]
    InvalidConfig {
        /// Field name
        field: String,
        /// What is wrong
        message: String,
    },
}
