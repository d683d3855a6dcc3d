//! Router errors

use std::path::PathBuf;

/// Errors raised while configuring the router
///
/// Routing itself never fails; only tables and weights can be rejected.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    /// Confidence weight is negative or non-finite
    #[error("invalid confidence weight {field}: {value}")]
    InvalidWeight {
        /// Field name
        field: String,
        /// Offending value
        value: f64,
    },

    /// Routing threshold outside its range
    #[error("invalid routing threshold {field}: {value}")]
    InvalidThreshold {
        /// Field name
        field: String,
        /// Offending value
        value: f64,
    },

    /// Tables file could not be read
    #[error("failed to read router tables {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Malformed YAML tables
    #[error("invalid router tables (yaml): {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed JSON tables
    #[error("invalid router tables (json): {0}")]
    Json(#[from] serde_json::Error),
}
