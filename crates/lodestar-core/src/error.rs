//! Error types for Lodestar core

use crate::orchestrator::ContinuationToken;
use crate::stage::Stage;
use lodestar_knowledge::KnowledgeError;
use lodestar_router::RouterError;
use lodestar_validation::TablesError;
use std::path::PathBuf;
use thiserror::Error;

/// Configuration loading and component construction errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config '{path}': {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Config text is not valid TOML for this schema
    #[error("invalid config '{path}': {message}")]
    Parse {
        /// File path, `<string>` for inline text
        path: String,
        /// Parser message
        message: String,
    },

    /// A value is out of range
    #[error("invalid value for {field}: {message}")]
    ValidationFailed {
        /// Dotted field path
        field: String,
        /// What is wrong
        message: String,
    },

    /// Router could not be built
    #[error(transparent)]
    Router(#[from] RouterError),

    /// Knowledge store could not be opened
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),

    /// Validation tables could not be compiled
    #[error(transparent)]
    Tables(#[from] TablesError),
}

/// Orchestrator errors
///
/// Validation findings and execution failures are not errors; they end the
/// run with [`crate::OrchestratorResult::Failed`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A run is suspended awaiting confirmation
    #[error("orchestrator is suspended at {stage}; resume or cancel it first")]
    Busy {
        /// Stage of the suspended run
        stage: Stage,
    },

    /// Token does not match the suspended run
    #[error("unknown continuation token {0}")]
    UnknownToken(ContinuationToken),

    /// Transition outside the allowed table
    #[error("illegal stage transition {from} -> {to}")]
    InvalidTransition {
        /// Current stage
        from: Stage,
        /// Requested stage
        to: Stage,
    },

    /// Knowledge store failure
    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
}
