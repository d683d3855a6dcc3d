//! Orchestrator stages and their allowed transitions

use crate::error::OrchestratorError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of an orchestrator run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Route the request and search the knowledge store
    Search,
    /// Waiting for approval to reuse stored knowledge
    ConfirmKnowledgeUse,
    /// Produce the plan and run syntax checks
    SyntaxCheck,
    /// Waiting for approval of syntax warnings
    ConfirmSyntaxWarnings,
    /// Dataflow and pattern-risk analysis
    SemanticCheck,
    /// Waiting for approval of semantic warnings
    ConfirmSemanticWarnings,
    /// Hand the plan to the executor
    Execute,
    /// Record the successful solution
    Learn,
    /// Finished successfully
    Complete,
    /// Declined at a confirmation point
    Cancelled,
    /// Stopped by findings or a failed execution
    Failed,
}

impl Stage {
    /// Whether the run suspends here
    #[inline]
    #[must_use]
    pub fn is_confirmation(self) -> bool {
        matches!(
            self,
            Self::ConfirmKnowledgeUse | Self::ConfirmSyntaxWarnings | Self::ConfirmSemanticWarnings
        )
    }

    /// Whether the run ends here
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled | Self::Failed)
    }

    /// Stage entered when a confirmation is approved
    #[must_use]
    pub fn after_confirmation(self) -> Option<Self> {
        match self {
            Self::ConfirmKnowledgeUse => Some(Self::SyntaxCheck),
            Self::ConfirmSyntaxWarnings => Some(Self::SemanticCheck),
            Self::ConfirmSemanticWarnings => Some(Self::Execute),
            _ => None,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Search => "search",
            Self::ConfirmKnowledgeUse => "confirm_knowledge_use",
            Self::SyntaxCheck => "syntax_check",
            Self::ConfirmSyntaxWarnings => "confirm_syntax_warnings",
            Self::SemanticCheck => "semantic_check",
            Self::ConfirmSemanticWarnings => "confirm_semantic_warnings",
            Self::Execute => "execute",
            Self::Learn => "learn",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        })
    }
}

/// Stages reachable from `from` in one step
#[must_use]
pub fn allowed_transitions(from: Stage) -> &'static [Stage] {
    use Stage::{
        Cancelled, Complete, ConfirmKnowledgeUse, ConfirmSemanticWarnings, ConfirmSyntaxWarnings,
        Execute, Failed, Learn, Search, SemanticCheck, SyntaxCheck,
    };
    match from {
        Search => &[ConfirmKnowledgeUse, SyntaxCheck, Failed],
        ConfirmKnowledgeUse => &[SyntaxCheck, Cancelled, Failed],
        SyntaxCheck => &[ConfirmSyntaxWarnings, SemanticCheck, Failed],
        ConfirmSyntaxWarnings => &[SemanticCheck, Cancelled, Failed],
        SemanticCheck => &[ConfirmSemanticWarnings, Execute, Failed],
        ConfirmSemanticWarnings => &[Execute, Cancelled, Failed],
        Execute => &[Learn, Failed],
        Learn => &[Complete, Failed],
        Complete | Cancelled | Failed => &[],
    }
}

/// Check a transition against the table
///
/// # Errors
/// [`OrchestratorError::InvalidTransition`] for a pair not in the table
pub fn validate_transition(from: Stage, to: Stage) -> Result<(), OrchestratorError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(OrchestratorError::InvalidTransition { from, to })
    }
}
