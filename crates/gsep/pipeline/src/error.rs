use thiserror::Error;

/// Errors a stage may raise instead of an outcome.
///
/// The executor never propagates these: an erroring stage is a veto at its
/// own severity.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("collaborator {collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: String,
        reason: String,
    },

    #[error("metric {metric} is not a finite number: {value}")]
    InvalidMetric { metric: String, value: f64 },

    #[error("stage {stage} failed: {reason}")]
    Failed { stage: String, reason: String },
}

impl StageError {
    pub fn unavailable(collaborator: impl Into<String>, reason: impl Into<String>) -> Self {
        StageError::Unavailable {
            collaborator: collaborator.into(),
            reason: reason.into(),
        }
    }
}

/// Errors delivering an escalation to the correction workflow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EscalationError {
    #[error("escalation channel closed")]
    Closed,

    #[error("escalation rejected: {0}")]
    Rejected(String),
}

/// Errors persisting a forensic capture.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ForensicError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),
}
