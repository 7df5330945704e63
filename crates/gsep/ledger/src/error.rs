use gsep_types::TransitionHash;
use thiserror::Error;

/// Errors returned by the audit ledger.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The transition was already recorded. Not escalated.
    #[error("transition {0} is already recorded")]
    Duplicate(TransitionHash),

    #[error("ledger integrity violation at seq {seq}: {reason}")]
    IntegrityViolation { seq: u64, reason: String },

    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for LedgerError {
    fn from(err: std::io::Error) -> Self {
        LedgerError::Io(err.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
