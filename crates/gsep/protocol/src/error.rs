use gsep_types::{Command, State, StatusCode, TransitionId, Verdict};
use thiserror::Error;

/// Authorization failures raised while scoring credentials.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("credentials with a role list are required for non-exempt transitions")]
    MissingRoles,
}

/// Rejections produced by the transition validator.
///
/// Never crosses the public API as an error: [`ValidationError::into_verdict`]
/// turns it into a structured [`Verdict`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("state {0} is not defined by the protocol")]
    StateUndefined(State),

    #[error("command {command} is not allowed in state {state}")]
    CommandDisallowed { state: State, command: Command },

    #[error("transition {0} is not a declared edge")]
    TransitionInvalid(TransitionId),

    #[error("transition {transition}: {source}")]
    Auth {
        transition: TransitionId,
        #[source]
        source: AuthError,
    },

    #[error("transition {transition}: {matched} of {required} required signatures matched")]
    InsufficientSignatures {
        transition: TransitionId,
        matched: usize,
        required: u32,
    },
}

impl ValidationError {
    pub fn code(&self) -> StatusCode {
        match self {
            ValidationError::StateUndefined(_) => StatusCode::StateUndefined,
            ValidationError::CommandDisallowed { .. } => StatusCode::CommandDisallowed,
            ValidationError::TransitionInvalid(_) => StatusCode::TransitionInvalid,
            ValidationError::Auth { .. } => StatusCode::AuthError,
            ValidationError::InsufficientSignatures { .. } => StatusCode::AuthInsufficient,
        }
    }

    pub fn into_verdict(self) -> Verdict {
        Verdict::new(self.code(), self.to_string())
    }
}
