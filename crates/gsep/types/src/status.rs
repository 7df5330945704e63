use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, machine-readable outcome codes of the transition validator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusCode {
    Success,
    StateUndefined,
    CommandDisallowed,
    TransitionInvalid,
    AuthExempt,
    AuthInsufficient,
    AuthMet,
    AuthError,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::StateUndefined => "STATE_UNDEFINED",
            StatusCode::CommandDisallowed => "COMMAND_DISALLOWED",
            StatusCode::TransitionInvalid => "TRANSITION_INVALID",
            StatusCode::AuthExempt => "AUTH_EXEMPT",
            StatusCode::AuthInsufficient => "AUTH_INSUFFICIENT",
            StatusCode::AuthMet => "AUTH_MET",
            StatusCode::AuthError => "AUTH_ERROR",
        }
    }

    /// Whether this code admits the request.
    pub fn is_valid(&self) -> bool {
        matches!(
            self,
            StatusCode::Success | StatusCode::AuthExempt | StatusCode::AuthMet
        )
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured answer of the transition validator.
///
/// `valid` is derived from `code`, so a verdict can never claim validity
/// for a rejecting code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub valid: bool,
    pub code: StatusCode,
    pub reason: String,
}

impl Verdict {
    pub fn new(code: StatusCode, reason: impl Into<String>) -> Self {
        Self {
            valid: code.is_valid(),
            code,
            reason: reason.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}
