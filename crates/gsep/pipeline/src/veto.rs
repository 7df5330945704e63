use std::fmt;

use gsep_types::{Phase, Severity, VetoBit};
use serde::{Deserialize, Serialize};

/// Why a stage vetoed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VetoCause {
    /// The stage evaluated and refused.
    Rejected { reason: String },
    /// The stage did not answer within its deadline.
    TimedOut { after_ms: u64 },
    /// The stage raised an error.
    Failed { error: String },
}

impl fmt::Display for VetoCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VetoCause::Rejected { reason } => f.write_str(reason),
            VetoCause::TimedOut { after_ms } => write!(f, "timed out after {after_ms}ms"),
            VetoCause::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// A severity-tagged stage failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageVeto {
    pub stage: String,
    pub owner: String,
    pub phase: Phase,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<VetoBit>,
    pub cause: VetoCause,
}

impl fmt::Display for StageVeto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} stage {} (owner {}) vetoed: {}",
            self.severity, self.stage, self.owner, self.cause
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_stage_owner_and_cause() {
        let veto = StageVeto {
            stage: "stability-gate".into(),
            owner: "stability-authority".into(),
            phase: Phase::Gating,
            severity: Severity::Critical,
            gate: Some(VetoBit::Stability),
            cause: VetoCause::TimedOut { after_ms: 250 },
        };
        assert_eq!(
            veto.to_string(),
            "CRITICAL stage stability-gate (owner stability-authority) vetoed: timed out after 250ms"
        );
    }
}
