use gsep_types::{Phase, Severity, VetoBit};
use serde::{Deserialize, Serialize};

/// Scalar contribution of a numeric stage to the utility scores.
///
/// Contributions from several stages add up.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    #[serde(rename = "S01", default, skip_serializing_if = "Option::is_none")]
    pub s01: Option<f64>,
    #[serde(rename = "S02", default, skip_serializing_if = "Option::is_none")]
    pub s02: Option<f64>,
}

impl Contribution {
    pub fn certified(value: f64) -> Self {
        Self {
            s01: Some(value),
            s02: None,
        }
    }

    pub fn baseline(value: f64) -> Self {
        Self {
            s01: None,
            s02: Some(value),
        }
    }

    pub fn both(certified: f64, baseline: f64) -> Self {
        Self {
            s01: Some(certified),
            s02: Some(baseline),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.s01.is_none() && self.s02.is_none()
    }
}

/// What a stage decided.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageOutcome {
    Pass {
        #[serde(default, skip_serializing_if = "Contribution::is_empty")]
        contribution: Contribution,
    },
    Veto {
        reason: String,
    },
}

impl StageOutcome {
    pub fn pass() -> Self {
        StageOutcome::Pass {
            contribution: Contribution::default(),
        }
    }

    pub fn pass_with(contribution: Contribution) -> Self {
        StageOutcome::Pass { contribution }
    }

    pub fn veto(reason: impl Into<String>) -> Self {
        StageOutcome::Veto {
            reason: reason.into(),
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, StageOutcome::Pass { .. })
    }
}

/// How a stage ended, as written to the trail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Pass,
    Veto,
    TimedOut,
    Failed,
}

/// One line of the per-run forensic trail.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub owner: String,
    pub phase: Phase,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate: Option<VetoBit>,
    pub status: StageStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Contribution::is_empty")]
    pub contribution: Contribution,
    pub elapsed_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_wire_shape() {
        let json = serde_json::to_value(StageOutcome::veto("risk too high")).unwrap();
        assert_eq!(json["result"], "VETO");
        assert_eq!(json["reason"], "risk too high");

        let json =
            serde_json::to_value(StageOutcome::pass_with(Contribution::both(0.8, 0.7))).unwrap();
        assert_eq!(json["result"], "PASS");
        assert_eq!(json["contribution"]["S01"], 0.8);
    }

    #[test]
    fn empty_contribution_is_omitted() {
        let json = serde_json::to_value(StageOutcome::pass()).unwrap();
        assert!(json.get("contribution").is_none());
    }
}
