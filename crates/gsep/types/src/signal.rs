use std::fmt;

use serde::{Deserialize, Serialize};

/// Tri-state value of a veto bit.
///
/// `Unset` means the owning stage never ran. It is never coerced to a pass:
/// the finality calculus treats it as a failure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GateSignal {
    #[default]
    Unset,
    Pass,
    Veto,
}

impl GateSignal {
    pub fn is_pass(&self) -> bool {
        matches!(self, GateSignal::Pass)
    }

    pub fn is_veto(&self) -> bool {
        matches!(self, GateSignal::Veto)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, GateSignal::Unset)
    }
}

/// The four admission signals consumed by the finality calculus.
///
/// `Context` carries the positive context attestation; the other three are
/// vetoes. All four are stored as [`GateSignal`] so that `Pass` always means
/// "this gate admits the transition".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VetoBit {
    Context,
    Policy,
    Stability,
    Behavior,
}

impl VetoBit {
    pub const ALL: [VetoBit; 4] = [
        VetoBit::Context,
        VetoBit::Policy,
        VetoBit::Stability,
        VetoBit::Behavior,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VetoBit::Context => "context_pass",
            VetoBit::Policy => "policy_veto",
            VetoBit::Stability => "stability_veto",
            VetoBit::Behavior => "behavior_veto",
        }
    }
}

impl fmt::Display for VetoBit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure severity class of a pipeline stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    /// Local and recoverable: the run is rejected, nothing else happens.
    Standard,
    /// Forensic capture plus escalation to the correction workflow.
    Critical,
    /// Everything `Critical` does, plus a halt of further pipeline intake.
    Terminal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Standard => "STANDARD",
            Severity::Critical => "CRITICAL",
            Severity::Terminal => "TERMINAL",
        };
        f.write_str(s)
    }
}

/// Ordered pipeline phases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Anchoring,
    Gating,
    Audit,
    Finality,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Anchoring => "anchoring",
            Phase::Gating => "gating",
            Phase::Audit => "audit",
            Phase::Finality => "finality",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_signal_is_unset() {
        let s = GateSignal::default();
        assert!(s.is_unset());
        assert!(!s.is_pass());
        assert!(!s.is_veto());
    }

    #[test]
    fn severity_orders_by_impact() {
        assert!(Severity::Standard < Severity::Critical);
        assert!(Severity::Critical < Severity::Terminal);
    }

    #[test]
    fn phases_are_ordered() {
        assert!(Phase::Anchoring < Phase::Gating);
        assert!(Phase::Gating < Phase::Audit);
        assert!(Phase::Audit < Phase::Finality);
    }
}
