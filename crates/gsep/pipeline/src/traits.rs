use std::time::Duration;

use async_trait::async_trait;
use gsep_types::{Phase, Severity, TransitionCandidate, VetoBit};
use serde::{Deserialize, Serialize};

use crate::error::StageError;
use crate::outcome::StageOutcome;
use crate::run::PipelineRun;

/// One named stage of the pipeline.
///
/// Stages run strictly in order. A stage that owns a veto bit (`gate`) has
/// that bit set to `Pass` or `Veto` by the executor according to its outcome.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// The single authority accountable for this stage.
    fn owner(&self) -> &str;

    fn phase(&self) -> Phase;

    fn severity(&self) -> Severity;

    fn gate(&self) -> Option<VetoBit> {
        None
    }

    /// Per-stage deadline; the pipeline default applies when `None`.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn evaluate(&self, run: &PipelineRun) -> Result<StageOutcome, StageError>;
}

/// Decision returned by a policy oracle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum PolicyDecision {
    Permit,
    Deny(String),
}

/// Evaluates a candidate against governance policy.
#[async_trait]
pub trait PolicyOracle: Send + Sync {
    async fn evaluate(&self, candidate: &TransitionCandidate) -> Result<PolicyDecision, StageError>;
}

/// Certified and baseline utility for a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct UtilityEstimate {
    pub certified: f64,
    pub baseline: f64,
}

/// Opaque numeric models scoring a candidate.
#[async_trait]
pub trait MetricSource: Send + Sync {
    async fn risk(&self, candidate: &TransitionCandidate) -> Result<f64, StageError>;

    async fn anomaly(&self, candidate: &TransitionCandidate) -> Result<f64, StageError>;

    async fn utility(&self, candidate: &TransitionCandidate) -> Result<UtilityEstimate, StageError>;
}

/// Result of attesting the execution context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub verified: bool,
    pub detail: String,
}

/// Attests that the execution context is the one the candidate was proposed in.
#[async_trait]
pub trait ContextAttestor: Send + Sync {
    async fn attest(&self, candidate: &TransitionCandidate) -> Result<Attestation, StageError>;
}
