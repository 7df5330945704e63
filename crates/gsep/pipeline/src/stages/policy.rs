use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gsep_types::{Phase, Severity, VetoBit};
use tracing::debug;

use crate::error::StageError;
use crate::outcome::StageOutcome;
use crate::run::PipelineRun;
use crate::stages::StageProfile;
use crate::traits::{PolicyDecision, PolicyOracle, Stage};

/// Gating: governance policy applied to the candidate. Owns `policy_veto`.
pub struct PolicyGateStage {
    oracle: Arc<dyn PolicyOracle>,
    profile: StageProfile,
}

impl PolicyGateStage {
    pub fn new(oracle: Arc<dyn PolicyOracle>) -> Self {
        Self {
            oracle,
            profile: StageProfile::new("policy-gate", "policy-authority", Severity::Critical),
        }
    }

    pub fn with_profile(mut self, profile: StageProfile) -> Self {
        self.profile = profile;
        self
    }
}

#[async_trait]
impl Stage for PolicyGateStage {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn owner(&self) -> &str {
        &self.profile.owner
    }

    fn phase(&self) -> Phase {
        Phase::Gating
    }

    fn severity(&self) -> Severity {
        self.profile.severity
    }

    fn gate(&self) -> Option<VetoBit> {
        Some(VetoBit::Policy)
    }

    fn timeout(&self) -> Option<Duration> {
        self.profile.timeout()
    }

    async fn evaluate(&self, run: &PipelineRun) -> Result<StageOutcome, StageError> {
        let decision = self.oracle.evaluate(&run.candidate).await?;
        debug!(run_id = %run.run_id, ?decision, "policy evaluated");
        Ok(match decision {
            PolicyDecision::Permit => StageOutcome::pass(),
            PolicyDecision::Deny(reason) => StageOutcome::veto(format!("policy denied: {reason}")),
        })
    }
}
