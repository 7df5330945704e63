use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gsep_types::{Phase, Severity, VetoBit};
use tracing::debug;

use crate::error::StageError;
use crate::outcome::StageOutcome;
use crate::run::PipelineRun;
use crate::stages::StageProfile;
use crate::traits::{ContextAttestor, Stage};

/// Anchoring: the execution context must be attested before any gate runs.
///
/// Owns `context_pass`.
pub struct ContextAttestationStage {
    attestor: Arc<dyn ContextAttestor>,
    profile: StageProfile,
}

impl ContextAttestationStage {
    pub fn new(attestor: Arc<dyn ContextAttestor>) -> Self {
        Self {
            attestor,
            profile: StageProfile::new("context-attestation", "root-of-trust", Severity::Critical),
        }
    }

    pub fn with_profile(mut self, profile: StageProfile) -> Self {
        self.profile = profile;
        self
    }
}

#[async_trait]
impl Stage for ContextAttestationStage {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn owner(&self) -> &str {
        &self.profile.owner
    }

    fn phase(&self) -> Phase {
        Phase::Anchoring
    }

    fn severity(&self) -> Severity {
        self.profile.severity
    }

    fn gate(&self) -> Option<VetoBit> {
        Some(VetoBit::Context)
    }

    fn timeout(&self) -> Option<Duration> {
        self.profile.timeout()
    }

    async fn evaluate(&self, run: &PipelineRun) -> Result<StageOutcome, StageError> {
        let attestation = self.attestor.attest(&run.candidate).await?;
        debug!(
            run_id = %run.run_id,
            verified = attestation.verified,
            "context attested"
        );
        if attestation.verified {
            Ok(StageOutcome::pass())
        } else {
            Ok(StageOutcome::veto(format!(
                "context attestation failed: {}",
                attestation.detail
            )))
        }
    }
}
