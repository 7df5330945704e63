use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gsep_types::{Phase, Severity};
use tracing::debug;

use crate::error::StageError;
use crate::outcome::{Contribution, StageOutcome};
use crate::run::PipelineRun;
use crate::stages::{finite, StageProfile};
use crate::traits::{MetricSource, Stage};

/// Audit: contributes certified (`S01`) and baseline (`S02`) utility.
pub struct UtilityAuditStage {
    metrics: Arc<dyn MetricSource>,
    profile: StageProfile,
}

impl UtilityAuditStage {
    pub fn new(metrics: Arc<dyn MetricSource>) -> Self {
        Self {
            metrics,
            profile: StageProfile::new("utility-audit", "utility-auditor", Severity::Standard),
        }
    }

    pub fn with_profile(mut self, profile: StageProfile) -> Self {
        self.profile = profile;
        self
    }
}

#[async_trait]
impl Stage for UtilityAuditStage {
    fn name(&self) -> &str {
        &self.profile.name
    }

    fn owner(&self) -> &str {
        &self.profile.owner
    }

    fn phase(&self) -> Phase {
        Phase::Audit
    }

    fn severity(&self) -> Severity {
        self.profile.severity
    }

    fn timeout(&self) -> Option<Duration> {
        self.profile.timeout()
    }

    async fn evaluate(&self, run: &PipelineRun) -> Result<StageOutcome, StageError> {
        let estimate = self.metrics.utility(&run.candidate).await?;
        let certified = finite("S01", estimate.certified)?;
        let baseline = finite("S02", estimate.baseline)?;
        debug!(run_id = %run.run_id, s01 = certified, s02 = baseline, "utility audited");
        Ok(StageOutcome::pass_with(Contribution::both(certified, baseline)))
    }
}
