use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use gsep_types::{Phase, Severity, VetoBit};
use tracing::debug;

use crate::error::StageError;
use crate::outcome::StageOutcome;
use crate::run::PipelineRun;
use crate::stages::{finite, StageProfile};
use crate::traits::{MetricSource, Stage};

/// Gating: vetoes when the risk score exceeds `max_risk`. Owns `stability_veto`.
pub struct StabilityGateStage {
    metrics: Arc<dyn MetricSource>,
    max_risk: f64,
    profile: StageProfile,
}

impl StabilityGateStage {
    pub fn new(metrics: Arc<dyn MetricSource>, max_risk: f64) -> Self {
        Self {
            metrics,
            max_risk,
            profile: StageProfile::new("stability-gate", "stability-authority", Severity::Critical),
        }
    }

    pub fn with_profile(mut self, profile: StageProfile) -> Self {
        self.profile = profile;
        self
    }
}

#[async_trait]
impl Stage for StabilityGateStage {
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
        Some(VetoBit::Stability)
    }

    fn timeout(&self) -> Option<Duration> {
        self.profile.timeout()
    }

    async fn evaluate(&self, run: &PipelineRun) -> Result<StageOutcome, StageError> {
        let risk = finite("risk", self.metrics.risk(&run.candidate).await?)?;
        debug!(run_id = %run.run_id, risk, max = self.max_risk, "risk scored");
        if risk > self.max_risk {
            Ok(StageOutcome::veto(format!(
                "risk {risk} exceeds maximum {}",
                self.max_risk
            )))
        } else {
            Ok(StageOutcome::pass())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finality::Margin;
    use crate::mocks::MockMetricSource;
    use gsep_types::{TransitionCandidate, TransitionRequest};

    fn run() -> PipelineRun {
        PipelineRun::new(
            TransitionCandidate::new(TransitionRequest::transition("A", "B", "x")),
            Margin::new(0.05).unwrap(),
        )
    }

    #[tokio::test]
    async fn risk_at_limit_passes() {
        let metrics = MockMetricSource::healthy().with_risk(0.5);
        let stage = StabilityGateStage::new(Arc::new(metrics), 0.5);
        assert!(stage.evaluate(&run()).await.unwrap().is_pass());
    }

    #[tokio::test]
    async fn risk_over_limit_vetoes() {
        let metrics = MockMetricSource::healthy().with_risk(0.9);
        let stage = StabilityGateStage::new(Arc::new(metrics), 0.5);
        assert!(!stage.evaluate(&run()).await.unwrap().is_pass());
    }

    #[tokio::test]
    async fn nan_risk_is_an_error() {
        let metrics = MockMetricSource::healthy().with_risk(f64::NAN);
        let stage = StabilityGateStage::new(Arc::new(metrics), 0.5);
        assert!(matches!(
            stage.evaluate(&run()).await,
            Err(StageError::InvalidMetric { .. })
        ));
    }
}
