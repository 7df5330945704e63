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

/// Gating: vetoes anomalous behavior above `max_anomaly`. Owns `behavior_veto`.
pub struct BehaviorGateStage {
    metrics: Arc<dyn MetricSource>,
    max_anomaly: f64,
    profile: StageProfile,
}

impl BehaviorGateStage {
    pub fn new(metrics: Arc<dyn MetricSource>, max_anomaly: f64) -> Self {
        Self {
            metrics,
            max_anomaly,
            profile: StageProfile::new("behavior-gate", "behavior-authority", Severity::Critical),
        }
    }

    pub fn with_profile(mut self, profile: StageProfile) -> Self {
        self.profile = profile;
        self
    }
}

#[async_trait]
impl Stage for BehaviorGateStage {
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
        Some(VetoBit::Behavior)
    }

    fn timeout(&self) -> Option<Duration> {
        self.profile.timeout()
    }

    async fn evaluate(&self, run: &PipelineRun) -> Result<StageOutcome, StageError> {
        let anomaly = finite("anomaly", self.metrics.anomaly(&run.candidate).await?)?;
        debug!(run_id = %run.run_id, anomaly, max = self.max_anomaly, "behavior scored");
        if anomaly > self.max_anomaly {
            Ok(StageOutcome::veto(format!(
                "anomaly {anomaly} exceeds maximum {}",
                self.max_anomaly
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
    async fn low_anomaly_passes() {
        let stage = BehaviorGateStage::new(Arc::new(MockMetricSource::healthy()), 0.5);
        assert!(stage.evaluate(&run()).await.unwrap().is_pass());
    }

    #[tokio::test]
    async fn high_anomaly_vetoes() {
        let metrics = MockMetricSource::healthy().with_anomaly(0.95);
        let stage = BehaviorGateStage::new(Arc::new(metrics), 0.5);
        let outcome = stage.evaluate(&run()).await.unwrap();
        assert_eq!(outcome, StageOutcome::veto("anomaly 0.95 exceeds maximum 0.5"));
    }
}
