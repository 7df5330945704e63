//! In-process collaborators and stages for tests and local wiring.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use gsep_types::{Phase, Severity, TransitionCandidate, VetoBit};

use crate::error::StageError;
use crate::outcome::{Contribution, StageOutcome};
use crate::run::PipelineRun;
use crate::traits::{
    Attestation, ContextAttestor, MetricSource, PolicyDecision, PolicyOracle, Stage,
    UtilityEstimate,
};

/// Policy oracle with a fixed answer.
#[derive(Clone, Debug)]
pub struct MockPolicyOracle {
    answer: Result<PolicyDecision, StageError>,
}

impl MockPolicyOracle {
    pub fn permit_all() -> Self {
        Self {
            answer: Ok(PolicyDecision::Permit),
        }
    }

    pub fn deny_all(reason: impl Into<String>) -> Self {
        Self {
            answer: Ok(PolicyDecision::Deny(reason.into())),
        }
    }

    /// An oracle that cannot be reached.
    pub fn unavailable() -> Self {
        Self {
            answer: Err(StageError::unavailable("policy-oracle", "unreachable")),
        }
    }
}

#[async_trait]
impl PolicyOracle for MockPolicyOracle {
    async fn evaluate(&self, _candidate: &TransitionCandidate) -> Result<PolicyDecision, StageError> {
        self.answer.clone()
    }
}

/// Metric source returning configured scores.
#[derive(Clone, Debug)]
pub struct MockMetricSource {
    risk: f64,
    anomaly: f64,
    utility: UtilityEstimate,
    delay: Option<Duration>,
    failure: Option<StageError>,
}

impl MockMetricSource {
    /// Low risk, low anomaly, certified utility 0.8 over a 0.7 baseline.
    pub fn healthy() -> Self {
        Self {
            risk: 0.1,
            anomaly: 0.1,
            utility: UtilityEstimate {
                certified: 0.8,
                baseline: 0.7,
            },
            delay: None,
            failure: None,
        }
    }

    /// Every call fails with the given error.
    pub fn failing(error: StageError) -> Self {
        Self {
            failure: Some(error),
            ..Self::healthy()
        }
    }

    pub fn with_risk(mut self, risk: f64) -> Self {
        self.risk = risk;
        self
    }

    pub fn with_anomaly(mut self, anomaly: f64) -> Self {
        self.anomaly = anomaly;
        self
    }

    pub fn with_utility(mut self, certified: f64, baseline: f64) -> Self {
        self.utility = UtilityEstimate {
            certified,
            baseline,
        };
        self
    }

    /// Sleep before every answer.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    async fn answer<T>(&self, value: T) -> Result<T, StageError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(value),
        }
    }
}

#[async_trait]
impl MetricSource for MockMetricSource {
    async fn risk(&self, _candidate: &TransitionCandidate) -> Result<f64, StageError> {
        self.answer(self.risk).await
    }

    async fn anomaly(&self, _candidate: &TransitionCandidate) -> Result<f64, StageError> {
        self.answer(self.anomaly).await
    }

    async fn utility(&self, _candidate: &TransitionCandidate) -> Result<UtilityEstimate, StageError> {
        self.answer(self.utility).await
    }
}

/// Context attestor with a fixed verdict.
#[derive(Clone, Debug)]
pub struct MockContextAttestor {
    attestation: Attestation,
}

impl MockContextAttestor {
    pub fn verified() -> Self {
        Self {
            attestation: Attestation {
                verified: true,
                detail: "mock anchor".into(),
            },
        }
    }

    pub fn unverified(detail: impl Into<String>) -> Self {
        Self {
            attestation: Attestation {
                verified: false,
                detail: detail.into(),
            },
        }
    }
}

#[async_trait]
impl ContextAttestor for MockContextAttestor {
    async fn attest(&self, _candidate: &TransitionCandidate) -> Result<Attestation, StageError> {
        Ok(self.attestation.clone())
    }
}

/// A stage whose outcome is fixed up front.
///
/// Defaults to STANDARD severity, owner `"scripted"`, no gate and no
/// contribution.
#[derive(Debug)]
pub struct ScriptedStage {
    name: String,
    owner: String,
    phase: Phase,
    severity: Severity,
    gate: Option<VetoBit>,
    timeout: Option<Duration>,
    delay: Option<Duration>,
    result: Result<StageOutcome, StageError>,
    calls: AtomicUsize,
}

impl ScriptedStage {
    fn scripted(name: &str, phase: Phase, result: Result<StageOutcome, StageError>) -> Self {
        Self {
            name: name.to_string(),
            owner: "scripted".to_string(),
            phase,
            severity: Severity::Standard,
            gate: None,
            timeout: None,
            delay: None,
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn passing(name: &str, phase: Phase) -> Self {
        Self::scripted(name, phase, Ok(StageOutcome::pass()))
    }

    pub fn vetoing(name: &str, phase: Phase, reason: impl Into<String>) -> Self {
        Self::scripted(name, phase, Ok(StageOutcome::veto(reason)))
    }

    pub fn failing(name: &str, phase: Phase, error: StageError) -> Self {
        Self::scripted(name, phase, Err(error))
    }

    pub fn with_gate(mut self, bit: VetoBit) -> Self {
        self.gate = Some(bit);
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    /// Pass with the given contribution.
    pub fn contributing(mut self, contribution: Contribution) -> Self {
        self.result = Ok(StageOutcome::pass_with(contribution));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// How many times the stage has been evaluated.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for ScriptedStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn owner(&self) -> &str {
        &self.owner
    }

    fn phase(&self) -> Phase {
        self.phase
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn gate(&self) -> Option<VetoBit> {
        self.gate
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn evaluate(&self, _run: &PipelineRun) -> Result<StageOutcome, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}
