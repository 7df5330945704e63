use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use gsep_ledger::AuditLedger;
use gsep_types::{ConfigError, Phase, VetoBit};
use tracing::debug;

use crate::config::PipelineConfig;
use crate::escalation::{EscalationChannel, HaltSwitch, TracingEscalation};
use crate::executor::{PipelineExecutor, FINALITY_STAGE};
use crate::forensics::{ForensicSink, InMemoryForensicLog};
use crate::stages::{
    BehaviorGateStage, ContextAttestationStage, PolicyGateStage, StabilityGateStage,
    UtilityAuditStage,
};
use crate::traits::{ContextAttestor, MetricSource, PolicyOracle, Stage};

/// External collaborators backing the built-in stages.
#[derive(Clone)]
pub struct Collaborators {
    pub policy: Arc<dyn PolicyOracle>,
    pub metrics: Arc<dyn MetricSource>,
    pub attestor: Arc<dyn ContextAttestor>,
}

/// Assembles and validates a [`PipelineExecutor`].
pub struct PipelineBuilder {
    config: PipelineConfig,
    ledger: Arc<AuditLedger>,
    stages: Vec<Arc<dyn Stage>>,
    forensics: Option<Arc<dyn ForensicSink>>,
    escalation: Option<Arc<dyn EscalationChannel>>,
    halt: Option<Arc<HaltSwitch>>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig, ledger: Arc<AuditLedger>) -> Self {
        Self {
            config,
            ledger,
            stages: Vec::new(),
            forensics: None,
            escalation: None,
            halt: None,
        }
    }

    /// Append a stage. Order of calls is execution order.
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Append the five built-in stages:
    /// context attestation, policy, stability, behavior, utility audit.
    pub fn with_standard_stages(self, collaborators: &Collaborators) -> Self {
        let max_risk = self.config.max_risk;
        let max_anomaly = self.config.max_anomaly;
        self.stage(Arc::new(ContextAttestationStage::new(
            collaborators.attestor.clone(),
        )))
        .stage(Arc::new(PolicyGateStage::new(collaborators.policy.clone())))
        .stage(Arc::new(StabilityGateStage::new(
            collaborators.metrics.clone(),
            max_risk,
        )))
        .stage(Arc::new(BehaviorGateStage::new(
            collaborators.metrics.clone(),
            max_anomaly,
        )))
        .stage(Arc::new(UtilityAuditStage::new(
            collaborators.metrics.clone(),
        )))
    }

    pub fn forensics(mut self, sink: Arc<dyn ForensicSink>) -> Self {
        self.forensics = Some(sink);
        self
    }

    pub fn escalation(mut self, channel: Arc<dyn EscalationChannel>) -> Self {
        self.escalation = Some(channel);
        self
    }

    pub fn halt_switch(mut self, halt: Arc<HaltSwitch>) -> Self {
        self.halt = Some(halt);
        self
    }

    /// Validate the stage list and produce the executor.
    ///
    /// Fails unless stage names are unique, phases never go backwards, no
    /// stage claims the finality phase and every veto bit has exactly one
    /// owning stage.
    pub fn build(self) -> Result<PipelineExecutor, ConfigError> {
        self.config.validate()?;
        let margin = self.config.margin()?;
        validate_stages(&self.stages)?;

        debug!(
            stages = self.stages.len(),
            epsilon = margin.value(),
            "pipeline built"
        );

        Ok(PipelineExecutor {
            stages: self.stages,
            margin,
            default_timeout: self.config.stage_timeout(),
            certifying_module: self.config.certifying_module,
            ledger: self.ledger,
            forensics: self
                .forensics
                .unwrap_or_else(|| Arc::new(InMemoryForensicLog::new())),
            escalation: self
                .escalation
                .unwrap_or_else(|| Arc::new(TracingEscalation)),
            halt: self.halt.unwrap_or_default(),
        })
    }
}

fn validate_stages(stages: &[Arc<dyn Stage>]) -> Result<(), ConfigError> {
    if stages.is_empty() {
        return Err(ConfigError::Pipeline("no stages configured".into()));
    }

    let mut names: HashSet<&str> = HashSet::new();
    let mut owners: HashMap<VetoBit, &str> = HashMap::new();
    let mut previous = Phase::Anchoring;

    for stage in stages {
        let name = stage.name();
        if name.trim().is_empty() {
            return Err(ConfigError::Pipeline("stage name must not be empty".into()));
        }
        if name == FINALITY_STAGE {
            return Err(ConfigError::Pipeline(format!(
                "stage name {FINALITY_STAGE} is reserved"
            )));
        }
        if !names.insert(name) {
            return Err(ConfigError::Pipeline(format!("duplicate stage name {name}")));
        }
        if stage.owner().trim().is_empty() {
            return Err(ConfigError::Pipeline(format!("stage {name} has no owner")));
        }
        if stage.phase() == Phase::Finality {
            return Err(ConfigError::Pipeline(format!(
                "stage {name} cannot run in the finality phase"
            )));
        }
        if stage.phase() < previous {
            return Err(ConfigError::Pipeline(format!(
                "stage {name} ({}) runs after a {previous} stage",
                stage.phase()
            )));
        }
        previous = stage.phase();

        if stage.timeout() == Some(Duration::ZERO) {
            return Err(ConfigError::Pipeline(format!(
                "stage {name} has a zero timeout"
            )));
        }
        if let Some(bit) = stage.gate() {
            if let Some(other) = owners.insert(bit, name) {
                return Err(ConfigError::Pipeline(format!(
                    "{bit} is owned by both {other} and {name}"
                )));
            }
        }
    }

    for bit in VetoBit::ALL {
        if !owners.contains_key(&bit) {
            return Err(ConfigError::Pipeline(format!("no stage owns {bit}")));
        }
    }
    Ok(())
}
