use std::fs;
use std::sync::Arc;

use gsep_ledger::{AuditLedger, JsonLinesSink, KeyedSealer, RecordSealer};
use gsep_pipeline::{
    Collaborators, HaltRecord, HaltSwitch, PipelineBuilder, PipelineExecutor, PipelineReport,
};
use gsep_protocol::{AuthorizationModel, ProtocolSpec, TransitionValidator};
use gsep_types::{ConfigError, TransitionCandidate, TransitionRequest, Verdict};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{EngineConfig, LedgerConfig};
use crate::error::EngineResult;

/// Outcome of submitting a candidate.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Submission {
    /// Refused by the transition validator; the pipeline never ran.
    Rejected { verdict: Verdict },
    /// Admitted by the validator and evaluated by the pipeline.
    Evaluated {
        verdict: Verdict,
        report: Box<PipelineReport>,
    },
}

impl Submission {
    /// Whether the transition was certified.
    pub fn is_certified(&self) -> bool {
        match self {
            Submission::Rejected { .. } => false,
            Submission::Evaluated { report, .. } => report.pass,
        }
    }

    pub fn verdict(&self) -> &Verdict {
        match self {
            Submission::Rejected { verdict } | Submission::Evaluated { verdict, .. } => verdict,
        }
    }

    pub fn report(&self) -> Option<&PipelineReport> {
        match self {
            Submission::Rejected { .. } => None,
            Submission::Evaluated { report, .. } => Some(report),
        }
    }
}

/// The governed state transition engine: validator in front of the pipeline.
#[derive(Debug)]
pub struct GovernedEngine {
    validator: TransitionValidator,
    executor: PipelineExecutor,
}

impl GovernedEngine {
    /// Pair a validator with an executor.
    ///
    /// Fails if an exempt transition is not a declared protocol edge.
    pub fn new(validator: TransitionValidator, executor: PipelineExecutor) -> Result<Self, ConfigError> {
        validator
            .authorization()
            .ensure_edges_declared(validator.spec())?;
        Ok(Self {
            validator,
            executor,
        })
    }

    /// Build the engine from configuration with the built-in stages.
    ///
    /// Reads the protocol file and, when a journal is configured, replays
    /// and verifies it before accepting new appends.
    pub fn from_config(config: &EngineConfig, collaborators: &Collaborators) -> EngineResult<Self> {
        config.validate()?;

        let text = fs::read_to_string(&config.protocol_path).map_err(|e| {
            ConfigError::Io(format!("{}: {e}", config.protocol_path.display()))
        })?;
        let spec = ProtocolSpec::from_json_str(&text)?;
        let auth = AuthorizationModel::from_config(&config.authorization)?;
        let validator = TransitionValidator::new(Arc::new(spec), Arc::new(auth));

        let ledger = open_ledger(&config.ledger)?;
        let executor = PipelineBuilder::new(config.pipeline.clone(), Arc::new(ledger))
            .with_standard_stages(collaborators)
            .build()?;

        let engine = Self::new(validator, executor)?;
        info!(
            states = engine.validator.spec().len(),
            threshold = engine.validator.authorization().threshold(),
            recorded = engine.ledger().len(),
            "governed engine ready"
        );
        Ok(engine)
    }

    /// Structural validation only.
    pub fn validate(&self, request: &TransitionRequest) -> Verdict {
        self.validator.validate(request)
    }

    /// Validate a candidate and, if admitted, run it through the pipeline.
    pub async fn submit(&self, candidate: TransitionCandidate) -> Submission {
        let verdict = self.validator.validate(&candidate.request);
        if !verdict.is_valid() {
            return Submission::Rejected { verdict };
        }
        debug!(code = %verdict.code, "candidate admitted to pipeline");
        let report = self.executor.run(candidate).await;
        Submission::Evaluated {
            verdict,
            report: Box::new(report),
        }
    }

    pub fn validator(&self) -> &TransitionValidator {
        &self.validator
    }

    pub fn executor(&self) -> &PipelineExecutor {
        &self.executor
    }

    pub fn ledger(&self) -> &Arc<AuditLedger> {
        self.executor.ledger()
    }

    pub fn halt_switch(&self) -> &Arc<HaltSwitch> {
        self.executor.halt_switch()
    }

    /// Operator action: clear a TERMINAL halt.
    pub fn resume(&self) -> Option<HaltRecord> {
        self.executor.halt_switch().resume()
    }
}

fn open_ledger(config: &LedgerConfig) -> EngineResult<AuditLedger> {
    let sealer: Arc<dyn RecordSealer> = match &config.seal_key {
        Some(key) => Arc::new(KeyedSealer::new(config.sealer_id.clone(), key.as_bytes())),
        None => Arc::new(KeyedSealer::ephemeral(config.sealer_id.clone())),
    };

    match &config.journal_path {
        Some(path) => {
            let records = JsonLinesSink::load(path)?;
            let sink = JsonLinesSink::open(path)?;
            debug!(path = %path.display(), records = records.len(), "replaying ledger journal");
            Ok(AuditLedger::replay(records, sealer, Some(Arc::new(sink)))?)
        }
        None => Ok(AuditLedger::new(sealer)),
    }
}
