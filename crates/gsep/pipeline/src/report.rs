use std::fmt;

use gsep_ledger::{LedgerAck, LedgerEntry};
use gsep_types::TransitionHash;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::finality::FinalityResult;
use crate::outcome::StageRecord;
use crate::run::{PipelineRun, SignalTable};
use crate::veto::StageVeto;

/// Machine-readable outcome of a pipeline run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineCode {
    /// Finality passed and the entry was recorded.
    Certified,
    StageVeto,
    /// Finality evaluated to FAIL; the entry is recorded when utility was set.
    FinalityFailed,
    /// The transition hash is already in the ledger.
    Duplicate,
    IntakeHalted,
    LedgerUnavailable,
}

impl PipelineCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineCode::Certified => "CERTIFIED",
            PipelineCode::StageVeto => "STAGE_VETO",
            PipelineCode::FinalityFailed => "FINALITY_FAILED",
            PipelineCode::Duplicate => "DUPLICATE",
            PipelineCode::IntakeHalted => "INTAKE_HALTED",
            PipelineCode::LedgerUnavailable => "LEDGER_UNAVAILABLE",
        }
    }
}

impl fmt::Display for PipelineCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a caller learns from one run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub transition_hash: TransitionHash,
    pub pass: bool,
    pub code: PipelineCode,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub veto: Option<StageVeto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finality: Option<FinalityResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ledger_entry: Option<LedgerEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<LedgerAck>,
    pub signals: SignalTable,
    pub trail: Vec<StageRecord>,
}

impl PipelineReport {
    pub(crate) fn new(run: PipelineRun, code: PipelineCode, reason: impl Into<String>) -> Self {
        Self {
            run_id: run.run_id,
            transition_hash: run.transition_hash,
            pass: code == PipelineCode::Certified,
            code,
            reason: reason.into(),
            veto: None,
            finality: None,
            ledger_entry: None,
            ack: None,
            signals: run.signals,
            trail: run.trail,
        }
    }

    pub(crate) fn with_veto(mut self, veto: StageVeto) -> Self {
        self.veto = Some(veto);
        self
    }

    pub(crate) fn with_finality(mut self, finality: FinalityResult) -> Self {
        self.finality = Some(finality);
        self
    }

    pub(crate) fn with_ledger(mut self, entry: LedgerEntry, ack: LedgerAck) -> Self {
        self.ledger_entry = Some(entry);
        self.ack = Some(ack);
        self
    }
}
