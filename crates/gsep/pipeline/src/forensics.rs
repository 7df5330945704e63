//! Forensic capture of failed runs.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use gsep_types::{canonical_json, TransitionCandidate, TransitionHash};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ForensicError;
use crate::outcome::StageRecord;
use crate::run::{PipelineRun, SignalTable};
use crate::veto::StageVeto;

/// Snapshot of a run at the moment a CRITICAL or TERMINAL stage failed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForensicCapture {
    pub capture_id: Uuid,
    pub run_id: Uuid,
    pub transition_hash: TransitionHash,
    pub veto: StageVeto,
    pub candidate: TransitionCandidate,
    pub signals: SignalTable,
    #[serde(rename = "S01")]
    pub s01: Option<f64>,
    #[serde(rename = "S02")]
    pub s02: Option<f64>,
    pub trail: Vec<StageRecord>,
    pub captured_at: DateTime<Utc>,
    /// BLAKE3 over the canonical form of everything above except the ids
    /// and capture time.
    pub artifact_hash: String,
}

impl ForensicCapture {
    pub fn from_run(run: &PipelineRun, veto: &StageVeto) -> Result<Self, ForensicError> {
        let mut capture = Self {
            capture_id: Uuid::new_v4(),
            run_id: run.run_id,
            transition_hash: run.transition_hash,
            veto: veto.clone(),
            candidate: run.candidate.clone(),
            signals: run.signals,
            s01: run.s01,
            s02: run.s02,
            trail: run.trail.clone(),
            captured_at: Utc::now(),
            artifact_hash: String::new(),
        };
        capture.artifact_hash = capture.compute_artifact_hash()?;
        Ok(capture)
    }

    /// Whether the artifact hash still matches the captured content.
    pub fn verify_artifact(&self) -> bool {
        self.compute_artifact_hash()
            .is_ok_and(|hash| hash == self.artifact_hash)
    }

    fn compute_artifact_hash(&self) -> Result<String, ForensicError> {
        let artifact = serde_json::json!({
            "transition_hash": self.transition_hash,
            "veto": self.veto,
            "candidate": self.candidate,
            "signals": self.signals,
            "S01": self.s01,
            "S02": self.s02,
            "trail": self.trail,
        });
        Ok(blake3::hash(canonical_json(&artifact).as_bytes())
            .to_hex()
            .to_string())
    }
}

/// Receives forensic captures for offline analysis.
pub trait ForensicSink: Send + Sync {
    fn capture(&self, capture: ForensicCapture) -> Result<(), ForensicError>;
}

/// Keeps captures in memory, in arrival order.
#[derive(Debug, Default)]
pub struct InMemoryForensicLog {
    captures: Mutex<Vec<ForensicCapture>>,
}

impl InMemoryForensicLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn captures(&self) -> Result<Vec<ForensicCapture>, ForensicError> {
        self.captures
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| ForensicError::Backend("forensic log lock poisoned".to_string()))
    }

    pub fn len(&self) -> usize {
        self.captures.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ForensicSink for InMemoryForensicLog {
    fn capture(&self, capture: ForensicCapture) -> Result<(), ForensicError> {
        self.captures
            .lock()
            .map_err(|_| ForensicError::Backend("forensic log lock poisoned".to_string()))?
            .push(capture);
        Ok(())
    }
}
