use chrono::{DateTime, Utc};
use gsep_types::TransitionHash;
use serde::{Deserialize, Serialize};

/// Outcome of one fully evaluated transition, as handed to the ledger.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub transition_hash: TransitionHash,
    #[serde(rename = "S01")]
    pub s01: f64,
    #[serde(rename = "S02")]
    pub s02: f64,
    pub epsilon: f64,
    pub pass: bool,
    pub timestamp: DateTime<Utc>,
    pub certifying_module: String,
}

/// A committed entry with its chain position and seal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LedgerRecord {
    pub sequence: u64,
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub previous_hash: Option<String>,
    pub record_hash: String,
    pub seal: String,
    pub sealer_id: String,
}

impl LedgerRecord {
    pub fn transition_hash(&self) -> TransitionHash {
        self.entry.transition_hash
    }
}

/// Acknowledgement returned by a successful append.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerAck {
    pub sequence: u64,
    pub transition_hash: TransitionHash,
    pub record_hash: String,
}
