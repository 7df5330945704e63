//! Escalation to the correction workflow and intake halting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gsep_types::{Severity, TransitionHash};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::EscalationError;
use crate::veto::StageVeto;

/// Notice sent to the correction workflow for CRITICAL and TERMINAL failures.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub run_id: Uuid,
    pub transition_hash: TransitionHash,
    pub severity: Severity,
    pub veto: StageVeto,
    /// Forensic capture written for this failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capture_id: Option<Uuid>,
    pub raised_at: DateTime<Utc>,
}

#[async_trait]
pub trait EscalationChannel: Send + Sync {
    async fn escalate(&self, escalation: Escalation) -> Result<(), EscalationError>;
}

/// Writes escalations to the log and nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingEscalation;

#[async_trait]
impl EscalationChannel for TracingEscalation {
    async fn escalate(&self, escalation: Escalation) -> Result<(), EscalationError> {
        error!(
            run_id = %escalation.run_id,
            transition = %escalation.transition_hash.short(),
            severity = %escalation.severity,
            stage = %escalation.veto.stage,
            owner = %escalation.veto.owner,
            cause = %escalation.veto.cause,
            "escalated to correction workflow"
        );
        Ok(())
    }
}

/// Forwards escalations to a bounded tokio channel.
#[derive(Clone, Debug)]
pub struct ChannelEscalation {
    tx: mpsc::Sender<Escalation>,
}

impl ChannelEscalation {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Escalation>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl EscalationChannel for ChannelEscalation {
    async fn escalate(&self, escalation: Escalation) -> Result<(), EscalationError> {
        self.tx
            .send(escalation)
            .await
            .map_err(|_| EscalationError::Closed)
    }
}

/// Why intake was halted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HaltRecord {
    pub run_id: Uuid,
    pub transition_hash: TransitionHash,
    pub stage: String,
    pub reason: String,
    pub halted_at: DateTime<Utc>,
}

/// Latching intake switch tripped by TERMINAL failures.
///
/// Once tripped it stays tripped until an operator calls [`HaltSwitch::resume`].
#[derive(Debug, Default)]
pub struct HaltSwitch {
    halted: AtomicBool,
    record: Mutex<Option<HaltRecord>>,
}

impl HaltSwitch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the switch. The first record wins while latched.
    pub fn trip(&self, record: HaltRecord) {
        if let Ok(mut slot) = self.record.lock() {
            if slot.is_none() {
                *slot = Some(record.clone());
            }
        }
        if !self.halted.swap(true, Ordering::SeqCst) {
            error!(
                run_id = %record.run_id,
                stage = %record.stage,
                reason = %record.reason,
                "pipeline intake halted"
            );
        }
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn record(&self) -> Option<HaltRecord> {
        self.record.lock().ok().and_then(|slot| slot.clone())
    }

    /// Clear the halt and return what caused it.
    pub fn resume(&self) -> Option<HaltRecord> {
        let previous = match self.record.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => {
                warn!("halt record lock poisoned; resuming without record");
                None
            }
        };
        if self.halted.swap(false, Ordering::SeqCst) {
            info!(
                stage = previous.as_ref().map(|r| r.stage.as_str()).unwrap_or("unknown"),
                "pipeline intake resumed"
            );
        }
        previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::veto::VetoCause;
    use gsep_types::Phase;

    fn record(stage: &str) -> HaltRecord {
        HaltRecord {
            run_id: Uuid::new_v4(),
            transition_hash: TransitionHash::digest("test", stage.as_bytes()),
            stage: stage.into(),
            reason: "finality failed".into(),
            halted_at: Utc::now(),
        }
    }

    #[test]
    fn halt_latches_first_record() {
        let halt = HaltSwitch::new();
        assert!(!halt.is_halted());

        halt.trip(record("finality"));
        halt.trip(record("behavior-gate"));
        assert!(halt.is_halted());
        assert_eq!(halt.record().unwrap().stage, "finality");

        let cleared = halt.resume().unwrap();
        assert_eq!(cleared.stage, "finality");
        assert!(!halt.is_halted());
        assert!(halt.record().is_none());
    }

    #[test]
    fn resume_when_running_is_a_no_op() {
        let halt = HaltSwitch::new();
        assert!(halt.resume().is_none());
        assert!(!halt.is_halted());
    }

    #[tokio::test]
    async fn channel_escalation_delivers() {
        let (channel, mut rx) = ChannelEscalation::new(4);
        let escalation = Escalation {
            run_id: Uuid::new_v4(),
            transition_hash: TransitionHash::digest("test", b"x"),
            severity: Severity::Critical,
            veto: StageVeto {
                stage: "policy-gate".into(),
                owner: "policy-authority".into(),
                phase: Phase::Gating,
                severity: Severity::Critical,
                gate: None,
                cause: VetoCause::Failed {
                    error: "oracle down".into(),
                },
            },
            capture_id: None,
            raised_at: Utc::now(),
        };
        channel.escalate(escalation.clone()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), escalation);
    }

    #[tokio::test]
    async fn closed_channel_reports_error() {
        let (channel, rx) = ChannelEscalation::new(1);
        drop(rx);
        let escalation = Escalation {
            run_id: Uuid::new_v4(),
            transition_hash: TransitionHash::digest("test", b"x"),
            severity: Severity::Terminal,
            veto: StageVeto {
                stage: "finality".into(),
                owner: "gsep-finality".into(),
                phase: Phase::Finality,
                severity: Severity::Terminal,
                gate: None,
                cause: VetoCause::Rejected {
                    reason: "behavior veto".into(),
                },
            },
            capture_id: None,
            raised_at: Utc::now(),
        };
        assert_eq!(
            channel.escalate(escalation).await.unwrap_err(),
            EscalationError::Closed
        );
    }
}
