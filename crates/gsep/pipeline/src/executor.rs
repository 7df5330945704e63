use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gsep_ledger::{AuditLedger, LedgerEntry, LedgerError};
use gsep_types::{GateSignal, Phase, Severity, TransitionCandidate};
use tracing::{debug, error, info, warn};

use crate::escalation::{Escalation, EscalationChannel, HaltRecord, HaltSwitch};
use crate::finality::{self, FinalityResult, Margin};
use crate::forensics::{ForensicCapture, ForensicSink};
use crate::outcome::{Contribution, StageOutcome, StageRecord, StageStatus};
use crate::report::{PipelineCode, PipelineReport};
use crate::run::PipelineRun;
use crate::traits::Stage;
use crate::veto::{StageVeto, VetoCause};

/// Trail name of the finality step.
pub const FINALITY_STAGE: &str = "finality";

/// Runs candidates through the ordered stages, the finality calculus and
/// the audit ledger.
///
/// Runs are independent and may execute concurrently; the only shared
/// mutable state is the ledger and the halt switch.
pub struct PipelineExecutor {
    pub(crate) stages: Vec<Arc<dyn Stage>>,
    pub(crate) margin: Margin,
    pub(crate) default_timeout: Duration,
    pub(crate) certifying_module: String,
    pub(crate) ledger: Arc<AuditLedger>,
    pub(crate) forensics: Arc<dyn ForensicSink>,
    pub(crate) escalation: Arc<dyn EscalationChannel>,
    pub(crate) halt: Arc<HaltSwitch>,
}

impl PipelineExecutor {
    pub fn stages(&self) -> impl Iterator<Item = &Arc<dyn Stage>> {
        self.stages.iter()
    }

    pub fn margin(&self) -> Margin {
        self.margin
    }

    pub fn ledger(&self) -> &Arc<AuditLedger> {
        &self.ledger
    }

    pub fn halt_switch(&self) -> &Arc<HaltSwitch> {
        &self.halt
    }

    /// Evaluate one candidate. Never fails: every outcome is a report.
    ///
    /// Nothing is written to the ledger until finality has been evaluated,
    /// so dropping the returned future early leaves no entry.
    pub async fn run(&self, candidate: TransitionCandidate) -> PipelineReport {
        let mut run = PipelineRun::new(candidate, self.margin);
        debug!(
            run_id = %run.run_id,
            transition = %run.transition_hash.short(),
            "pipeline run started"
        );

        if self.halt.is_halted() {
            let reason = match self.halt.record() {
                Some(record) => format!(
                    "intake halted by {} failure: {}",
                    record.stage, record.reason
                ),
                None => "intake halted".to_string(),
            };
            warn!(run_id = %run.run_id, %reason, "run refused");
            return PipelineReport::new(run, PipelineCode::IntakeHalted, reason);
        }

        if self.ledger.contains(&run.transition_hash) {
            let reason = format!("transition {} is already recorded", run.transition_hash);
            debug!(run_id = %run.run_id, "duplicate candidate refused before stages");
            return PipelineReport::new(run, PipelineCode::Duplicate, reason);
        }

        for stage in &self.stages {
            if let Err(veto) = self.run_stage(stage.as_ref(), &mut run).await {
                self.handle_veto(&run, &veto).await;
                let reason = veto.to_string();
                return PipelineReport::new(run, PipelineCode::StageVeto, reason).with_veto(veto);
            }
        }

        self.finalize(run).await
    }

    async fn run_stage(&self, stage: &dyn Stage, run: &mut PipelineRun) -> Result<(), StageVeto> {
        let deadline = stage.timeout().unwrap_or(self.default_timeout);
        debug!(
            run_id = %run.run_id,
            stage = stage.name(),
            owner = stage.owner(),
            phase = %stage.phase(),
            "evaluating stage"
        );

        let started = Instant::now();
        let result = tokio::time::timeout(deadline, stage.evaluate(run)).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let (status, outcome): (StageStatus, Result<Contribution, VetoCause>) = match result {
            Ok(Ok(StageOutcome::Pass { contribution })) => (StageStatus::Pass, Ok(contribution)),
            Ok(Ok(StageOutcome::Veto { reason })) => {
                (StageStatus::Veto, Err(VetoCause::Rejected { reason }))
            }
            Ok(Err(err)) => (
                StageStatus::Failed,
                Err(VetoCause::Failed {
                    error: err.to_string(),
                }),
            ),
            Err(_) => (
                StageStatus::TimedOut,
                Err(VetoCause::TimedOut {
                    after_ms: deadline.as_millis() as u64,
                }),
            ),
        };
        let (status, outcome) = match outcome {
            Ok(contribution) => match run.check_contribution(&contribution) {
                Ok(()) => (status, Ok(contribution)),
                Err(err) => (
                    StageStatus::Failed,
                    Err(VetoCause::Failed {
                        error: err.to_string(),
                    }),
                ),
            },
            Err(cause) => (status, Err(cause)),
        };

        if let Some(bit) = stage.gate() {
            let signal = if outcome.is_ok() {
                GateSignal::Pass
            } else {
                GateSignal::Veto
            };
            run.set_signal(bit, signal);
        }

        run.record(StageRecord {
            stage: stage.name().to_string(),
            owner: stage.owner().to_string(),
            phase: stage.phase(),
            severity: stage.severity(),
            gate: stage.gate(),
            status,
            detail: outcome.as_ref().err().map(ToString::to_string),
            contribution: outcome.as_ref().copied().unwrap_or_default(),
            elapsed_ms,
        });

        match outcome {
            Ok(contribution) => {
                run.contribute(contribution);
                debug!(run_id = %run.run_id, stage = stage.name(), elapsed_ms, "stage passed");
                Ok(())
            }
            Err(cause) => Err(StageVeto {
                stage: stage.name().to_string(),
                owner: stage.owner().to_string(),
                phase: stage.phase(),
                severity: stage.severity(),
                gate: stage.gate(),
                cause,
            }),
        }
    }

    async fn finalize(&self, mut run: PipelineRun) -> PipelineReport {
        let result = finality::evaluate(&run.finality_inputs());
        run.record(StageRecord {
            stage: FINALITY_STAGE.to_string(),
            owner: self.certifying_module.clone(),
            phase: Phase::Finality,
            severity: Severity::Terminal,
            gate: None,
            status: if result.pass {
                StageStatus::Pass
            } else {
                StageStatus::Veto
            },
            detail: result.failure.as_ref().map(ToString::to_string),
            contribution: Contribution::default(),
            elapsed_ms: 0,
        });

        let (Some(s01), Some(s02)) = (run.s01, run.s02) else {
            // Without utility scores there is no entry to record.
            let veto = self.finality_veto(&result);
            self.handle_veto(&run, &veto).await;
            let reason = veto.to_string();
            return PipelineReport::new(run, PipelineCode::FinalityFailed, reason)
                .with_veto(veto)
                .with_finality(result);
        };

        let entry = LedgerEntry {
            transition_hash: run.transition_hash,
            s01,
            s02,
            epsilon: self.margin.value(),
            pass: result.pass,
            timestamp: Utc::now(),
            certifying_module: self.certifying_module.clone(),
        };

        let ack = match self.ledger.append(entry.clone()) {
            Ok(ack) => ack,
            Err(LedgerError::Duplicate(_)) => {
                debug!(run_id = %run.run_id, "candidate recorded by a concurrent run");
                let reason = format!("transition {} is already recorded", run.transition_hash);
                return PipelineReport::new(run, PipelineCode::Duplicate, reason)
                    .with_finality(result);
            }
            Err(err) => {
                error!(run_id = %run.run_id, error = %err, "ledger append failed");
                if !result.pass {
                    let veto = self.finality_veto(&result);
                    self.handle_veto(&run, &veto).await;
                }
                return PipelineReport::new(
                    run,
                    PipelineCode::LedgerUnavailable,
                    format!("ledger append failed: {err}"),
                )
                .with_finality(result);
            }
        };

        if result.pass {
            info!(
                run_id = %run.run_id,
                transition = %run.transition_hash.short(),
                sequence = ack.sequence,
                s01,
                s02,
                "transition certified"
            );
            let reason = format!(
                "certified: S01 {s01} >= S02 {s02} + epsilon {}",
                self.margin.value()
            );
            return PipelineReport::new(run, PipelineCode::Certified, reason)
                .with_finality(result)
                .with_ledger(entry, ack);
        }

        let veto = self.finality_veto(&result);
        self.handle_veto(&run, &veto).await;
        let reason = veto.to_string();
        PipelineReport::new(run, PipelineCode::FinalityFailed, reason)
            .with_veto(veto)
            .with_finality(result)
            .with_ledger(entry, ack)
    }

    fn finality_veto(&self, result: &FinalityResult) -> StageVeto {
        StageVeto {
            stage: FINALITY_STAGE.to_string(),
            owner: self.certifying_module.clone(),
            phase: Phase::Finality,
            severity: Severity::Terminal,
            gate: None,
            cause: VetoCause::Rejected {
                reason: result
                    .failure
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "finality failed".to_string()),
            },
        }
    }

    async fn handle_veto(&self, run: &PipelineRun, veto: &StageVeto) {
        match veto.severity {
            Severity::Standard => self.on_standard(run, veto),
            Severity::Critical => self.on_critical(run, veto).await,
            Severity::Terminal => self.on_terminal(run, veto).await,
        }
    }

    fn on_standard(&self, run: &PipelineRun, veto: &StageVeto) {
        warn!(
            run_id = %run.run_id,
            stage = %veto.stage,
            cause = %veto.cause,
            "run rejected"
        );
    }

    async fn on_critical(&self, run: &PipelineRun, veto: &StageVeto) {
        error!(
            run_id = %run.run_id,
            transition = %run.transition_hash.short(),
            stage = %veto.stage,
            owner = %veto.owner,
            severity = %veto.severity,
            cause = %veto.cause,
            "stage failure requires correction"
        );

        let capture_id = match ForensicCapture::from_run(run, veto) {
            Ok(capture) => {
                let id = capture.capture_id;
                match self.forensics.capture(capture) {
                    Ok(()) => Some(id),
                    Err(err) => {
                        error!(run_id = %run.run_id, error = %err, "forensic capture failed");
                        None
                    }
                }
            }
            Err(err) => {
                error!(run_id = %run.run_id, error = %err, "forensic capture failed");
                None
            }
        };

        let escalation = Escalation {
            run_id: run.run_id,
            transition_hash: run.transition_hash,
            severity: veto.severity,
            veto: veto.clone(),
            capture_id,
            raised_at: Utc::now(),
        };
        match tokio::time::timeout(self.default_timeout, self.escalation.escalate(escalation))
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(run_id = %run.run_id, error = %err, "escalation failed"),
            Err(_) => error!(run_id = %run.run_id, "escalation timed out"),
        }
    }

    async fn on_terminal(&self, run: &PipelineRun, veto: &StageVeto) {
        self.on_critical(run, veto).await;
        self.halt.trip(HaltRecord {
            run_id: run.run_id,
            transition_hash: run.transition_hash,
            stage: veto.stage.clone(),
            reason: veto.cause.to_string(),
            halted_at: Utc::now(),
        });
    }
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("margin", &self.margin)
            .field("default_timeout", &self.default_timeout)
            .field("certifying_module", &self.certifying_module)
            .field("halted", &self.halt.is_halted())
            .finish_non_exhaustive()
    }
}
