use chrono::{DateTime, Utc};
use gsep_types::{GateSignal, TransitionCandidate, TransitionHash, VetoBit};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StageError;
use crate::finality::{FinalityInputs, Margin};
use crate::outcome::{Contribution, StageRecord};

/// The four admission signals of a run, each starting `Unset`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalTable {
    #[serde(rename = "context_pass")]
    pub context: GateSignal,
    #[serde(rename = "policy_veto")]
    pub policy: GateSignal,
    #[serde(rename = "stability_veto")]
    pub stability: GateSignal,
    #[serde(rename = "behavior_veto")]
    pub behavior: GateSignal,
}

impl SignalTable {
    /// Every signal passing.
    pub fn all_pass() -> Self {
        Self {
            context: GateSignal::Pass,
            policy: GateSignal::Pass,
            stability: GateSignal::Pass,
            behavior: GateSignal::Pass,
        }
    }

    pub fn get(&self, bit: VetoBit) -> GateSignal {
        match bit {
            VetoBit::Context => self.context,
            VetoBit::Policy => self.policy,
            VetoBit::Stability => self.stability,
            VetoBit::Behavior => self.behavior,
        }
    }

    pub fn set(&mut self, bit: VetoBit, signal: GateSignal) {
        let slot = match bit {
            VetoBit::Context => &mut self.context,
            VetoBit::Policy => &mut self.policy,
            VetoBit::Stability => &mut self.stability,
            VetoBit::Behavior => &mut self.behavior,
        };
        *slot = signal;
    }

    pub fn with(mut self, bit: VetoBit, signal: GateSignal) -> Self {
        self.set(bit, signal);
        self
    }
}

/// Per-attempt state of one candidate moving through the pipeline.
///
/// Stages read it; only the executor writes it. Discarded after finality.
#[derive(Clone, Debug, Serialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub candidate: TransitionCandidate,
    pub transition_hash: TransitionHash,
    pub started_at: DateTime<Utc>,
    pub signals: SignalTable,
    #[serde(rename = "S01")]
    pub s01: Option<f64>,
    #[serde(rename = "S02")]
    pub s02: Option<f64>,
    pub epsilon: Margin,
    pub trail: Vec<StageRecord>,
}

impl PipelineRun {
    pub fn new(candidate: TransitionCandidate, epsilon: Margin) -> Self {
        let transition_hash = candidate.transition_hash();
        Self {
            run_id: Uuid::new_v4(),
            candidate,
            transition_hash,
            started_at: Utc::now(),
            signals: SignalTable::default(),
            s01: None,
            s02: None,
            epsilon,
            trail: Vec::new(),
        }
    }

    pub fn signal(&self, bit: VetoBit) -> GateSignal {
        self.signals.get(bit)
    }

    pub(crate) fn set_signal(&mut self, bit: VetoBit, signal: GateSignal) {
        self.signals.set(bit, signal);
    }

    pub(crate) fn contribute(&mut self, contribution: Contribution) {
        if let Some(value) = contribution.s01 {
            self.s01 = Some(self.s01.unwrap_or(0.0) + value);
        }
        if let Some(value) = contribution.s02 {
            self.s02 = Some(self.s02.unwrap_or(0.0) + value);
        }
    }

    /// Fails if a contributed value, or the total it would produce, is not
    /// finite.
    pub(crate) fn check_contribution(&self, contribution: &Contribution) -> Result<(), StageError> {
        for (metric, value, total) in [
            ("S01", contribution.s01, self.s01),
            ("S02", contribution.s02, self.s02),
        ] {
            let Some(value) = value else { continue };
            let sum = total.unwrap_or(0.0) + value;
            if !sum.is_finite() {
                return Err(StageError::InvalidMetric {
                    metric: metric.to_string(),
                    value: sum,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn record(&mut self, record: StageRecord) {
        self.trail.push(record);
    }

    pub fn finality_inputs(&self) -> FinalityInputs {
        FinalityInputs {
            s01: self.s01,
            s02: self.s02,
            epsilon: self.epsilon,
            signals: self.signals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gsep_types::TransitionRequest;

    fn run() -> PipelineRun {
        let candidate = TransitionCandidate::new(TransitionRequest::transition("A", "B", "x"));
        PipelineRun::new(candidate, Margin::new(0.05).unwrap())
    }

    #[test]
    fn signals_start_unset() {
        let run = run();
        for bit in VetoBit::ALL {
            assert!(run.signal(bit).is_unset());
        }
        assert_eq!(run.s01, None);
    }

    #[test]
    fn contributions_accumulate() {
        let mut run = run();
        run.contribute(Contribution::certified(0.5));
        run.contribute(Contribution::both(0.25, 0.7));
        assert_eq!(run.s01, Some(0.75));
        assert_eq!(run.s02, Some(0.7));
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let mut run = run();
        run.contribute(Contribution::certified(f64::MAX));
        assert!(run.check_contribution(&Contribution::baseline(1.0)).is_ok());
        assert!(matches!(
            run.check_contribution(&Contribution::certified(f64::MAX)),
            Err(StageError::InvalidMetric { ref metric, .. }) if metric == "S01"
        ));
        assert!(run.check_contribution(&Contribution::baseline(f64::NAN)).is_err());
        assert_eq!(run.s01, Some(f64::MAX));
    }

    #[test]
    fn signal_table_serializes_bit_names() {
        let table = SignalTable::default().with(VetoBit::Behavior, GateSignal::Veto);
        let json = serde_json::to_value(table).unwrap();
        assert_eq!(json["behavior_veto"], "VETO");
        assert_eq!(json["context_pass"], "UNSET");
    }

    #[test]
    fn hash_is_fixed_at_creation() {
        let run = run();
        assert_eq!(run.transition_hash, run.candidate.transition_hash());
    }
}
