//! Finality calculus.
//!
//! ```text
//! PASS <=> (S01 >= S02 + epsilon) AND context_pass AND NOT policy_veto
//!          AND NOT stability_veto AND NOT behavior_veto
//! ```
//!
//! An unset signal or unset utility fails. The first failing term is
//! reported in the order policy, context, stability, behavior, utility.

use std::fmt;

use gsep_types::{ConfigError, GateSignal, VetoBit};
use serde::{Deserialize, Serialize};

use crate::run::SignalTable;

/// Minimum utility margin. Finite and non-negative by construction.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Margin(f64);

impl Margin {
    pub fn new(value: f64) -> Result<Self, ConfigError> {
        if value.is_finite() && value >= 0.0 {
            Ok(Self(value))
        } else {
            Err(ConfigError::InvalidMargin(value))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl<'de> Deserialize<'de> for Margin {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Margin::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Everything the calculus reads.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalityInputs {
    #[serde(rename = "S01")]
    pub s01: Option<f64>,
    #[serde(rename = "S02")]
    pub s02: Option<f64>,
    pub epsilon: Margin,
    pub signals: SignalTable,
}

/// The first term that failed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "term", rename_all = "snake_case")]
pub enum FinalityFailure {
    SignalUnset { bit: VetoBit },
    PolicyVeto,
    ContextNotAttested,
    StabilityVeto,
    BehaviorVeto,
    UtilityUnset,
    InsufficientMargin { s01: f64, s02: f64, epsilon: f64 },
}

impl fmt::Display for FinalityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinalityFailure::SignalUnset { bit } => write!(f, "{bit} was never evaluated"),
            FinalityFailure::PolicyVeto => f.write_str("policy veto"),
            FinalityFailure::ContextNotAttested => f.write_str("context not attested"),
            FinalityFailure::StabilityVeto => f.write_str("stability veto"),
            FinalityFailure::BehaviorVeto => f.write_str("behavior veto"),
            FinalityFailure::UtilityUnset => f.write_str("utility scores were never set"),
            FinalityFailure::InsufficientMargin { s01, s02, epsilon } => write!(
                f,
                "utility margin not met: S01 {s01} < S02 {s02} + epsilon {epsilon}"
            ),
        }
    }
}

/// Outcome of the calculus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinalityResult {
    pub pass: bool,
    pub utility_margin_met: bool,
    pub signals_clear: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FinalityFailure>,
}

const TERM_ORDER: [VetoBit; 4] = [
    VetoBit::Policy,
    VetoBit::Context,
    VetoBit::Stability,
    VetoBit::Behavior,
];

pub fn evaluate(inputs: &FinalityInputs) -> FinalityResult {
    let signal_failure = TERM_ORDER
        .iter()
        .find_map(|bit| signal_failure(*bit, inputs.signals.get(*bit)));

    let utility = match (inputs.s01, inputs.s02) {
        (Some(s01), Some(s02)) => {
            let epsilon = inputs.epsilon.value();
            if s01 >= s02 + epsilon {
                Ok(())
            } else {
                Err(FinalityFailure::InsufficientMargin { s01, s02, epsilon })
            }
        }
        _ => Err(FinalityFailure::UtilityUnset),
    };

    let signals_clear = signal_failure.is_none();
    let utility_margin_met = utility.is_ok();
    let failure = signal_failure.or(utility.err());

    FinalityResult {
        pass: failure.is_none(),
        utility_margin_met,
        signals_clear,
        failure,
    }
}

fn signal_failure(bit: VetoBit, signal: GateSignal) -> Option<FinalityFailure> {
    match signal {
        GateSignal::Pass => None,
        GateSignal::Unset => Some(FinalityFailure::SignalUnset { bit }),
        GateSignal::Veto => Some(match bit {
            VetoBit::Policy => FinalityFailure::PolicyVeto,
            VetoBit::Context => FinalityFailure::ContextNotAttested,
            VetoBit::Stability => FinalityFailure::StabilityVeto,
            VetoBit::Behavior => FinalityFailure::BehaviorVeto,
        }),
    }
}
