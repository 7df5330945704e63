//! Stage pipeline executor for governed transitions.
//!
//! A candidate that passed structural validation runs through an ordered
//! list of stages grouped into phases:
//!
//! 1. **Anchoring**: context attestation (owns `context_pass`)
//! 2. **Gating**: policy, stability and behavior gates (own the three veto bits)
//! 3. **Audit**: utility scoring (contributes `S01` and `S02`)
//! 4. **Finality**: the finality calculus, then one ledger append
//!
//! Every stage carries a severity. A veto, error or timeout aborts the run:
//!
//! - **STANDARD**: the run is rejected, nothing else happens.
//! - **CRITICAL**: forensic capture plus escalation to the correction workflow.
//! - **TERMINAL**: as CRITICAL, and intake halts until an operator resumes it.
//!
//! A finality FAIL is always TERMINAL.

pub mod builder;
pub mod config;
pub mod error;
pub mod escalation;
pub mod executor;
pub mod finality;
pub mod forensics;
pub mod mocks;
pub mod outcome;
pub mod report;
pub mod run;
pub mod stages;
pub mod traits;
pub mod veto;

pub use builder::{Collaborators, PipelineBuilder};
pub use config::PipelineConfig;
pub use error::{EscalationError, ForensicError, StageError};
pub use escalation::{
    ChannelEscalation, Escalation, EscalationChannel, HaltRecord, HaltSwitch, TracingEscalation,
};
pub use executor::{PipelineExecutor, FINALITY_STAGE};
pub use finality::{evaluate as evaluate_finality, FinalityFailure, FinalityInputs, FinalityResult, Margin};
pub use forensics::{ForensicCapture, ForensicSink, InMemoryForensicLog};
pub use mocks::{MockContextAttestor, MockMetricSource, MockPolicyOracle, ScriptedStage};
pub use outcome::{Contribution, StageOutcome, StageRecord, StageStatus};
pub use report::{PipelineCode, PipelineReport};
pub use run::{PipelineRun, SignalTable};
pub use stages::{
    BehaviorGateStage, ContextAttestationStage, PolicyGateStage, StabilityGateStage, StageProfile,
    UtilityAuditStage,
};
pub use traits::{
    Attestation, ContextAttestor, MetricSource, PolicyDecision, PolicyOracle, Stage,
    UtilityEstimate,
};
pub use veto::{StageVeto, VetoCause};
