//! Governed State Transition Engine.
//!
//! Composition root wiring the protocol validator, the stage pipeline and
//! the audit ledger:
//!
//! ```text
//! request -> TransitionValidator -> PipelineExecutor -> AuditLedger
//! ```
//!
//! Configuration is layered (defaults, file, `GSEP_*` environment) and
//! validated in full before anything runs.

pub mod config;
pub mod engine;
pub mod error;
pub mod telemetry;

pub use config::{EngineConfig, LedgerConfig, LoggingConfig};
pub use engine::{GovernedEngine, Submission};
pub use error::{EngineError, EngineResult};
pub use telemetry::init_tracing;
