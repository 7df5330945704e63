//! Core type definitions for the Governed State Transition Engine (GSEP).
//!
//! This crate provides the shared vocabulary. No business logic, just types.
//! Every GSEP crate depends on this crate.

pub mod error;
pub mod hash;
pub mod ids;
pub mod request;
pub mod signal;
pub mod status;

// Re-export primary types at crate root for ergonomic use.
pub use error::ConfigError;
pub use hash::{canonical_json, TransitionHash};
pub use ids::{Command, Role, State, TransitionId};
pub use request::{Credentials, RequestError, TransitionCandidate, TransitionRequest};
pub use signal::{GateSignal, Phase, Severity, VetoBit};
pub use status::{StatusCode, Verdict};
