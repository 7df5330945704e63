//! Protocol contract for governed state transitions.
//!
//! Three pieces, all compiled once at startup and immutable afterwards:
//!
//! - [`ProtocolSpec`]: the declared state machine. For each state, the
//!   commands it accepts and the states it may move to.
//! - [`AuthorizationModel`]: required roles, the signature threshold and the
//!   edges exempt from threshold checks.
//! - [`TransitionValidator`]: the synchronous gate in front of the pipeline.
//!
//! ## Validation order
//!
//! 1. **State existence**: `STATE_UNDEFINED`
//! 2. **Command allowance**: `COMMAND_DISALLOWED` (no target: `SUCCESS`)
//! 3. **Transition legality**: `TRANSITION_INVALID`
//! 4. **Authorization**: `AUTH_EXEMPT` / `AUTH_ERROR` / `AUTH_INSUFFICIENT` / `AUTH_MET`
//!
//! The first failing check answers; later checks never run. Only declared
//! edges are legal, whatever the command.
//!
//! Everything here is a pure read after compilation, so a validator can be
//! shared across threads behind an `Arc` without locking.

pub mod auth;
pub mod error;
pub mod spec;
pub mod validator;

pub use auth::{AuthScore, AuthorizationConfig, AuthorizationModel};
pub use error::{AuthError, ValidationError};
pub use spec::{ProtocolSpec, RawProtocolSpec, StateRule};
pub use validator::{AcceptClaimed, ClaimVerifier, TransitionValidator};
