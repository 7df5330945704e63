//! Transition validator: legality then authorization, short-circuiting.

use std::sync::Arc;

use gsep_types::{Role, StatusCode, TransitionRequest, Verdict};
use tracing::{debug, warn};

use crate::auth::AuthorizationModel;
use crate::error::ValidationError;
use crate::spec::ProtocolSpec;

/// Verifies that a claimed role is backed by real credentials.
///
/// Claims the verifier rejects are dropped before scoring.
pub trait ClaimVerifier: Send + Sync {
    fn verify(&self, request: &TransitionRequest, role: &Role) -> bool;
}

/// Takes every claimed role at face value.
#[derive(Clone, Copy, Debug, Default)]
pub struct AcceptClaimed;

impl ClaimVerifier for AcceptClaimed {
    fn verify(&self, _request: &TransitionRequest, _role: &Role) -> bool {
        true
    }
}

/// Stateless validator over a compiled spec and authorization model.
#[derive(Clone)]
pub struct TransitionValidator {
    spec: Arc<ProtocolSpec>,
    auth: Arc<AuthorizationModel>,
    verifier: Arc<dyn ClaimVerifier>,
}

impl TransitionValidator {
    pub fn new(spec: Arc<ProtocolSpec>, auth: Arc<AuthorizationModel>) -> Self {
        Self {
            spec,
            auth,
            verifier: Arc::new(AcceptClaimed),
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn ClaimVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn spec(&self) -> &Arc<ProtocolSpec> {
        &self.spec
    }

    pub fn authorization(&self) -> &Arc<AuthorizationModel> {
        &self.auth
    }

    /// Validate a request. Never fails: rejections are verdicts.
    pub fn validate(&self, request: &TransitionRequest) -> Verdict {
        match self.check(request) {
            Ok(verdict) => {
                debug!(
                    current = %request.current,
                    command = %request.command,
                    code = %verdict.code,
                    "request admitted"
                );
                verdict
            }
            Err(err) => {
                warn!(
                    current = %request.current,
                    command = %request.command,
                    code = %err.code(),
                    reason = %err,
                    "request rejected"
                );
                err.into_verdict()
            }
        }
    }

    fn check(&self, request: &TransitionRequest) -> Result<Verdict, ValidationError> {
        let rule = self
            .spec
            .rule(request.current.as_str())
            .ok_or_else(|| ValidationError::StateUndefined(request.current.clone()))?;

        if !rule.allows(request.command.as_str()) {
            return Err(ValidationError::CommandDisallowed {
                state: request.current.clone(),
                command: request.command.clone(),
            });
        }

        let Some(transition) = request.transition_id() else {
            return Ok(Verdict::new(
                StatusCode::Success,
                format!(
                    "command {} accepted in state {}",
                    request.command, request.current
                ),
            ));
        };

        if !rule.leads_to(transition.to.as_str()) {
            return Err(ValidationError::TransitionInvalid(transition));
        }

        if self.auth.is_exempt_edge(&transition) {
            return Ok(Verdict::new(
                StatusCode::AuthExempt,
                format!("transition {transition} is exempt from signature checks"),
            ));
        }

        let verified: Option<Vec<Role>> = request.roles().map(|roles| {
            roles
                .iter()
                .filter(|role| self.verifier.verify(request, role))
                .cloned()
                .collect()
        });

        let score = self
            .auth
            .score(verified.as_deref())
            .map_err(|source| ValidationError::Auth {
                transition: transition.clone(),
                source,
            })?;

        if !score.met {
            return Err(ValidationError::InsufficientSignatures {
                transition,
                matched: score.matched,
                required: score.required,
            });
        }

        Ok(Verdict::new(
            StatusCode::AuthMet,
            format!(
                "transition {transition}: {} of {} required signatures matched",
                score.matched, score.required
            ),
        ))
    }
}

impl std::fmt::Debug for TransitionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionValidator")
            .field("states", &self.spec.len())
            .field("threshold", &self.auth.threshold())
            .finish_non_exhaustive()
    }
}
