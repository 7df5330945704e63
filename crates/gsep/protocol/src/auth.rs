//! Role-threshold authorization.

use std::collections::HashSet;

use gsep_types::{ConfigError, Role, TransitionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::AuthError;
use crate::spec::ProtocolSpec;

/// Declarative authorization section, as written in configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationConfig {
    #[serde(default)]
    pub required_roles: Vec<String>,
    #[serde(default)]
    pub exempt_transitions: Vec<String>,
    #[serde(default = "default_threshold")]
    pub minimum_signature_threshold: i64,
}

fn default_threshold() -> i64 {
    1
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            required_roles: Vec::new(),
            exempt_transitions: Vec::new(),
            minimum_signature_threshold: default_threshold(),
        }
    }
}

/// Result of scoring a role set against the threshold.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthScore {
    pub matched: usize,
    pub required: u32,
    pub met: bool,
}

/// Compiled authorization rules.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationModel {
    required_roles: HashSet<Role>,
    exempt_transitions: HashSet<TransitionId>,
    threshold: u32,
}

impl AuthorizationModel {
    pub fn compile(raw: &Value) -> Result<Self, ConfigError> {
        let config: AuthorizationConfig =
            serde_json::from_value(raw.clone()).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &AuthorizationConfig) -> Result<Self, ConfigError> {
        let mut required_roles = HashSet::with_capacity(config.required_roles.len());
        for role in &config.required_roles {
            if role.trim().is_empty() {
                return Err(ConfigError::InvalidSetting {
                    key: "required_roles".into(),
                    reason: "role names must not be empty".into(),
                });
            }
            required_roles.insert(Role::new(role.as_str()));
        }

        let exempt_transitions = config
            .exempt_transitions
            .iter()
            .map(|raw| raw.parse::<TransitionId>())
            .collect::<Result<HashSet<_>, _>>()?;

        let requested = config.minimum_signature_threshold;
        if requested < 1 {
            return Err(ConfigError::ThresholdTooLow(requested));
        }
        let threshold =
            u32::try_from(requested).map_err(|_| ConfigError::ThresholdUnreachable {
                threshold: u32::MAX,
                roles: required_roles.len(),
            })?;
        if threshold as usize > required_roles.len() {
            return Err(ConfigError::ThresholdUnreachable {
                threshold,
                roles: required_roles.len(),
            });
        }

        debug!(
            roles = required_roles.len(),
            exempt = exempt_transitions.len(),
            threshold,
            "authorization model compiled"
        );

        Ok(Self {
            required_roles,
            exempt_transitions,
            threshold,
        })
    }

    /// Whether `"A -> B"` is exempt. Malformed ids are never exempt.
    pub fn is_exempt(&self, transition: &str) -> bool {
        transition
            .parse::<TransitionId>()
            .is_ok_and(|id| self.exempt_transitions.contains(&id))
    }

    pub fn is_exempt_edge(&self, transition: &TransitionId) -> bool {
        self.exempt_transitions.contains(transition)
    }

    /// Score claimed roles. Duplicates count once; order is irrelevant.
    pub fn score(&self, roles: Option<&[Role]>) -> Result<AuthScore, AuthError> {
        let roles = roles.ok_or(AuthError::MissingRoles)?;
        let distinct: HashSet<&str> = roles.iter().map(Role::as_str).collect();
        let matched = distinct
            .into_iter()
            .filter(|r| self.required_roles.contains(*r))
            .count();
        Ok(AuthScore {
            matched,
            required: self.threshold,
            met: matched >= self.threshold as usize,
        })
    }

    /// Every exempt transition must name a declared edge of `spec`.
    pub fn ensure_edges_declared(&self, spec: &ProtocolSpec) -> Result<(), ConfigError> {
        let mut undeclared: Vec<&TransitionId> = self
            .exempt_transitions
            .iter()
            .filter(|id| !spec.has_edge(id.from.as_str(), id.to.as_str()))
            .collect();
        undeclared.sort();
        match undeclared.first() {
            Some(id) => Err(ConfigError::ExemptEdgeUndeclared(id.to_string())),
            None => Ok(()),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn required_roles(&self) -> &HashSet<Role> {
        &self.required_roles
    }

    pub fn exempt_transitions(&self) -> &HashSet<TransitionId> {
        &self.exempt_transitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> AuthorizationModel {
        AuthorizationModel::compile(&json!({
            "required_roles": ["Approver", "Auditor", "Operator"],
            "exempt_transitions": ["REVIEW -> DRAFT"],
            "minimum_signature_threshold": 2
        }))
        .unwrap()
    }

    fn roles(names: &[&str]) -> Vec<Role> {
        names.iter().copied().map(Role::from).collect()
    }

    #[test]
    fn threshold_defaults_to_one() {
        let model = AuthorizationModel::compile(&json!({"required_roles": ["Approver"]})).unwrap();
        assert_eq!(model.threshold(), 1);
    }

    #[test]
    fn exemption_lookup_normalizes_spacing() {
        let model = model();
        assert!(model.is_exempt("REVIEW -> DRAFT"));
        assert!(model.is_exempt("REVIEW->DRAFT"));
        assert!(!model.is_exempt("DRAFT -> REVIEW"));
        assert!(!model.is_exempt("garbage"));
    }

    #[test]
    fn score_counts_distinct_required_roles() {
        let model = model();
        let score = model
            .score(Some(&roles(&["Approver", "Approver", "Intern"])))
            .unwrap();
        assert_eq!(
            score,
            AuthScore {
                matched: 1,
                required: 2,
                met: false
            }
        );

        let score = model.score(Some(&roles(&["Auditor", "Approver"]))).unwrap();
        assert!(score.met);
    }

    #[test]
    fn score_without_roles_is_auth_error() {
        assert_eq!(model().score(None).unwrap_err(), AuthError::MissingRoles);
    }

    #[test]
    fn empty_role_list_scores_zero() {
        let score = model().score(Some(&[])).unwrap();
        assert_eq!(score.matched, 0);
        assert!(!score.met);
    }

    #[test]
    fn rejects_threshold_below_one() {
        let err = AuthorizationModel::compile(&json!({
            "required_roles": ["A"],
            "minimum_signature_threshold": 0
        }))
        .unwrap_err();
        assert_eq!(err, ConfigError::ThresholdTooLow(0));
    }

    #[test]
    fn rejects_unreachable_threshold() {
        let err = AuthorizationModel::compile(&json!({
            "required_roles": ["A", "A"],
            "minimum_signature_threshold": 2
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::ThresholdUnreachable {
                threshold: 2,
                roles: 1
            }
        );
    }

    #[test]
    fn rejects_malformed_exempt_transition() {
        let err = AuthorizationModel::compile(&json!({
            "required_roles": ["A"],
            "exempt_transitions": ["A to B"]
        }))
        .unwrap_err();
        assert_eq!(err, ConfigError::MalformedTransition("A to B".into()));
    }

    #[test]
    fn rejects_empty_role_name() {
        let err = AuthorizationModel::compile(&json!({"required_roles": [" "]})).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSetting { .. }));
    }

    #[test]
    fn exempt_edges_must_exist_in_spec() {
        let spec = ProtocolSpec::compile(&json!({
            "DRAFT": {"allowed_commands": ["submit"], "next_states": ["REVIEW"]},
            "REVIEW": {"allowed_commands": ["reject"], "next_states": ["DRAFT"]}
        }))
        .unwrap();
        assert!(model().ensure_edges_declared(&spec).is_ok());

        let stray = AuthorizationModel::compile(&json!({
            "required_roles": ["A"],
            "exempt_transitions": ["DRAFT -> DONE"]
        }))
        .unwrap();
        assert_eq!(
            stray.ensure_edges_declared(&spec).unwrap_err(),
            ConfigError::ExemptEdgeUndeclared("DRAFT -> DONE".into())
        );
    }
}
