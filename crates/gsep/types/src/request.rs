use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::hash::{canonical_json, TransitionHash};
use crate::ids::{Command, Role, State, TransitionId};

/// Domain tag mixed into every transition hash.
const TRANSITION_HASH_DOMAIN: &str = "gsep.transition.v1";

/// Role claims accompanying a request.
///
/// `roles: None` models credentials that were supplied without a usable role
/// list (absent or malformed); the validator answers `AUTH_ERROR` for it on
/// non-exempt transitions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub roles: Option<Vec<Role>>,
}

impl Credentials {
    pub fn with_roles<I, R>(roles: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Role>,
    {
        Self {
            roles: Some(roles.into_iter().map(Into::into).collect()),
        }
    }
}

/// A single validation request. Ephemeral, one per call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub current: State,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<State>,
    pub command: Command,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

/// Errors turning untyped input into a [`TransitionRequest`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("request must be a JSON object")]
    NotAnObject,

    #[error("request field `{0}` must be a string")]
    InvalidField(&'static str),
}

impl TransitionRequest {
    /// In-state command: no transition implied.
    pub fn command(current: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            current: State::new(current),
            target: None,
            command: Command::new(command),
            credentials: None,
        }
    }

    /// Transition request from `current` to `target`.
    pub fn transition(
        current: impl Into<String>,
        target: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            current: State::new(current),
            target: Some(State::new(target)),
            command: Command::new(command),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// The edge this request asks to traverse, if any.
    pub fn transition_id(&self) -> Option<TransitionId> {
        self.target
            .as_ref()
            .map(|target| TransitionId::new(self.current.clone(), target.clone()))
    }

    /// Claimed roles, if credentials carry a usable list.
    pub fn roles(&self) -> Option<&[Role]> {
        self.credentials
            .as_ref()
            .and_then(|c| c.roles.as_deref())
    }

    /// Parse a request from untyped JSON.
    ///
    /// Structural fields (`current`, `target`, `command`) must be strings.
    /// A credentials block whose `roles` is missing or not a list of strings
    /// is kept as `roles: None`, so authorization can reject it in order.
    pub fn from_json(value: &Value) -> Result<Self, RequestError> {
        let obj = value.as_object().ok_or(RequestError::NotAnObject)?;

        let current = obj
            .get("current")
            .and_then(Value::as_str)
            .ok_or(RequestError::InvalidField("current"))?;
        let command = obj
            .get("command")
            .and_then(Value::as_str)
            .ok_or(RequestError::InvalidField("command"))?;
        let target = match obj.get("target") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(State::new(s.clone())),
            Some(_) => return Err(RequestError::InvalidField("target")),
        };

        let credentials = match obj.get("credentials") {
            None | Some(Value::Null) => None,
            Some(raw) => Some(Credentials {
                roles: raw.get("roles").and_then(parse_roles),
            }),
        };

        Ok(Self {
            current: State::new(current),
            target,
            command: Command::new(command),
            credentials,
        })
    }
}

fn parse_roles(raw: &Value) -> Option<Vec<Role>> {
    raw.as_array()?
        .iter()
        .map(|r| r.as_str().map(Role::from))
        .collect()
}

/// A proposed transition awaiting certification by the pipeline.
///
/// `payload` carries the proposed state change and anything the caller needs
/// to distinguish two otherwise identical proposals (e.g. an epoch).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransitionCandidate {
    pub request: TransitionRequest,
    #[serde(default)]
    pub payload: Value,
}

impl TransitionCandidate {
    pub fn new(request: TransitionRequest) -> Self {
        Self {
            request,
            payload: Value::Null,
        }
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Canonical identity of this candidate.
    ///
    /// Covers `current`, `target`, `command` and `payload`. Credentials are
    /// not part of the identity: the same proposal signed by different roles
    /// hashes identically.
    pub fn transition_hash(&self) -> TransitionHash {
        let identity = serde_json::json!({
            "current": self.request.current.as_str(),
            "target": self.request.target.as_ref().map(State::as_str),
            "command": self.request.command.as_str(),
            "payload": self.payload,
        });
        TransitionHash::digest(
            TRANSITION_HASH_DOMAIN,
            canonical_json(&identity).as_bytes(),
        )
    }
}
