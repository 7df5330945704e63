use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Name of a protocol state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct State(pub String);

/// Name of a command issued against a state.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Command(pub String);

/// A governance role claimed by a signer.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(pub String);

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Command {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Derived Hash of a single-field newtype equals the hash of the inner
// String, as Borrow<str> requires.
impl Borrow<str> for State {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Command {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for Role {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for State {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for Command {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for Role {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directed edge between two states, written `"A -> B"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransitionId {
    pub from: State,
    pub to: State,
}

impl TransitionId {
    pub const SEPARATOR: &'static str = "->";

    pub fn new(from: State, to: State) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for TransitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.from, Self::SEPARATOR, self.to)
    }
}

impl FromStr for TransitionId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (from, to) = s
            .split_once(Self::SEPARATOR)
            .ok_or_else(|| ConfigError::MalformedTransition(s.to_string()))?;
        let (from, to) = (from.trim(), to.trim());
        if from.is_empty() || to.is_empty() || to.contains(Self::SEPARATOR) {
            return Err(ConfigError::MalformedTransition(s.to_string()));
        }
        Ok(Self::new(State::from(from), State::from(to)))
    }
}

impl TryFrom<String> for TransitionId {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TransitionId> for String {
    fn from(value: TransitionId) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn transition_id_display_round_trips() {
        let id = TransitionId::new(State::from("A"), State::from("B"));
        assert_eq!(id.to_string(), "A -> B");
        assert_eq!("A -> B".parse::<TransitionId>().unwrap(), id);
    }

    #[test]
    fn transition_id_tolerates_spacing() {
        let id: TransitionId = "DRAFT->REVIEW".parse().unwrap();
        assert_eq!(id.from.as_str(), "DRAFT");
        assert_eq!(id.to.as_str(), "REVIEW");
    }

    #[test]
    fn malformed_transition_ids_rejected() {
        for raw in ["A", " -> B", "A -> ", "A -> B -> C", ""] {
            assert!(
                raw.parse::<TransitionId>().is_err(),
                "{raw:?} should not parse"
            );
        }
    }

    #[test]
    fn state_set_lookup_by_str() {
        let states: HashSet<State> = ["A", "B"].into_iter().map(State::from).collect();
        assert!(states.contains("A"));
        assert!(!states.contains("C"));
    }

    #[test]
    fn transition_id_serializes_as_string() {
        let id = TransitionId::new(State::from("A"), State::from("B"));
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"A -> B\"");
        let restored: TransitionId = serde_json::from_str("\"A -> B\"").unwrap();
        assert_eq!(restored, id);
    }
}
