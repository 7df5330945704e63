//! ProtocolSpec compiler.

use std::collections::{HashMap, HashSet};
use std::fmt;

use gsep_types::{Command, ConfigError, State, TransitionId};
use serde::de::{self, Deserialize, Deserializer, MapAccess, Visitor};
use serde_json::Value;
use tracing::debug;

const ALLOWED_COMMANDS: &str = "allowed_commands";
const NEXT_STATES: &str = "next_states";

/// Compiled rule for a single state.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StateRule {
    pub allowed_commands: HashSet<Command>,
    pub next_states: HashSet<State>,
}

impl StateRule {
    pub fn allows(&self, command: &str) -> bool {
        self.allowed_commands.contains(command)
    }

    pub fn leads_to(&self, state: &str) -> bool {
        self.next_states.contains(state)
    }

    pub fn is_terminal(&self) -> bool {
        self.next_states.is_empty()
    }
}

/// The declared state machine, immutable after compilation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProtocolSpec {
    states: HashMap<State, StateRule>,
}

/// Top-level protocol document with key order and duplicates preserved.
///
/// `serde_json::Value` collapses duplicate keys, so text input goes through
/// this visitor first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawProtocolSpec(pub Vec<(String, Value)>);

impl<'de> Deserialize<'de> for RawProtocolSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = RawProtocolSpec;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object mapping state names to rules")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((key, value)) = map.next_entry::<String, Value>()? {
                    entries.push((key, value));
                }
                Ok(RawProtocolSpec(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

impl ProtocolSpec {
    /// Compile from JSON text, rejecting duplicate state keys.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawProtocolSpec = serde_json::from_str(text).map_err(|e| {
            if e.is_data() {
                ConfigError::NotAnObject
            } else {
                ConfigError::Parse(e.to_string())
            }
        })?;
        Self::compile_entries(raw.0.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Compile from an already parsed JSON object.
    pub fn compile(raw: &Value) -> Result<Self, ConfigError> {
        let obj = raw.as_object().ok_or(ConfigError::NotAnObject)?;
        Self::compile_entries(obj.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn compile_entries<'a, I>(entries: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (&'a str, &'a Value)>,
    {
        let mut states: HashMap<State, StateRule> = HashMap::new();

        for (name, raw_rule) in entries {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyStateName);
            }
            if name.trim() != name || name.contains(TransitionId::SEPARATOR) {
                return Err(ConfigError::InvalidSetting {
                    key: name.to_string(),
                    reason: format!(
                        "state names must not contain `{}` or surrounding whitespace",
                        TransitionId::SEPARATOR
                    ),
                });
            }
            if states.contains_key(name) {
                return Err(ConfigError::DuplicateState(name.to_string()));
            }

            let rule = raw_rule.as_object().ok_or_else(|| ConfigError::InvalidRule {
                state: name.to_string(),
            })?;

            let allowed_commands = string_set(name, ALLOWED_COMMANDS, rule.get(ALLOWED_COMMANDS))?
                .into_iter()
                .map(Command::new)
                .collect();
            let next_states = string_set(name, NEXT_STATES, rule.get(NEXT_STATES))?
                .into_iter()
                .map(State::new)
                .collect();

            states.insert(
                State::new(name),
                StateRule {
                    allowed_commands,
                    next_states,
                },
            );
        }

        for (state, rule) in &states {
            for target in &rule.next_states {
                if !states.contains_key(target.as_str()) {
                    return Err(ConfigError::UndeclaredState {
                        state: state.to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }

        debug!(states = states.len(), "protocol spec compiled");
        Ok(Self { states })
    }

    pub fn rule(&self, state: &str) -> Option<&StateRule> {
        self.states.get(state)
    }

    pub fn contains(&self, state: &str) -> bool {
        self.states.contains_key(state)
    }

    /// Whether `from -> to` is a declared edge.
    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.rule(from).is_some_and(|r| r.leads_to(to))
    }

    pub fn is_terminal(&self, state: &str) -> bool {
        self.rule(state).is_some_and(StateRule::is_terminal)
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.keys()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// A missing list is an empty list; anything else must be a list of strings.
fn string_set(state: &str, field: &str, raw: Option<&Value>) -> Result<HashSet<String>, ConfigError> {
    let items = match raw {
        None | Some(Value::Null) => return Ok(HashSet::new()),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ConfigError::InvalidList {
                state: state.to_string(),
                field: field.to_string(),
            })
        }
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| ConfigError::NonStringEntry {
                    state: state.to_string(),
                    field: field.to_string(),
                    index,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "DRAFT": {"allowed_commands": ["edit", "submit"], "next_states": ["REVIEW"]},
            "REVIEW": {"allowed_commands": ["approve", "reject"], "next_states": ["APPROVED", "DRAFT"]},
            "APPROVED": {"allowed_commands": [], "next_states": []}
        })
    }

    #[test]
    fn compiles_lists_into_sets() {
        let spec = ProtocolSpec::compile(&sample()).unwrap();
        assert_eq!(spec.len(), 3);
        let review = spec.rule("REVIEW").unwrap();
        assert!(review.allows("approve"));
        assert!(!review.allows("edit"));
        assert!(spec.has_edge("REVIEW", "DRAFT"));
        assert!(!spec.has_edge("DRAFT", "APPROVED"));
        assert!(spec.is_terminal("APPROVED"));
        assert!(!spec.is_terminal("DRAFT"));
    }

    #[test]
    fn repeated_list_entries_collapse() {
        let spec = ProtocolSpec::compile(&json!({
            "A": {"allowed_commands": ["x", "x"], "next_states": ["A", "A"]}
        }))
        .unwrap();
        let rule = spec.rule("A").unwrap();
        assert_eq!(rule.allowed_commands.len(), 1);
        assert_eq!(rule.next_states.len(), 1);
    }

    #[test]
    fn missing_lists_compile_as_terminal() {
        let spec = ProtocolSpec::compile(&json!({"DONE": {}})).unwrap();
        assert!(spec.is_terminal("DONE"));
        assert!(spec.rule("DONE").unwrap().allowed_commands.is_empty());
    }

    #[test]
    fn rejects_undeclared_next_state() {
        let err = ProtocolSpec::compile(&json!({
            "A": {"allowed_commands": ["x"], "next_states": ["GHOST"]}
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::UndeclaredState {
                state: "A".into(),
                target: "GHOST".into()
            }
        );
    }

    #[test]
    fn rejects_non_string_entry() {
        let err = ProtocolSpec::compile(&json!({
            "A": {"allowed_commands": ["x", 3], "next_states": []}
        }))
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::NonStringEntry {
                state: "A".into(),
                field: "allowed_commands".into(),
                index: 1
            }
        );
    }

    #[test]
    fn rejects_non_list_field() {
        let err = ProtocolSpec::compile(&json!({
            "A": {"allowed_commands": "x", "next_states": []}
        }))
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidList { .. }));
    }

    #[test]
    fn rejects_empty_state_name() {
        let err = ProtocolSpec::compile(&json!({"": {}})).unwrap_err();
        assert_eq!(err, ConfigError::EmptyStateName);
    }

    #[test]
    fn rejects_state_names_that_cannot_form_transition_ids() {
        for name in ["A -> B", "A->B", " DRAFT", "DRAFT "] {
            let mut raw = serde_json::Map::new();
            raw.insert(name.to_string(), json!({}));
            let err = ProtocolSpec::compile(&Value::Object(raw)).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidSetting { ref key, .. } if key == name),
                "{name:?} gave {err:?}"
            );
        }
        assert!(ProtocolSpec::compile(&json!({"IN REVIEW": {}})).is_ok());
    }

    #[test]
    fn rejects_non_object_inputs() {
        assert_eq!(
            ProtocolSpec::compile(&json!(["A"])).unwrap_err(),
            ConfigError::NotAnObject
        );
        assert!(matches!(
            ProtocolSpec::compile(&json!({"A": 1})).unwrap_err(),
            ConfigError::InvalidRule { .. }
        ));
    }

    #[test]
    fn text_input_detects_duplicate_keys() {
        let text = r#"{
            "A": {"allowed_commands": ["x"], "next_states": []},
            "A": {"allowed_commands": ["y"], "next_states": []}
        }"#;
        assert_eq!(
            ProtocolSpec::from_json_str(text).unwrap_err(),
            ConfigError::DuplicateState("A".into())
        );
    }

    #[test]
    fn text_input_compiles_like_value_input() {
        let text = sample().to_string();
        assert_eq!(
            ProtocolSpec::from_json_str(&text).unwrap(),
            ProtocolSpec::compile(&sample()).unwrap()
        );
    }

    #[test]
    fn text_input_reports_syntax_errors() {
        assert!(matches!(
            ProtocolSpec::from_json_str("{not json").unwrap_err(),
            ConfigError::Parse(_)
        ));
        assert_eq!(
            ProtocolSpec::from_json_str("[1, 2]").unwrap_err(),
            ConfigError::NotAnObject
        );
    }
}
