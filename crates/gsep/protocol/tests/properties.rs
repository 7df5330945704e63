//! Property tests for the transition validator and role scoring.

use std::sync::Arc;

use gsep_protocol::{AuthorizationModel, ProtocolSpec, TransitionValidator};
use gsep_types::{Credentials, Role, StatusCode, TransitionRequest};
use proptest::prelude::*;
use serde_json::json;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

const STATES: [&str; 4] = ["DRAFT", "REVIEW", "APPROVED", "ARCHIVED"];
const ROLES: [&str; 5] = ["Approver", "Auditor", "Operator", "Intern", "Guest"];

fn spec() -> ProtocolSpec {
    ProtocolSpec::compile(&json!({
        "DRAFT": {"allowed_commands": ["go"], "next_states": ["REVIEW"]},
        "REVIEW": {"allowed_commands": ["go"], "next_states": ["APPROVED", "DRAFT"]},
        "APPROVED": {"allowed_commands": ["go"], "next_states": ["ARCHIVED"]},
        "ARCHIVED": {"allowed_commands": ["go"], "next_states": []}
    }))
    .unwrap()
}

fn auth() -> AuthorizationModel {
    AuthorizationModel::compile(&json!({
        "required_roles": ["Approver", "Auditor", "Operator"],
        "exempt_transitions": ["REVIEW -> DRAFT"],
        "minimum_signature_threshold": 2
    }))
    .unwrap()
}

fn validator() -> TransitionValidator {
    TransitionValidator::new(Arc::new(spec()), Arc::new(auth()))
}

fn arb_state() -> impl Strategy<Value = &'static str> {
    prop::sample::select(STATES.to_vec())
}

fn arb_roles() -> impl Strategy<Value = Vec<Role>> {
    prop::collection::vec(prop::sample::select(ROLES.to_vec()), 0..8)
        .prop_map(|names| names.into_iter().map(Role::from).collect())
}

fn arb_credentials() -> impl Strategy<Value = Option<Credentials>> {
    prop_oneof![
        Just(None),
        Just(Some(Credentials { roles: None })),
        arb_roles().prop_map(|roles| Some(Credentials { roles: Some(roles) })),
    ]
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// A target outside next_states is never admitted.
    #[test]
    fn undeclared_edges_are_always_invalid(
        from in arb_state(),
        to in arb_state(),
        credentials in arb_credentials(),
    ) {
        let spec = spec();
        prop_assume!(!spec.has_edge(from, to));

        let mut request = TransitionRequest::transition(from, to, "go");
        request.credentials = credentials;
        let verdict = validator().validate(&request);

        prop_assert_eq!(verdict.code, StatusCode::TransitionInvalid);
        prop_assert!(!verdict.valid);
    }

    /// Exempt edges pass whatever credentials accompany them.
    #[test]
    fn exempt_edges_ignore_credentials(credentials in arb_credentials()) {
        let mut request = TransitionRequest::transition("REVIEW", "DRAFT", "go");
        request.credentials = credentials;
        let verdict = validator().validate(&request);

        prop_assert_eq!(verdict.code, StatusCode::AuthExempt);
        prop_assert!(verdict.valid);
    }

    /// Scoring does not depend on the order roles are presented in.
    #[test]
    fn score_is_order_independent(roles in arb_roles(), seed in any::<u64>()) {
        let model = auth();
        let mut shuffled = roles.clone();
        let len = shuffled.len();
        if len > 1 {
            shuffled.rotate_left((seed as usize) % len);
            shuffled.reverse();
        }

        prop_assert_eq!(
            model.score(Some(&roles)).unwrap(),
            model.score(Some(&shuffled)).unwrap()
        );
    }

    /// Repeating a role never raises the match count.
    #[test]
    fn duplicate_roles_do_not_inflate_score(roles in arb_roles()) {
        let model = auth();
        let mut doubled = roles.clone();
        doubled.extend(roles.iter().cloned());

        prop_assert_eq!(
            model.score(Some(&roles)).unwrap(),
            model.score(Some(&doubled)).unwrap()
        );
    }

    /// Verdict validity always agrees with the status code.
    #[test]
    fn validity_follows_code(
        from in "[A-Z]{1,8}",
        to in proptest::option::of(arb_state()),
        command in prop_oneof![Just("go"), Just("stop")],
        credentials in arb_credentials(),
    ) {
        let request = TransitionRequest {
            current: from.as_str().into(),
            target: to.map(Into::into),
            command: command.into(),
            credentials,
        };
        let verdict = validator().validate(&request);
        prop_assert_eq!(verdict.valid, verdict.code.is_valid());
    }
}
