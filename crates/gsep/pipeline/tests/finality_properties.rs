use gsep_pipeline::{evaluate_finality, FinalityFailure, FinalityInputs, Margin, SignalTable};
use gsep_types::{GateSignal, VetoBit};
use proptest::prelude::*;

fn signal() -> impl Strategy<Value = GateSignal> {
    prop_oneof![
        Just(GateSignal::Unset),
        Just(GateSignal::Pass),
        Just(GateSignal::Veto),
    ]
}

fn signals() -> impl Strategy<Value = SignalTable> {
    (signal(), signal(), signal(), signal()).prop_map(|(context, policy, stability, behavior)| {
        SignalTable {
            context,
            policy,
            stability,
            behavior,
        }
    })
}

fn inputs(s01: f64, s02: f64, epsilon: f64, signals: SignalTable) -> FinalityInputs {
    FinalityInputs {
        s01: Some(s01),
        s02: Some(s02),
        epsilon: Margin::new(epsilon).unwrap(),
        signals,
    }
}

proptest! {
    #[test]
    fn pass_iff_margin_met_and_all_signals_pass(
        s01 in 0.0f64..1.0,
        s02 in 0.0f64..1.0,
        epsilon in 0.0f64..0.5,
        table in signals(),
    ) {
        let result = evaluate_finality(&inputs(s01, s02, epsilon, table));
        let expected = s01 >= s02 + epsilon && table == SignalTable::all_pass();
        prop_assert_eq!(result.pass, expected);
        prop_assert_eq!(result.pass, result.failure.is_none());
    }

    #[test]
    fn raising_certified_utility_never_breaks_a_pass(
        s01 in 0.0f64..1.0,
        bump in 0.0f64..1.0,
        s02 in 0.0f64..1.0,
        epsilon in 0.0f64..0.5,
    ) {
        let before = evaluate_finality(&inputs(s01, s02, epsilon, SignalTable::all_pass()));
        let after = evaluate_finality(&inputs(s01 + bump, s02, epsilon, SignalTable::all_pass()));
        prop_assert!(!before.pass || after.pass);
    }

    #[test]
    fn any_veto_fails_regardless_of_margin(
        s01 in 0.0f64..10.0,
        bit in prop::sample::select(VetoBit::ALL.to_vec()),
    ) {
        let table = SignalTable::all_pass().with(bit, GateSignal::Veto);
        let result = evaluate_finality(&inputs(s01 + 1.0, 0.0, 0.0, table));
        prop_assert!(!result.pass);
        prop_assert!(result.utility_margin_met);
        prop_assert!(!result.signals_clear);
    }

    #[test]
    fn unset_utility_always_fails(table in signals(), certified in proptest::option::of(0.0f64..1.0)) {
        let result = evaluate_finality(&FinalityInputs {
            s01: certified,
            s02: None,
            epsilon: Margin::new(0.0).unwrap(),
            signals: table,
        });
        prop_assert!(!result.pass);
        prop_assert!(!result.utility_margin_met);
        if table == SignalTable::all_pass() {
            prop_assert_eq!(result.failure, Some(FinalityFailure::UtilityUnset));
        }
    }
}
