//! Integration coverage for the condition/rule engine against a realistic
//! multi-rule profile, crossing the `model`/`rules` module boundary the way
//! the supervisor does when it calls `engine::evaluate` every tick.

use tsw6_zusi3_bridge::model::{LampId, Rule, SifaWarning, TrainState};
use tsw6_zusi3_bridge::rules::condition::{Action, Condition};
use tsw6_zusi3_bridge::rules::engine::evaluate;

fn sifa_warn_profile() -> Vec<Rule> {
    vec![
        Rule {
            source_field: "sifa.warning".into(),
            condition: Condition::BlinkValue,
            action: Action::Blink { period_ms: 500 },
            target_lamp: LampId::Led1,
        },
        Rule {
            source_field: "sifa.warning".into(),
            condition: Condition::IsTrue,
            action: Action::On,
            target_lamp: LampId::Led1,
        },
    ]
}

#[test]
fn scenario_2_sifa_warn_blinks_led1_twice_a_second() {
    let mut state = TrainState::default();
    state.sifa.warning = SifaWarning::Brake;
    let rules = sifa_warn_profile();

    // A 500ms period toggles twice per second: lit at 0ms and 500ms, dark at
    // 250ms and 750ms.
    assert!(evaluate(&rules, &state, 0)[&LampId::Led1]);
    assert!(!evaluate(&rules, &state, 250)[&LampId::Led1]);
    assert!(evaluate(&rules, &state, 500)[&LampId::Led1]);
    assert!(!evaluate(&rules, &state, 750)[&LampId::Led1]);
}

#[test]
fn p3_lamp_purity_same_state_and_clock_mod_period_yields_identical_maps() {
    let mut state = TrainState::default();
    state.sifa.warning = SifaWarning::Brake;
    state.main_switch = true;
    let rules = sifa_warn_profile();

    let a = evaluate(&rules, &state, 1_500);
    let b = evaluate(&rules, &state, 1_500);
    assert_eq!(a, b);

    // 1_500ms and 500ms land on the same phase of a 500ms period.
    let c = evaluate(&rules, &state, 500);
    assert_eq!(a[&LampId::Led1], c[&LampId::Led1]);
}

#[test]
fn an_unrelated_lamp_with_no_matching_rule_stays_off_throughout() {
    let mut state = TrainState::default();
    state.sifa.warning = SifaWarning::Brake;
    let rules = sifa_warn_profile();

    for clock_ms in [0, 250, 500, 999] {
        assert!(!evaluate(&rules, &state, clock_ms)[&LampId::Led2]);
    }
}
