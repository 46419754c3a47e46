//! Condition/rule engine (C6): evaluates a profile's rules into a final
//! on/off output per lamp, given a `TrainState` and a monotonic clock.

use std::collections::HashMap;

use crate::error::BridgeError;
use crate::model::{LampId, LampState, Rule, TrainState};
use crate::rules::condition::{Action, FieldValue};

/// Every `source_field` name `read_field` recognizes. Kept alongside it so
/// the two can never drift apart.
pub const KNOWN_FIELDS: &[&str] = &[
    "speed_kmh",
    "speed_ms",
    "pressure_main_line",
    "pressure_brake_cylinder",
    "pressure_main_reservoir",
    "current_a",
    "voltage_v",
    "rpm",
    "throttle_notch",
    "main_switch",
    "pantograph",
    "afb_active",
    "afb_target_kmh",
    "max_speed_kmh",
    "doors_left",
    "doors_right",
    "sifa.light",
    "sifa.warning",
    "sifa.main_switch",
    "sifa.cut_in",
    "pzb.active",
    "pzb.emergency",
    "pzb.zugart_55",
    "pzb.zugart_70",
    "pzb.zugart_85",
    "pzb.hz_500",
    "pzb.hz_1000",
    "pzb.befehl",
    "lzb.active",
    "lzb.ende",
    "lzb.lamp_g",
    "lzb.lamp_ende",
    "lzb.lamp_ue",
    "lzb.lamp_s",
    "lzb.lamp_b",
    "lzb.lamp_el",
    "lzb.lamp_v40",
];

/// Split `rules` into the ones with a recognized `source_field` and the
/// `BadRule` errors for the ones rejected (spec §7: a bad rule is rejected
/// and reported, other rules of the profile still load).
pub fn validate_rules(rules: Vec<Rule>) -> (Vec<Rule>, Vec<BridgeError>) {
    let mut valid = Vec::with_capacity(rules.len());
    let mut rejected = Vec::new();
    for rule in rules {
        if KNOWN_FIELDS.contains(&rule.source_field.as_str()) {
            valid.push(rule);
        } else {
            rejected.push(BridgeError::BadRule(format!(
                "unknown source_field {:?} on rule targeting {:?}",
                rule.source_field, rule.target_lamp
            )));
        }
    }
    (valid, rejected)
}

/// Resolved action for one lamp after folding every matching rule in
/// profile order (spec §4.6 combination rule).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolved {
    Off,
    On,
    Blink { period_ms: u64 },
}

impl Resolved {
    fn apply(self, action: Action) -> Resolved {
        match action {
            // `on` and `blink` override `off`; later `blink` overrides
            // earlier `on`; later `on` does NOT override earlier `blink`.
            Action::Off => self,
            Action::On => match self {
                Resolved::Blink { .. } => self,
                _ => Resolved::On,
            },
            Action::Blink { period_ms } => Resolved::Blink { period_ms },
        }
    }
}

/// Read the named `TrainState` field as a `FieldValue` the condition set can
/// compare against. Unknown field names evaluate to `Number(0.0)`, matching
/// the "unknown" sentinel the rest of the model carries.
pub fn read_field(state: &TrainState, field: &str) -> FieldValue {
    use FieldValue::*;
    match field {
        "speed_kmh" => Number(state.speed_kmh()),
        "speed_ms" => Number(state.speed_ms),
        "pressure_main_line" => Number(state.pressure_main_line),
        "pressure_brake_cylinder" => Number(state.pressure_brake_cylinder),
        "pressure_main_reservoir" => Number(state.pressure_main_reservoir),
        "current_a" => Number(state.current_a),
        "voltage_v" => Number(state.voltage_v),
        "rpm" => Number(state.rpm),
        "throttle_notch" => Number(state.throttle_notch as f64),
        "main_switch" => Bool(state.main_switch),
        "pantograph" => Bool(state.pantograph),
        "afb_active" => Bool(state.afb_active),
        "afb_target_kmh" => Number(state.afb_target_kmh),
        "max_speed_kmh" => Number(state.max_speed_kmh),
        "doors_left" => Bool(matches!(state.doors_left, crate::model::DoorState::Open | crate::model::DoorState::Opening)),
        "doors_right" => Bool(matches!(state.doors_right, crate::model::DoorState::Open | crate::model::DoorState::Opening)),
        "sifa.light" => Bool(state.sifa.light),
        "sifa.warning" => Lamp(match state.sifa.warning {
            crate::model::SifaWarning::Off => LampState::Off,
            crate::model::SifaWarning::Warn => LampState::On,
            crate::model::SifaWarning::Brake => LampState::Blink,
        }),
        "sifa.main_switch" => Bool(state.sifa.main_switch),
        "sifa.cut_in" => Bool(state.sifa.cut_in),
        "pzb.active" => Bool(state.pzb.active),
        "pzb.emergency" => Bool(state.pzb.emergency),
        "pzb.zugart_55" => Lamp(state.pzb.zugart_55),
        "pzb.zugart_70" => Lamp(state.pzb.zugart_70),
        "pzb.zugart_85" => Lamp(state.pzb.zugart_85),
        "pzb.hz_500" => Lamp(state.pzb.hz_500),
        "pzb.hz_1000" => Lamp(state.pzb.hz_1000),
        "pzb.befehl" => Bool(state.pzb.befehl),
        "lzb.active" => Bool(state.lzb.active),
        "lzb.ende" => Bool(state.lzb.ende),
        "lzb.lamp_g" => Lamp(state.lzb.lamp_g),
        "lzb.lamp_ende" => Lamp(state.lzb.lamp_ende),
        "lzb.lamp_ue" => Lamp(state.lzb.lamp_ue),
        "lzb.lamp_s" => Lamp(state.lzb.lamp_s),
        "lzb.lamp_b" => Bool(state.lzb.lamp_b),
        "lzb.lamp_el" => Bool(state.lzb.lamp_el),
        "lzb.lamp_v40" => Bool(state.lzb.lamp_v40),
        _ => Number(0.0),
    }
}

/// `⌊t·2/P⌋ mod 2 == 0` is lit for plain blink, inverted for blink-inverse.
/// `clock_ms` is an explicit parameter (not wall-clock time) so tests are
/// deterministic.
fn blink_lit(period_ms: u64, clock_ms: u64, invert: bool) -> bool {
    if period_ms == 0 {
        return !invert;
    }
    let phase_even = (clock_ms * 2 / period_ms) % 2 == 0;
    phase_even != invert
}

/// Half the shortest blink period currently active across `rules`, i.e. the
/// re-evaluation cadence the blink ticker must not exceed (spec §4.6). None
/// if no rule currently blinks.
pub fn min_blink_half_period_ms(rules: &[Rule], state: &TrainState) -> Option<u64> {
    rules
        .iter()
        .filter_map(|r| match r.action {
            Action::Blink { period_ms } if r.condition.matches(read_field(state, &r.source_field)) => {
                Some(period_ms / 2)
            }
            _ => None,
        })
        .min()
}

/// Evaluate every rule for every lamp and resolve to a final lit/unlit
/// output. Lamps with no matching rule are off.
pub fn evaluate(rules: &[Rule], state: &TrainState, clock_ms: u64) -> HashMap<LampId, bool> {
    let mut resolved: HashMap<LampId, Resolved> =
        LampId::ALL.into_iter().map(|l| (l, Resolved::Off)).collect();

    for rule in rules {
        let value = read_field(state, &rule.source_field);
        if rule.condition.matches(value) {
            let current = resolved.entry(rule.target_lamp).or_insert(Resolved::Off);
            *current = current.apply(rule.action);
        }
    }

    resolved
        .into_iter()
        .map(|(lamp, r)| {
            let lit = match r {
                Resolved::Off => false,
                Resolved::On => true,
                Resolved::Blink { period_ms } => blink_lit(period_ms, clock_ms, false),
            };
            (lamp, lit)
        })
        .collect()
}
