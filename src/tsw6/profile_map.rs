//! The well-known TSW6 endpoint set and its mapping onto `TrainState`
//! fields, grounded on `scan_train.py`'s concrete path list.

use serde_json::Value;

use crate::model::{DoorState, LampState, Rule, SifaWarning, TrainState};

/// One well-known (path, field-setter) pair polled every tick regardless of
/// the active profile's own rules.
#[derive(Clone, Copy)]
pub struct WellKnownEndpoint {
    pub path: &'static str,
    pub apply: fn(&mut TrainState, &Value),
}

fn as_f64(v: &Value) -> f64 {
    v.as_f64().unwrap_or(0.0)
}

fn as_bool(v: &Value) -> bool {
    v.as_bool().unwrap_or(false)
}

fn mfa_lamp(v: &Value) -> LampState {
    if as_bool(v) {
        LampState::On
    } else {
        LampState::Off
    }
}

pub const WELL_KNOWN_ENDPOINTS: &[WellKnownEndpoint] = &[
    WellKnownEndpoint {
        path: "CurrentDrivableActor.Function.HUD_GetSpeed",
        apply: |s, v| s.speed_ms = as_f64(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/BP_Sifa_Service.Property.bActiveState",
        apply: |s, v| s.sifa.main_switch = as_bool(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/BP_Sifa_Service.Property.WarningStateVisual",
        apply: |s, v| {
            s.sifa.warning = if as_bool(v) { SifaWarning::Warn } else { SifaWarning::Off };
        },
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/BP_Sifa_Service.Property.bIsCutIn",
        apply: |s, v| s.sifa.cut_in = as_bool(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/PZB_V3.Property.bIsPZB_Active",
        apply: |s, v| s.pzb.active = as_bool(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/PZB_V3.Property._InEmergency",
        apply: |s, v| s.pzb.emergency = as_bool(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/LZB.Property.bIsEnabled",
        apply: |s, v| s.lzb.active = as_bool(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/LZB.Property.bIsIsolated",
        apply: |s, v| s.lzb.active = !as_bool(v) && s.lzb.active,
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/MFA_Indicators.Property.1000Hz_IsActive_PZB",
        apply: |s, v| s.pzb.hz_1000 = mfa_lamp(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/MFA_Indicators.Property.500Hz_IsActive",
        apply: |s, v| s.pzb.hz_500 = mfa_lamp(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/MFA_Indicators.Property.85_IsActive_PZB",
        apply: |s, v| s.pzb.zugart_85 = mfa_lamp(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/MFA_Indicators.Property.70_IsActive_PZB",
        apply: |s, v| s.pzb.zugart_70 = mfa_lamp(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/MFA_Indicators.Property.55_IsActive_PZB",
        apply: |s, v| s.pzb.zugart_55 = mfa_lamp(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/MFA_Indicators.Property.B_IsActive",
        apply: |s, v| s.lzb.lamp_b = as_bool(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/MFA_Indicators.Property.S_IsActive_PZB",
        apply: |s, v| s.lzb.lamp_s = mfa_lamp(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0/MFA_Indicators.Property.G_IsActive_LZB",
        apply: |s, v| s.lzb.lamp_g = mfa_lamp(v),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0.Property.bDoorsOpenLeft",
        apply: |s, v| s.doors_left = decode_tsw6_door(as_bool(v)),
    },
    WellKnownEndpoint {
        path: "CurrentFormation/0.Property.bDoorsOpenRight",
        apply: |s, v| s.doors_right = decode_tsw6_door(as_bool(v)),
    },
    WellKnownEndpoint {
        path: "TimeOfDay.Data",
        apply: |s, v| {
            s.hour = v.get("Hour").and_then(Value::as_u64).unwrap_or(0) as u8;
            s.minute = v.get("Minute").and_then(Value::as_u64).unwrap_or(0) as u8;
            s.second = v.get("Second").and_then(Value::as_u64).unwrap_or(0) as u8;
        },
    },
    WellKnownEndpoint {
        path: "CurrentDrivableActor.Function.HUD_GetGradient",
        apply: |s, v| s.gradient_permille = as_f64(v),
    },
    WellKnownEndpoint {
        path: "CurrentDrivableActor.Function.HUD_GetNextSignal",
        apply: |s, v| s.signal_clear = as_bool(v),
    },
];

/// Additional (source_field, endpoint) pairs polled only when the active
/// profile has a rule referencing that field — the profile-rule-derived
/// half of spec §4.4's "(path, decode-hint) pairs derived from the active
/// profile's rules." Kept separate from `WELL_KNOWN_ENDPOINTS` because
/// these fields aren't useful to poll unconditionally.
pub const RULE_FIELD_ENDPOINTS: &[(&str, WellKnownEndpoint)] = &[
    (
        "max_speed_kmh",
        WellKnownEndpoint {
            path: "CurrentFormation/0/LZB.Property.FormationMaxSpeed",
            apply: |s, v| s.max_speed_kmh = as_f64(v),
        },
    ),
    (
        "lzb.ende",
        WellKnownEndpoint {
            path: "CurrentFormation/0/LZB.Property.EndeState",
            apply: |s, v| s.lzb.ende = as_bool(v),
        },
    ),
    (
        "lzb.lamp_ende",
        WellKnownEndpoint {
            path: "CurrentFormation/0/MFA_Indicators.Property.Ende_IsActive",
            apply: |s, v| s.lzb.lamp_ende = mfa_lamp(v),
        },
    ),
    (
        "lzb.lamp_ue",
        WellKnownEndpoint {
            path: "CurrentFormation/0/MFA_Indicators.Property.\u{dc}_IsActive",
            apply: |s, v| s.lzb.lamp_ue = mfa_lamp(v),
        },
    ),
    (
        "lzb.lamp_el",
        WellKnownEndpoint {
            path: "CurrentFormation/0/MFA_Indicators.Property.EL_IsActive",
            apply: |s, v| s.lzb.lamp_el = as_bool(v),
        },
    ),
    (
        "lzb.lamp_v40",
        WellKnownEndpoint {
            path: "CurrentFormation/0/MFA_Indicators.Property.V40_IsActive",
            apply: |s, v| s.lzb.lamp_v40 = as_bool(v),
        },
    ),
    (
        "pzb.befehl",
        WellKnownEndpoint {
            path: "CurrentFormation/0/MFA_Indicators.Property.Befehl40_IsActive_PZB",
            apply: |s, v| s.pzb.befehl = as_bool(v),
        },
    ),
];

/// Derive the extra endpoints a profile's rules need beyond the well-known
/// set, deduplicated by path (spec §4.4).
pub fn endpoints_for_rules(rules: &[Rule]) -> Vec<WellKnownEndpoint> {
    let mut out: Vec<WellKnownEndpoint> = Vec::new();
    for rule in rules {
        if let Some((_, endpoint)) =
            RULE_FIELD_ENDPOINTS.iter().find(|(field, _)| *field == rule.source_field)
        {
            if !out.iter().any(|e| e.path == endpoint.path) {
                out.push(*endpoint);
            }
        }
    }
    out
}

pub const TRAIN_CLASS_ENDPOINT: &str = "CurrentFormation/0.ObjectClass";

/// Fuzzy substring match of the `ObjectClass` string against a built-in
/// table, surfacing a recommended profile id without switching
/// automatically (spec §4.4).
pub fn detect_profile_id(object_class: &str) -> Option<&'static str> {
    let lower = object_class.to_lowercase();
    const TABLE: &[(&str, &str)] = &[
        ("br_442", "br442"),
        ("br442", "br442"),
        ("talent2", "br442"),
        ("br_101", "br101"),
        ("br101", "br101"),
        ("br_218", "br218"),
        ("br218", "br218"),
    ];
    TABLE.iter().find(|(needle, _)| lower.contains(needle)).map(|(_, id)| *id)
}

/// TSW6 reports each door side as a plain open/closed boolean, with no
/// opening/closing/locked distinction; the two door endpoints above both
/// go through this to land on the shared `DoorState` enum.
pub fn decode_tsw6_door(open: bool) -> DoorState {
    if open {
        DoorState::Open
    } else {
        DoorState::Closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_3_tsw6_train_class_detect() {
        assert_eq!(detect_profile_id("BR_442_Talent2_Variant"), Some("br442"));
    }

    #[test]
    fn unrecognized_object_class_returns_none() {
        assert_eq!(detect_profile_id("Some_Unknown_Loco"), None);
    }

    #[test]
    fn well_known_endpoint_applies_speed() {
        let mut state = TrainState::default();
        let speed_endpoint = WELL_KNOWN_ENDPOINTS
            .iter()
            .find(|e| e.path == "CurrentDrivableActor.Function.HUD_GetSpeed")
            .unwrap();
        (speed_endpoint.apply)(&mut state, &Value::from(27.5));
        assert_eq!(state.speed_ms, 27.5);
    }

    #[test]
    fn well_known_endpoint_applies_doors_and_time_of_day() {
        let mut state = TrainState::default();
        let left = WELL_KNOWN_ENDPOINTS
            .iter()
            .find(|e| e.path == "CurrentFormation/0.Property.bDoorsOpenLeft")
            .unwrap();
        (left.apply)(&mut state, &Value::from(true));
        assert_eq!(state.doors_left, DoorState::Open);

        let tod = WELL_KNOWN_ENDPOINTS.iter().find(|e| e.path == "TimeOfDay.Data").unwrap();
        (tod.apply)(&mut state, &serde_json::json!({"Hour": 13, "Minute": 5, "Second": 30}));
        assert_eq!((state.hour, state.minute, state.second), (13, 5, 30));
    }

    #[test]
    fn endpoints_for_rules_derives_and_dedupes_by_path() {
        use crate::rules::condition::{Action, Condition};
        use crate::model::LampId;

        let rules = vec![
            Rule {
                source_field: "lzb.ende".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led1,
            },
            Rule {
                source_field: "lzb.ende".into(),
                condition: Condition::IsFalse,
                action: Action::Off,
                target_lamp: LampId::Led2,
            },
            Rule {
                source_field: "speed_kmh".into(),
                condition: Condition::IsTrue,
                action: Action::On,
                target_lamp: LampId::Led3,
            },
        ];
        let endpoints = endpoints_for_rules(&rules);
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].path, "CurrentFormation/0/LZB.Property.EndeState");
    }
}
