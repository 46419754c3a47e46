//! Integration coverage for the TSW6 HTTP path-encoding rule together with
//! the well-known endpoint table it addresses, the way `Tsw6Poller` uses
//! both together every tick.

use serde_json::Value;

use tsw6_zusi3_bridge::model::TrainState;
use tsw6_zusi3_bridge::tsw6::http::encode_path;
use tsw6_zusi3_bridge::tsw6::profile_map::{detect_profile_id, WELL_KNOWN_ENDPOINTS};

#[test]
fn scenario_3_train_class_detection_from_a_wire_encoded_path_value() {
    // The path itself goes over the wire percent-encoded; the value it
    // resolves to is plain JSON and unaffected by path encoding.
    let encoded = encode_path("CurrentFormation/0.ObjectClass");
    assert_eq!(encoded, "CurrentFormation/0.ObjectClass");

    let object_class = "BR_442_Talent2_Variant";
    assert_eq!(detect_profile_id(object_class), Some("br442"));
}

#[test]
fn every_well_known_endpoint_path_encodes_to_itself() {
    // None of the well-known paths contain characters the encoder needs to
    // escape, so a poll cycle never needs to diverge between the cached key
    // and the wire path.
    for endpoint in WELL_KNOWN_ENDPOINTS {
        assert_eq!(encode_path(endpoint.path), endpoint.path);
    }
}

#[test]
fn p5_well_known_endpoints_apply_in_any_order_without_clobbering_unrelated_fields() {
    let mut state = TrainState::default();
    for endpoint in WELL_KNOWN_ENDPOINTS {
        (endpoint.apply)(&mut state, &Value::from(true));
    }
    // Speed endpoint is a number path; applying `true` to it coerces via
    // `as_f64` to the "unknown" sentinel rather than panicking.
    assert_eq!(state.speed_ms, 0.0);
    assert!(state.pzb.active);
    // bIsIsolated runs after bIsEnabled in the table and clears `active`
    // again when isolated is reported true.
    assert!(!state.lzb.active);
}

#[test]
fn reserved_characters_in_a_path_segment_are_escaped_but_separators_survive() {
    let path = "Some Node/weird&segment.Leaf Name";
    let encoded = encode_path(path);
    assert_eq!(encoded, "Some%20Node/weird%26segment.Leaf%20Name");
}
