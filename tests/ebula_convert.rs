//! Integration coverage spanning the EBuLa recorder, converter, and
//! persistence layer together, the way `Supervisor::persist_recording`
//! chains them after a run finishes.

use tsw6_zusi3_bridge::ebula::convert::convert;
use tsw6_zusi3_bridge::ebula::recorder::{haversine_m, RecordingSample, RouteRecorder};
use tsw6_zusi3_bridge::ebula::timetable::{load_timetable, save_timetable, EntryType};
use tsw6_zusi3_bridge::model::{DoorState, TrainState};

#[test]
fn p6_haversine_round_trip_over_a_closed_loop_returns_within_a_metre() {
    let a = (13.4, 52.5);
    let b = (13.41, 52.51);
    let out = haversine_m(a.0, a.1, b.0, b.1);
    let back = haversine_m(b.0, b.1, a.0, a.1);
    assert!((out - back).abs() < 1.0);
}

#[test]
fn recorder_integrates_distance_across_real_movement_between_samples() {
    let mut recorder = RouteRecorder::new();
    let mut state = TrainState::default();
    state.gps_lon = Some(13.40);
    state.gps_lat = Some(52.50);
    state.speed_ms = 20.0;
    recorder.sample(0, &state);

    state.gps_lat = Some(52.501);
    recorder.sample(1_000, &state);

    state.gps_lat = Some(52.502);
    recorder.sample(2_000, &state);

    let samples = recorder.samples();
    assert_eq!(samples.len(), 3);
    assert!(samples[2].cumulative_distance_m > samples[1].cumulative_distance_m);
    assert!(samples[1].cumulative_distance_m > 0.0);
}

fn stop_sample(t_ms: u64, km: f64) -> RecordingSample {
    RecordingSample {
        t_ms,
        lon: 13.4,
        lat: 52.5,
        v_kmh: 0.0,
        v_limit_kmh: 80.0,
        gradient_permille: 0.0,
        signal: false,
        doors_open: true,
        cumulative_distance_m: km * 1000.0,
    }
}

#[test]
fn scenario_5_a_full_recording_converts_and_persists_to_disk() {
    let samples = vec![stop_sample(0, 25.0), stop_sample(10_000, 25.0), stop_sample(20_000, 25.0)];
    let timetable = convert(&samples, "Berlin-Hamburg", "Berlin Hbf", "Hamburg Hbf", "2026-07-28T08:00:00Z");

    let stations: Vec<_> = timetable.entries.iter().filter(|e| e.entry_type == EntryType::Station).collect();
    assert_eq!(stations.len(), 1);
    assert_eq!(stations[0].km, 25.0);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("berlin-hamburg.ebula.json");
    save_timetable(&timetable, &path).unwrap();
    let loaded = load_timetable(&path).unwrap();

    assert_eq!(loaded.route_info.name, "Berlin-Hamburg");
    assert_eq!(loaded.entries.len(), timetable.entries.len());
}

#[test]
fn doors_open_state_variants_both_count_as_open_for_dwell_detection() {
    let mut state = TrainState::default();
    state.doors_left = DoorState::Opening;
    let mut recorder = RouteRecorder::new();
    state.gps_lon = Some(1.0);
    state.gps_lat = Some(1.0);
    recorder.sample(0, &state);
    assert!(recorder.samples()[0].doors_open);
}
