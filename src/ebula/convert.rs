//! Recording → timetable conversion (C11): segments a `RouteRecorder`'s
//! samples into station/speed-change/gradient-change/waypoint entries.
//!
//! Grounded on `ebula_recorder.py::RecordingConverter`.

use crate::ebula::recorder::RecordingSample;
use crate::ebula::timetable::{EBuLaEntry, EBuLaRouteInfo, EBuLaTimetable, EntryType};

const STATIONARY_SPEED_KMH: f64 = 1.0;
const STATION_DWELL_MS: u64 = 15_000;
const SPEED_CHANGE_THRESHOLD_KMH: f64 = 5.0;
const GRADIENT_CHANGE_THRESHOLD_PERMILLE: f64 = 2.0;
const WAYPOINT_INTERVAL_M: f64 = 1_000.0;

fn format_hh_mm(t_ms: u64) -> String {
    let total_minutes = t_ms / 60_000;
    format!("{:02}:{:02}", (total_minutes / 60) % 24, total_minutes % 60)
}

/// Convert a completed recording into a persistable timetable. `route_name`,
/// `start_station`, `end_station` are user-supplied since TSW6 does not
/// expose route metadata over its API (spec §4.10/§6).
pub fn convert(
    samples: &[RecordingSample],
    route_name: &str,
    start_station: &str,
    end_station: &str,
    recorded_at: &str,
) -> EBuLaTimetable {
    let mut entries = Vec::new();
    let mut station_counter = 0;
    let mut dwell_start_ms: Option<u64> = None;
    let mut station_emitted_for_dwell = false;
    let mut last_speed_limit: Option<f64> = None;
    let mut last_gradient: Option<f64> = None;
    let mut last_waypoint_km = 0.0f64;

    for sample in samples {
        let stationary = sample.v_kmh <= STATIONARY_SPEED_KMH;

        if stationary && sample.doors_open {
            let start = *dwell_start_ms.get_or_insert(sample.t_ms);
            if !station_emitted_for_dwell && sample.t_ms.saturating_sub(start) >= STATION_DWELL_MS {
                station_counter += 1;
                entries.push(EBuLaEntry {
                    entry_type: EntryType::Station,
                    km: sample.cumulative_distance_m / 1000.0,
                    hh_mm: format_hh_mm(start),
                    station_name: Some(format!("Station {station_counter}")),
                    speed_limit_kmh: None,
                    gradient_permille: None,
                });
                station_emitted_for_dwell = true;
            }
        } else {
            dwell_start_ms = None;
            station_emitted_for_dwell = false;
        }

        if last_speed_limit.map_or(true, |prev| (sample.v_limit_kmh - prev).abs() >= SPEED_CHANGE_THRESHOLD_KMH) {
            entries.push(EBuLaEntry {
                entry_type: EntryType::Speed,
                km: sample.cumulative_distance_m / 1000.0,
                hh_mm: format_hh_mm(sample.t_ms),
                station_name: None,
                speed_limit_kmh: Some(sample.v_limit_kmh),
                gradient_permille: None,
            });
            last_speed_limit = Some(sample.v_limit_kmh);
        }

        if last_gradient
            .map_or(true, |prev| (sample.gradient_permille - prev).abs() >= GRADIENT_CHANGE_THRESHOLD_PERMILLE)
        {
            entries.push(EBuLaEntry {
                entry_type: EntryType::Gradient,
                km: sample.cumulative_distance_m / 1000.0,
                hh_mm: format_hh_mm(sample.t_ms),
                station_name: None,
                speed_limit_kmh: None,
                gradient_permille: Some(sample.gradient_permille),
            });
            last_gradient = Some(sample.gradient_permille);
        }

        let km = sample.cumulative_distance_m / 1000.0;
        if km - last_waypoint_km >= WAYPOINT_INTERVAL_M / 1000.0 {
            entries.push(EBuLaEntry {
                entry_type: EntryType::Waypoint,
                km,
                hh_mm: format_hh_mm(sample.t_ms),
                station_name: None,
                speed_limit_kmh: None,
                gradient_permille: None,
            });
            last_waypoint_km = km;
        }
    }

    let distance_km = samples.last().map(|s| s.cumulative_distance_m / 1000.0).unwrap_or(0.0);

    EBuLaTimetable {
        route_info: EBuLaRouteInfo {
            name: route_name.to_string(),
            distance_km,
            start_station: start_station.to_string(),
            end_station: end_station.to_string(),
        },
        entries,
        recorded_at: recorded_at.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t_ms: u64, v_kmh: f64, doors_open: bool, km: f64) -> RecordingSample {
        RecordingSample {
            t_ms,
            lon: 0.0,
            lat: 0.0,
            v_kmh,
            v_limit_kmh: 80.0,
            gradient_permille: 0.0,
            signal: false,
            doors_open,
            cumulative_distance_m: km * 1000.0,
        }
    }

    #[test]
    fn scenario_5_station_dwell_past_15s_emits_one_station_entry() {
        let samples = vec![
            sample(0, 0.0, true, 10.0),
            sample(5_000, 0.0, true, 10.0),
            sample(15_001, 0.0, true, 10.0),
        ];
        let tt = convert(&samples, "Test", "A", "B", "2026-01-01T00:00:00Z");
        let stations: Vec<_> = tt.entries.iter().filter(|e| e.entry_type == EntryType::Station).collect();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].station_name.as_deref(), Some("Station 1"));
    }

    #[test]
    fn short_dwell_under_15s_emits_no_station() {
        let samples = vec![sample(0, 0.0, true, 10.0), sample(10_000, 0.0, true, 10.0)];
        let tt = convert(&samples, "Test", "A", "B", "2026-01-01T00:00:00Z");
        assert!(tt.entries.iter().all(|e| e.entry_type != EntryType::Station));
    }

    #[test]
    fn waypoint_emitted_every_1000m() {
        let samples = vec![sample(0, 50.0, false, 0.0), sample(1_000, 50.0, false, 1.0)];
        let tt = convert(&samples, "Test", "A", "B", "2026-01-01T00:00:00Z");
        assert!(tt.entries.iter().any(|e| e.entry_type == EntryType::Waypoint));
    }
}
