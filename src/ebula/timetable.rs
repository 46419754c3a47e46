//! EBuLa timetable document model and persistence, grounded on
//! `ebula_data.py`'s `EBuLaTimetable`/`EBuLaEntry` dataclasses.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Station,
    Speed,
    Gradient,
    Waypoint,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EBuLaEntry {
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub km: f64,
    pub hh_mm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub station_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_limit_kmh: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gradient_permille: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EBuLaRouteInfo {
    pub name: String,
    pub distance_km: f64,
    pub start_station: String,
    pub end_station: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EBuLaTimetable {
    pub route_info: EBuLaRouteInfo,
    pub entries: Vec<EBuLaEntry>,
    pub recorded_at: String,
}

/// `~/.tsw6_arduino_bridge/ebula/` — mirrors `ebula_data.py::EBULA_DIR`, the
/// user-config location timetables and raw recordings are written under.
pub fn ebula_dir() -> Result<PathBuf, BridgeError> {
    let home = dirs::home_dir()
        .ok_or_else(|| BridgeError::IoStorage("could not determine home directory".into()))?;
    Ok(home.join(".tsw6_arduino_bridge").join("ebula"))
}

pub fn save_timetable(timetable: &EBuLaTimetable, path: &Path) -> Result<(), BridgeError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| BridgeError::IoStorage(format!("creating {}: {e}", parent.display())))?;
    }
    let json = serde_json::to_string_pretty(timetable)
        .map_err(|e| BridgeError::IoStorage(format!("serializing timetable: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| BridgeError::IoStorage(format!("writing {}: {e}", path.display())))
}

pub fn load_timetable(path: &Path) -> Result<EBuLaTimetable, BridgeError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| BridgeError::IoStorage(format!("reading {}: {e}", path.display())))?;
    serde_json::from_str(&json)
        .map_err(|e| BridgeError::IoStorage(format!("parsing {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timetable_round_trips_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.ebula.json");
        let tt = EBuLaTimetable {
            route_info: EBuLaRouteInfo {
                name: "Test Run".into(),
                distance_km: 12.3,
                start_station: "A".into(),
                end_station: "B".into(),
            },
            entries: vec![EBuLaEntry {
                entry_type: EntryType::Station,
                km: 0.0,
                hh_mm: "08:00".into(),
                station_name: Some("Station 1".into()),
                speed_limit_kmh: None,
                gradient_permille: None,
            }],
            recorded_at: "2026-01-01T08:00:00Z".into(),
        };
        save_timetable(&tt, &path).unwrap();
        let loaded = load_timetable(&path).unwrap();
        assert_eq!(loaded.route_info.name, "Test Run");
        assert_eq!(loaded.entries.len(), 1);
    }
}
