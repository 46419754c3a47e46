//! Unified train-state model, lamp identifiers, and the profile/rule shapes
//! the condition engine evaluates against.

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::rules::condition::{Action, Condition};

/// A four-state visual indicator carried verbatim by the Zusi3 protocol and
/// consumed by the rule engine's `blink_value` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum LampState {
    #[default]
    Off = 0,
    On = 1,
    Blink = 2,
    BlinkInverse = 3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Reverser {
    Forward,
    #[default]
    Neutral,
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DoorState {
    #[default]
    Closed,
    Opening,
    Open,
    Locked,
    Closing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SifaWarning {
    #[default]
    Off,
    Warn,
    Brake,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SifaState {
    pub light: bool,
    pub warning: SifaWarning,
    pub main_switch: bool,
    pub fault_switch: bool,
    pub air_cock: bool,
    pub cut_in: bool,
    pub minimum_speed_met: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PzbState {
    pub active: bool,
    pub zugart_55: LampState,
    pub zugart_70: LampState,
    pub zugart_85: LampState,
    pub u: bool,
    pub m: bool,
    pub o: bool,
    pub hz_1000: LampState,
    pub hz_500: LampState,
    pub befehl: bool,
    pub emergency: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LzbState {
    pub active: bool,
    pub ende: bool,
    pub target_speed_kmh: f64,
    pub aim_speed_kmh: f64,
    pub aim_distance_m: f64,
    pub lamp_g: LampState,
    pub lamp_ende: LampState,
    pub lamp_ue: LampState,
    pub lamp_s: LampState,
    pub lamp_b: bool,
    pub lamp_el: bool,
    pub lamp_v40: bool,
    pub lamp_pruef_stoer: bool,
}

/// The common representation both Zusi3 and TSW6 converge on. For fields a
/// source cannot provide, the "unknown" sentinel (false/0.0) is carried,
/// with a parallel has-* flag only where semantics require it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrainState {
    // Motion
    pub speed_ms: f64,
    pub distance_travelled_m: f64,

    // Pressures (bar)
    pub pressure_main_line: f64,
    pub pressure_brake_cylinder: f64,
    pub pressure_main_reservoir: f64,

    // Electrical
    pub current_a: f64,
    pub voltage_v: f64,
    pub rpm: f64,

    // Controls
    pub throttle_notch: i32,
    pub reverser: Reverser,
    pub main_switch: bool,
    pub pantograph: bool,
    pub afb_active: bool,
    pub afb_target_kmh: f64,
    pub max_speed_kmh: f64,

    // Doors
    pub doors_left: DoorState,
    pub doors_right: DoorState,

    // Sub-states
    pub sifa: SifaState,
    pub pzb: PzbState,
    pub lzb: LzbState,

    // Position
    pub km_post: f64,
    pub has_km_post: bool,
    pub gps_lon: Option<f64>,
    pub gps_lat: Option<f64>,

    // Time of day
    pub hour: u8,
    pub minute: u8,
    pub second: u8,

    // Route (EBuLa recorder inputs; no Zusi3 FsData id exists for either,
    // so the Zusi3 source leaves both at the unknown sentinel)
    pub gradient_permille: f64,
    pub signal_clear: bool,
}

impl TrainState {
    /// km/h derived from `speed_ms`.
    pub fn speed_kmh(&self) -> f64 {
        self.speed_ms * 3.6
    }

    /// Reset to the "unknown" sentinel, as the supervisor does when its
    /// active source disconnects (spec §7: transport-closed/timeout).
    pub fn blank(&mut self) {
        *self = TrainState::default();
    }
}

/// A closed set of twelve opaque lamp identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LampId {
    Led1,
    Led2,
    Led3,
    Led4,
    Led5,
    Led6,
    Led7,
    Led8,
    Led9,
    Led10,
    Led11,
    Led12,
}

impl LampId {
    pub const ALL: [LampId; 12] = [
        LampId::Led1,
        LampId::Led2,
        LampId::Led3,
        LampId::Led4,
        LampId::Led5,
        LampId::Led6,
        LampId::Led7,
        LampId::Led8,
        LampId::Led9,
        LampId::Led10,
        LampId::Led11,
        LampId::Led12,
    ];

    /// 1-based wire number as sent in `LED:<n>:<s>\n`.
    pub fn wire_number(self) -> u8 {
        match self {
            LampId::Led1 => 1,
            LampId::Led2 => 2,
            LampId::Led3 => 3,
            LampId::Led4 => 4,
            LampId::Led5 => 5,
            LampId::Led6 => 6,
            LampId::Led7 => 7,
            LampId::Led8 => 8,
            LampId::Led9 => 9,
            LampId::Led10 => 10,
            LampId::Led11 => 11,
            LampId::Led12 => 12,
        }
    }

    pub fn from_wire_number(n: u8) -> Option<LampId> {
        LampId::ALL.into_iter().find(|l| l.wire_number() == n)
    }

    pub fn descriptor(self) -> &'static LampDescriptor {
        &DESCRIPTORS[self as usize]
    }
}

/// Immutable per-lamp metadata (name, color, short caption).
#[derive(Debug, Clone, Copy)]
pub struct LampDescriptor {
    pub name: &'static str,
    pub color: &'static str,
    pub caption: &'static str,
}

/// Grounded on `arduino_bridge.py`'s Charlieplexing panel layout.
pub const DESCRIPTORS: [LampDescriptor; 12] = [
    LampDescriptor { name: "SIFA", color: "yellow", caption: "SIFA" },
    LampDescriptor { name: "LZB Ende", color: "yellow", caption: "Ende" },
    LampDescriptor { name: "PZB 70", color: "blue", caption: "70" },
    LampDescriptor { name: "PZB 85", color: "blue", caption: "85" },
    LampDescriptor { name: "PZB 55", color: "blue", caption: "55" },
    LampDescriptor { name: "500 Hz", color: "red", caption: "500" },
    LampDescriptor { name: "1000 Hz", color: "yellow", caption: "1000" },
    LampDescriptor { name: "Doors left", color: "yellow", caption: "Tl" },
    LampDescriptor { name: "Doors right", color: "yellow", caption: "Tr" },
    LampDescriptor { name: "LZB Ü", color: "blue", caption: "Ü" },
    LampDescriptor { name: "LZB G", color: "blue", caption: "G" },
    LampDescriptor { name: "LZB S", color: "red", caption: "S" },
];

/// A single entry in a `Profile`'s rule set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub source_field: String,
    pub condition: Condition,
    pub action: Action,
    pub target_lamp: LampId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Zusi3,
    Tsw6,
}

/// An ordered set of rules plus a display name and source type. Loaded and
/// persisted by an external collaborator; the core only consumes the
/// already-parsed value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub source: SourceKind,
    pub rules: Vec<Rule>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl Profile {
    /// Clamp a configured poll interval to a 50ms floor and a generous
    /// upper bound so a misconfigured profile can't stall the bridge
    /// indefinitely.
    pub fn clamped_poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms.clamp(50, 5_000)
    }
}

/// A single cached TSW6 endpoint value.
#[derive(Debug, Clone)]
pub struct EndpointValue {
    pub path: String,
    pub value: Option<serde_json::Value>,
    pub timestamp: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lamp_wire_numbers_are_1_based_and_bijective() {
        for lamp in LampId::ALL {
            let n = lamp.wire_number();
            assert!((1..=12).contains(&n));
            assert_eq!(LampId::from_wire_number(n), Some(lamp));
        }
    }

    #[test]
    fn blank_resets_to_sentinels() {
        let mut s = TrainState::default();
        s.speed_ms = 42.0;
        s.main_switch = true;
        s.blank();
        assert_eq!(s.speed_ms, 0.0);
        assert!(!s.main_switch);
    }

    #[test]
    fn profile_clamps_poll_interval() {
        let mut p = Profile {
            id: "x".into(),
            name: "x".into(),
            source: SourceKind::Tsw6,
            rules: vec![],
            poll_interval_ms: 1,
        };
        assert_eq!(p.clamped_poll_interval_ms(), 50);
        p.poll_interval_ms = 999_999;
        assert_eq!(p.clamped_poll_interval_ms(), 5_000);
    }
}
