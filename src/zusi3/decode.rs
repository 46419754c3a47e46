//! Decodes a DATA_FTD node into field updates on a `TrainState`.
//!
//! Grounded on `zusi3_client.py::_process_ftd_data` / `_process_sifa` /
//! `_process_indusi_betriebsdaten` / `_process_tueren`.

use crate::model::TrainState;
use crate::zusi3::codec::Node;
use crate::zusi3::fsdata::{betriebsdaten_attr as bd, node_id, sifa_attr, tueren_attr, decode_door_state, decode_lamp, FsData};

/// Apply every top-level attribute and nested substate child in `ftd` onto
/// `state`. Returns whether anything changed, so the caller can decide
/// whether to emit a TrainState update notification (spec §4.2: "after each
/// message that modified state, emit exactly one update").
pub fn apply_data_ftd(state: &mut TrainState, ftd: &Node) -> bool {
    let mut changed = false;

    for attr in &ftd.attributes {
        let Some(fs_id) = FsData::from_id(attr.id) else { continue };
        changed = true;
        match fs_id {
            FsData::Geschwindigkeit => state.speed_ms = attr.as_f32().unwrap_or(0.0) as f64,
            FsData::DruckHauptluftleitung => {
                state.pressure_main_line = attr.as_f32().unwrap_or(0.0) as f64
            }
            FsData::DruckBremszylinder => {
                state.pressure_brake_cylinder = attr.as_f32().unwrap_or(0.0) as f64
            }
            FsData::DruckHauptluftbehaelter => {
                state.pressure_main_reservoir = attr.as_f32().unwrap_or(0.0) as f64
            }
            FsData::Oberstrom => state.current_a = attr.as_f32().unwrap_or(0.0) as f64,
            FsData::Fahrleitungsspannung => state.voltage_v = attr.as_f32().unwrap_or(0.0) as f64,
            FsData::Motordrehzahl => state.rpm = attr.as_f32().unwrap_or(0.0) as f64,
            FsData::UhrzeitStunde => state.hour = attr.as_f32().unwrap_or(0.0) as u8,
            FsData::UhrzeitMinute => state.minute = attr.as_f32().unwrap_or(0.0) as u8,
            FsData::UhrzeitSekunde => state.second = attr.as_f32().unwrap_or(0.0) as u8,
            FsData::Hauptschalter => state.main_switch = attr.as_f32().unwrap_or(0.0) > 0.0,
            FsData::Stromabnehmer => state.pantograph = attr.as_f32().unwrap_or(0.0) > 0.0,
            FsData::AfbEinAus => state.afb_active = attr.as_f32().unwrap_or(0.0) > 0.0,
            FsData::AfbSollGeschw => state.afb_target_kmh = attr.as_f32().unwrap_or(0.0) as f64 * 3.6,
            FsData::Streckenmaxgeschw => {
                state.max_speed_kmh = attr.as_f32().unwrap_or(0.0) as f64 * 3.6
            }
            FsData::Kilometrierung => {
                state.km_post = attr.as_f32().unwrap_or(0.0) as f64;
                state.has_km_post = true;
            }
            FsData::Fahrstufe => state.throttle_notch = attr.as_f32().unwrap_or(0.0) as i32,
            FsData::Sifa | FsData::StatusZugbeeinflussung | FsData::StatusTueren => {
                // These arrive as nested children, never as flat attributes.
            }
        }
    }

    for child in &ftd.children {
        if child.id == node_id::SIFA {
            apply_sifa(state, child);
            changed = true;
        } else if child.id == node_id::STATUS_ZUGBEEINFLUSSUNG {
            apply_zugbeeinflussung(state, child);
            changed = true;
        } else if child.id == node_id::STATUS_TUEREN {
            apply_tueren(state, child);
            changed = true;
        }
    }

    changed
}

fn apply_sifa(state: &mut TrainState, node: &Node) {
    for attr in &node.attributes {
        match attr.id {
            sifa_attr::LICHT => state.sifa.light = attr.as_u8().unwrap_or(0) > 0,
            sifa_attr::HUPE => {
                let hupe = attr.as_u8().unwrap_or(0);
                state.sifa.warning = match hupe {
                    1 => crate::model::SifaWarning::Warn,
                    2 => crate::model::SifaWarning::Brake,
                    _ => crate::model::SifaWarning::Off,
                };
            }
            sifa_attr::HAUPTSCHALTER => state.sifa.main_switch = attr.as_u8().unwrap_or(0) > 1,
            sifa_attr::STOERSCHALTER => state.sifa.fault_switch = attr.as_u8().unwrap_or(0) > 1,
            sifa_attr::LUFTABSPERRHAHN => state.sifa.air_cock = attr.as_u8().unwrap_or(0) > 1,
            _ => {}
        }
    }
}

fn apply_zugbeeinflussung(state: &mut TrainState, node: &Node) {
    if let Some(betriebsdaten) = node.child(bd::BETRIEBSDATEN_CHILD_ID) {
        apply_betriebsdaten(state, betriebsdaten);
    }
}

fn apply_betriebsdaten(state: &mut TrainState, node: &Node) {
    for attr in &node.attributes {
        match attr.id {
            bd::PZB_ZUSTAND => state.pzb.active = attr.as_u16().unwrap_or(0) == 5,
            bd::PZB_ZWANGSBREMSUNG => state.pzb.emergency = attr.as_u16().unwrap_or(0) > 0,
            bd::PZB_LM_1000HZ => state.pzb.hz_1000 = decode_lamp(attr.as_u8().unwrap_or(0)),
            bd::PZB_LM_O_85 => state.pzb.zugart_85 = decode_lamp(attr.as_u8().unwrap_or(0)),
            bd::PZB_LM_M_70 => state.pzb.zugart_70 = decode_lamp(attr.as_u8().unwrap_or(0)),
            bd::PZB_LM_U_55 => state.pzb.zugart_55 = decode_lamp(attr.as_u8().unwrap_or(0)),
            bd::PZB_LM_500HZ => state.pzb.hz_500 = decode_lamp(attr.as_u8().unwrap_or(0)),
            bd::PZB_LM_BEFEHL => state.pzb.befehl = attr.as_u8().unwrap_or(0) > 0,

            bd::LZB_ZUSTAND => state.lzb.active = attr.as_u16().unwrap_or(0) >= 1,
            bd::LZB_SOLLGESCHW => {
                state.lzb.target_speed_kmh = attr.as_f32().unwrap_or(0.0) as f64 * 3.6
            }
            bd::LZB_ZIELGESCHW => {
                state.lzb.aim_speed_kmh = attr.as_f32().unwrap_or(0.0) as f64 * 3.6
            }
            bd::LZB_ZIELWEG => state.lzb.aim_distance_m = attr.as_f32().unwrap_or(0.0) as f64,
            bd::LZB_LM_G => state.lzb.lamp_g = decode_lamp(attr.as_u8().unwrap_or(0)),
            bd::LZB_LM_ENDE => state.lzb.lamp_ende = decode_lamp(attr.as_u8().unwrap_or(0)),
            bd::LZB_LM_S => state.lzb.lamp_s = decode_lamp(attr.as_u8().unwrap_or(0)),
            bd::LZB_LM_UE => state.lzb.lamp_ue = decode_lamp(attr.as_u8().unwrap_or(0)),
            bd::LZB_LM_PRUEF_STOER => state.lzb.lamp_pruef_stoer = attr.as_u8().unwrap_or(0) > 0,
            bd::LZB_LM_B => state.lzb.lamp_b = attr.as_u8().unwrap_or(0) > 0,
            bd::LZB_LM_EL => state.lzb.lamp_el = attr.as_u8().unwrap_or(0) > 0,
            bd::LZB_LM_V40 => state.lzb.lamp_v40 = attr.as_u8().unwrap_or(0) > 0,
            _ => {}
        }
    }

    if let Some(ende) = node.child(bd::LZB_ENDE_CHILD_ID) {
        for attr in &ende.attributes {
            if attr.id == bd::LZB_ENDE_VERFAHREN {
                state.lzb.ende = attr.as_u8().unwrap_or(0) > 0;
            }
        }
    }
}

fn apply_tueren(state: &mut TrainState, node: &Node) {
    for attr in &node.attributes {
        match attr.id {
            tueren_attr::LINKS => state.doors_left = decode_door_state(attr.as_u8().unwrap_or(0)),
            tueren_attr::RECHTS => {
                state.doors_right = decode_door_state(attr.as_u8().unwrap_or(0))
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DoorState;
    use crate::zusi3::codec::Attribute;

    #[test]
    fn scenario_2_sifa_warn_sets_warning_field() {
        let mut state = TrainState::default();
        let sifa = Node::new(node_id::SIFA).with_attr(Attribute { id: sifa_attr::HUPE, payload: vec![1] });
        let ftd = Node::new(4).with_child(sifa);
        assert!(apply_data_ftd(&mut state, &ftd));
        assert_eq!(state.sifa.warning, crate::model::SifaWarning::Warn);
    }

    #[test]
    fn scenario_4_door_opening_sets_doors_left() {
        let mut state = TrainState::default();
        let tueren =
            Node::new(node_id::STATUS_TUEREN).with_attr(Attribute { id: tueren_attr::LINKS, payload: vec![2] });
        let ftd = Node::new(4).with_child(tueren);
        assert!(apply_data_ftd(&mut state, &ftd));
        assert_eq!(state.doors_left, DoorState::Open);
    }

    #[test]
    fn unknown_top_level_attribute_is_skipped_without_changed_flag() {
        let mut state = TrainState::default();
        let ftd = Node::new(4).with_attr(Attribute { id: 0xBEEF, payload: vec![1, 2] });
        assert!(!apply_data_ftd(&mut state, &ftd));
    }

    #[test]
    fn lzb_ende_nested_child_is_applied() {
        let mut state = TrainState::default();
        let ende_child = Node::new(bd::LZB_ENDE_CHILD_ID)
            .with_attr(Attribute { id: bd::LZB_ENDE_VERFAHREN, payload: vec![1] });
        let betriebsdaten = Node::new(bd::BETRIEBSDATEN_CHILD_ID).with_child(ende_child);
        let zb = Node::new(node_id::STATUS_ZUGBEEINFLUSSUNG).with_child(betriebsdaten);
        let ftd = Node::new(4).with_child(zb);
        apply_data_ftd(&mut state, &ftd);
        assert!(state.lzb.ende);
    }

    #[test]
    fn speed_converts_to_kmh_via_train_state_helper() {
        let mut state = TrainState::default();
        let ftd = Node::new(4).with_attr(Attribute {
            id: FsData::Geschwindigkeit.id(),
            payload: 10.0f32.to_le_bytes().to_vec(),
        });
        apply_data_ftd(&mut state, &ftd);
        assert!((state.speed_kmh() - 36.0).abs() < 1e-6);
    }
}
