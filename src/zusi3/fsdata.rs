//! Zusi3's Führerstand data identifier space (FsData) and the default
//! subscription set, grounded on the FsData ids enumerated in spec §6 and
//! `zusi3_client.py::_get_default_fs_data`.

/// Top-level FsData attribute ids (subscribed under the 0x0A Fuehrerstand
/// child of NEEDED_DATA).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
#[allow(non_camel_case_types)]
pub enum FsData {
    Geschwindigkeit = 1,
    DruckHauptluftleitung = 2,
    DruckBremszylinder = 3,
    DruckHauptluftbehaelter = 4,
    Oberstrom = 13,
    Fahrleitungsspannung = 14,
    Motordrehzahl = 15,
    UhrzeitStunde = 16,
    UhrzeitMinute = 17,
    UhrzeitSekunde = 18,
    Hauptschalter = 19,
    Fahrstufe = 21,
    AfbSollGeschw = 23,
    Streckenmaxgeschw = 25,
    AfbEinAus = 54,
    Stromabnehmer = 85,
    Sifa = 100,
    StatusZugbeeinflussung = 101,
    StatusTueren = 102,
    Kilometrierung = 97,
}

impl FsData {
    pub fn from_id(id: u16) -> Option<FsData> {
        use FsData::*;
        Some(match id {
            1 => Geschwindigkeit,
            2 => DruckHauptluftleitung,
            3 => DruckBremszylinder,
            4 => DruckHauptluftbehaelter,
            13 => Oberstrom,
            14 => Fahrleitungsspannung,
            15 => Motordrehzahl,
            16 => UhrzeitStunde,
            17 => UhrzeitMinute,
            18 => UhrzeitSekunde,
            19 => Hauptschalter,
            21 => Fahrstufe,
            23 => AfbSollGeschw,
            25 => Streckenmaxgeschw,
            54 => AfbEinAus,
            85 => Stromabnehmer,
            100 => Sifa,
            101 => StatusZugbeeinflussung,
            102 => StatusTueren,
            97 => Kilometrierung,
            _ => return None,
        })
    }

    pub fn id(self) -> u16 {
        self as u16
    }
}

/// The default subscription set sent in NEEDED_DATA on connect.
pub const DEFAULT_SUBSCRIPTION: &[FsData] = &[
    FsData::Geschwindigkeit,
    FsData::DruckHauptluftleitung,
    FsData::DruckBremszylinder,
    FsData::DruckHauptluftbehaelter,
    FsData::Oberstrom,
    FsData::Fahrleitungsspannung,
    FsData::Motordrehzahl,
    FsData::UhrzeitStunde,
    FsData::UhrzeitMinute,
    FsData::UhrzeitSekunde,
    FsData::Hauptschalter,
    FsData::Stromabnehmer,
    FsData::AfbEinAus,
    FsData::AfbSollGeschw,
    FsData::Streckenmaxgeschw,
    FsData::Fahrstufe,
    FsData::Sifa,
    FsData::StatusZugbeeinflussung,
    FsData::StatusTueren,
    FsData::Kilometrierung,
];

/// SIFA (0x64) sub-attribute ids, nested under the Sifa child node.
pub mod sifa_attr {
    pub const LICHT: u16 = 2;
    pub const HUPE: u16 = 3;
    pub const HAUPTSCHALTER: u16 = 4;
    pub const STOERSCHALTER: u16 = 5;
    pub const LUFTABSPERRHAHN: u16 = 6;
}

/// STATUS_ZUGBEEINFLUSSUNG (0x65) nested Betriebsdaten (child id 3)
/// sub-attribute ids, grounded on `zusi3_client.py::_process_indusi_betriebsdaten`.
pub mod betriebsdaten_attr {
    pub const BETRIEBSDATEN_CHILD_ID: u16 = 3;

    pub const PZB_ZUSTAND: u16 = 2;
    pub const PZB_ZWANGSBREMSUNG: u16 = 3;
    pub const PZB_LM_1000HZ: u16 = 0x2f;
    pub const PZB_LM_O_85: u16 = 0x30;
    pub const PZB_LM_M_70: u16 = 0x31;
    pub const PZB_LM_U_55: u16 = 0x32;
    pub const PZB_LM_500HZ: u16 = 0x33;
    pub const PZB_LM_BEFEHL: u16 = 0x34;

    pub const LZB_ZUSTAND: u16 = 0x0d;
    pub const LZB_SOLLGESCHW: u16 = 0x21;
    pub const LZB_ZIELGESCHW: u16 = 0x22;
    pub const LZB_ZIELWEG: u16 = 0x23;
    pub const LZB_LM_G: u16 = 0x24;
    pub const LZB_LM_PRUEF_STOER: u16 = 0x25;
    pub const LZB_LM_B: u16 = 0x3b;
    pub const LZB_LM_UE: u16 = 0x3c;
    pub const LZB_LM_EL: u16 = 0x3d;
    pub const LZB_LM_V40: u16 = 0x3e;
    pub const LZB_LM_S: u16 = 0x3f;
    pub const LZB_LM_ENDE: u16 = 0x3a;

    /// LZB Ende container child id, nested under Betriebsdaten.
    pub const LZB_ENDE_CHILD_ID: u16 = 0x0e;
    pub const LZB_ENDE_VERFAHREN: u16 = 1;
}

/// STATUS_TUEREN (0x66) sub-attribute ids (left/right door side).
pub mod tueren_attr {
    pub const LINKS: u16 = 2;
    pub const RECHTS: u16 = 3;
}

/// Node ids for the nested children under DATA_FTD.
pub mod node_id {
    pub const FUEHRERSTAND: u16 = 0x0A;
    pub const SIFA: u16 = 0x64;
    pub const STATUS_ZUGBEEINFLUSSUNG: u16 = 0x65;
    pub const STATUS_TUEREN: u16 = 0x66;
}

/// Decode a `TUEREN_SEITE` byte (0=zu, 1=oeffnend, 2=offen, 3=abgeschlossen,
/// 4=schliessend) into the shared `DoorState` enum.
pub fn decode_door_state(value: u8) -> crate::model::DoorState {
    use crate::model::DoorState::*;
    match value {
        1 => Opening,
        2 => Open,
        3 => Locked,
        4 => Closing,
        _ => Closed,
    }
}

/// Decode `LMZUSTAND_MIT_INVERS`: 0=AUS, 1=AN, 2=BLINKEND, 3=BLINKEND_INVERS,
/// 4=DUNKEL. Both AUS and DUNKEL map to `LampState::Off`.
pub fn decode_lamp(value: u8) -> crate::model::LampState {
    use crate::model::LampState::*;
    match value {
        1 => On,
        2 => Blink,
        3 => BlinkInverse,
        _ => Off,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fsdata_ids_round_trip() {
        for fd in DEFAULT_SUBSCRIPTION {
            assert_eq!(FsData::from_id(fd.id()), Some(*fd));
        }
    }

    #[test]
    fn unknown_fsdata_id_is_none() {
        assert_eq!(FsData::from_id(0xBEEF), None);
    }

    #[test]
    fn lamp_decode_maps_dunkel_and_aus_to_off() {
        assert_eq!(decode_lamp(0), crate::model::LampState::Off);
        assert_eq!(decode_lamp(4), crate::model::LampState::Off);
        assert_eq!(decode_lamp(1), crate::model::LampState::On);
        assert_eq!(decode_lamp(2), crate::model::LampState::Blink);
        assert_eq!(decode_lamp(3), crate::model::LampState::BlinkInverse);
    }
}
