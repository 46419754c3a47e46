//! Integration coverage across the Zusi3 wire codec and the DATA_FTD
//! decoder: build a Node the way the real server would, push it through
//! `encode_message`/`decode_message`, then apply it onto a `TrainState`.

use tsw6_zusi3_bridge::model::{SifaWarning, TrainState};
use tsw6_zusi3_bridge::zusi3::codec::{decode_message, encode_message, Attribute, Node};
use tsw6_zusi3_bridge::zusi3::decode::apply_data_ftd;
use tsw6_zusi3_bridge::zusi3::fsdata::{node_id, sifa_attr, FsData};

#[tokio::test]
async fn data_ftd_survives_the_wire_and_updates_train_state() {
    let sifa = Node::new(node_id::SIFA).with_attr(Attribute { id: sifa_attr::HUPE, payload: vec![1] });
    let ftd = Node::new(4)
        .with_attr(Attribute {
            id: FsData::Geschwindigkeit.id(),
            payload: 30.0f32.to_le_bytes().to_vec(),
        })
        .with_child(sifa);

    let bytes = encode_message(&ftd);
    let mut cursor = std::io::Cursor::new(bytes);
    let decoded = decode_message(&mut cursor).await.expect("decode");

    let mut state = TrainState::default();
    let changed = apply_data_ftd(&mut state, &decoded);

    assert!(changed);
    assert_eq!(state.sifa.warning, SifaWarning::Warn);
    assert!((state.speed_kmh() - 108.0).abs() < 0.01);
}

#[tokio::test]
async fn unknown_attribute_ids_pass_through_the_wire_without_tripping_the_decoder() {
    let ftd = Node::new(4).with_attr(Attribute { id: 0xBEEF, payload: vec![9, 9, 9] });
    let bytes = encode_message(&ftd);
    let decoded = decode_message(&mut std::io::Cursor::new(bytes)).await.unwrap();

    let mut state = TrainState::default();
    assert!(!apply_data_ftd(&mut state, &decoded));
    assert_eq!(state, TrainState::default());
}
