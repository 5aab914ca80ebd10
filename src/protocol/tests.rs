use super::*;
use serde_json::json;

#[test]
fn test_parse_partial_state() {
    let msg = ClientMessage::parse(r#"{"type":"state","x":5}"#).unwrap();
    match msg {
        ClientMessage::State(patch) => {
            assert_eq!(patch.x, Some(5.0));
            assert_eq!(patch.y, None);
            assert_eq!(patch.equipment, None);
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn test_parse_state_camel_case_fields() {
    let msg = ClientMessage::parse(
        r#"{"type":"state","combatLevel":12,"isRunning":true,"equipment":{"head":"helm_1","legs":null}}"#,
    )
    .unwrap();
    let ClientMessage::State(patch) = msg else {
        panic!("expected state");
    };
    assert_eq!(patch.combat_level, Some(12));
    assert_eq!(patch.is_running, Some(true));
    let equipment = patch.equipment.unwrap();
    assert_eq!(equipment["head"], Some("helm_1".to_string()));
    assert_eq!(equipment["legs"], None);
}

#[test]
fn test_parse_chat() {
    let msg = ClientMessage::parse(r#"{"type":"chat","text":"hello"}"#).unwrap();
    assert_eq!(
        msg,
        ClientMessage::Chat {
            text: "hello".to_string()
        }
    );
}

#[test]
fn test_unknown_type_is_not_an_error() {
    let msg = ClientMessage::parse(r#"{"type":"emote","kind":"wave"}"#).unwrap();
    assert_eq!(msg, ClientMessage::Unknown);
}

#[test]
fn test_malformed_payloads_fail_to_parse() {
    assert!(ClientMessage::parse("not json").is_err());
    assert!(ClientMessage::parse(r#"{"x":5}"#).is_err());
    assert!(ClientMessage::parse(r#"{"type":"state","x":"five"}"#).is_err());
    assert!(ClientMessage::parse(r#"{"type":"chat"}"#).is_err());
}

#[test]
fn test_server_messages_are_tagged() {
    let leave = ServerMessage::PlayerLeave {
        id: "player_1".to_string(),
    };
    let value: serde_json::Value = serde_json::from_str(&leave.to_json().unwrap()).unwrap();
    assert_eq!(value, json!({"type": "player_leave", "id": "player_1"}));
}

#[test]
fn test_snapshot_fields_flatten_into_player_update() {
    let snapshot = Snapshot {
        id: "player_1".to_string(),
        name: "SwiftFox7".to_string(),
        x: 1.0,
        y: 1.5,
        z: -2.0,
        yaw: 0.5,
        pitch: 0.0,
        equipment: Equipment::new(),
        combat_level: 3,
        is_running: true,
    };
    let json = ServerMessage::PlayerUpdate(snapshot.clone()).to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["type"], "player_update");
    assert_eq!(value["name"], "SwiftFox7");
    assert_eq!(value["combatLevel"], 3);
    assert_eq!(value["isRunning"], true);

    assert_eq!(
        ServerMessage::parse(&json).unwrap(),
        ServerMessage::PlayerUpdate(snapshot)
    );
}

#[test]
fn test_state_patch_serializes_only_present_fields() {
    let patch = StatePatch {
        x: Some(10.0),
        ..Default::default()
    };
    let json = serde_json::to_value(ClientMessage::State(patch)).unwrap();
    assert_eq!(json, json!({"type": "state", "x": 10.0}));
}

#[test]
fn test_movement_mode_from_running() {
    assert_eq!(MovementMode::from_running(true), MovementMode::Run);
    assert!(!MovementMode::from_running(false).is_running());
}
