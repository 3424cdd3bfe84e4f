// Wire-format tests for the WebSocket facade.
//
// These tests pin the JSON shapes exchanged with UI clients: field
// names, the `type` discriminator, and lowercase_snake_case enum
// rendering. They construct JSON text directly where parsing is under
// test, so a refactor of the Rust types cannot silently change the wire.

use chrono::Utc;
use serde_json::json;

use dsc_tlink_bridge::devices::{PartitionState, ZoneState};
use dsc_tlink_bridge::state::SessionPanelState;
use dsc_tlink_bridge::ws::{session_dto, ClientMessage, ServerMessage};
use dsc_tlink_bridge::ArmingStatus;

#[test]
fn test_get_full_state_parses() {
    let m: ClientMessage = serde_json::from_str(r#"{"type":"get_full_state"}"#).unwrap();
    assert!(matches!(m, ClientMessage::GetFullState));
}

#[test]
fn test_all_command_types_parse() {
    for (kind, want_code) in [
        ("arm_away", Some("1234")),
        ("arm_home", None),
        ("arm_night", Some("004512")),
        ("disarm", Some("1234")),
    ] {
        let mut body = json!({
            "type": kind,
            "session_id": "123456789012",
            "partition_number": 3,
        });
        if let Some(code) = want_code {
            body["code"] = json!(code);
        }
        let parsed: ClientMessage = serde_json::from_value(body).unwrap();
        let (session_id, partition, code) = match parsed {
            ClientMessage::ArmAway { session_id, partition_number, code } => (session_id, partition_number, code),
            ClientMessage::ArmHome { session_id, partition_number, code } => (session_id, partition_number, code),
            ClientMessage::ArmNight { session_id, partition_number, code } => (session_id, partition_number, code),
            ClientMessage::Disarm { session_id, partition_number, code } => (session_id, partition_number, code),
            ClientMessage::GetFullState => panic!("wrong variant for {kind}"),
        };
        assert_eq!(session_id, "123456789012");
        assert_eq!(partition, 3);
        assert_eq!(code.as_deref(), want_code);
    }
}

#[test]
fn test_unknown_type_rejected() {
    assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"reboot_panel"}"#).is_err());
}

#[test]
fn test_partition_update_shape() {
    let v = serde_json::to_value(ServerMessage::PartitionUpdate {
        session_id: "123456789012".into(),
        partition_number: 2,
        status: ArmingStatus::ArmedHome,
    })
    .unwrap();
    assert_eq!(
        v,
        json!({
            "type": "partition_update",
            "session_id": "123456789012",
            "partition_number": 2,
            "status": "armed_home",
        })
    );
}

#[test]
fn test_zone_update_shape() {
    let v = serde_json::to_value(ServerMessage::ZoneUpdate {
        session_id: "123456789012".into(),
        zone_number: 65,
        open: false,
    })
    .unwrap();
    assert_eq!(
        v,
        json!({
            "type": "zone_update",
            "session_id": "123456789012",
            "zone_number": 65,
            "open": false,
        })
    );
}

#[test]
fn test_error_shape() {
    let v = serde_json::to_value(ServerMessage::Error {
        message: "Session not found: 000000000000".into(),
    })
    .unwrap();
    assert_eq!(v["type"], "error");
    assert!(v["message"].as_str().unwrap().contains("not found"));
}

#[test]
fn test_status_values_render_snake_case() {
    let cases = [
        (ArmingStatus::Unknown, "unknown"),
        (ArmingStatus::Disarmed, "disarmed"),
        (ArmingStatus::ArmedAway, "armed_away"),
        (ArmingStatus::ArmedHome, "armed_home"),
        (ArmingStatus::ArmedNight, "armed_night"),
        (ArmingStatus::Arming, "arming"),
        (ArmingStatus::Pending, "pending"),
        (ArmingStatus::Triggered, "triggered"),
    ];
    for (status, expected) in cases {
        assert_eq!(serde_json::to_value(status).unwrap(), json!(expected));
    }
}

#[test]
fn test_full_state_shape() {
    let mut session = SessionPanelState::default();
    session.session_id = "123456789012".into();

    let mut part = PartitionState::new(1);
    part.status = ArmingStatus::Disarmed;
    part.is_ready = true;
    part.last_updated = Utc::now();
    session.partitions.insert(1, part);

    let mut zone = ZoneState::new(3);
    zone.name = Some("Hallway PIR".into());
    zone.is_open = true;
    session.zones.insert(3, zone);

    let dto = session_dto(&session, "motion");
    let v = serde_json::to_value(ServerMessage::FullState {
        sessions: vec![dto],
    })
    .unwrap();

    assert_eq!(v["type"], "full_state");
    let s = &v["sessions"][0];
    assert_eq!(s["session_id"], "123456789012");
    assert_eq!(s["name"], "Panel 123456789012");
    assert_eq!(
        s["partitions"][0],
        json!({
            "partition_number": 1,
            "name": "Partition 1",
            "status": "disarmed",
        })
    );
    assert_eq!(
        s["zones"][0],
        json!({
            "zone_number": 3,
            "name": "Hallway PIR",
            "device_class": "motion",
            "open": true,
            "partitions": [1],
        })
    );
}
