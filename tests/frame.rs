use bytes::Bytes;
use testbed_controller::common::error::ControllerError;
use testbed_controller::common::frame::{Frame, encode_parts};
use testbed_controller::common::node::NodeId;
use testbed_controller::common::protocol::{InboundEvent, NewNodeMsg, NodeExitMsg};

#[test]
fn payload_keeps_embedded_spaces() {
    let raw = encode_parts("n1", "set_channel", b"a b  c").unwrap();
    assert_eq!(&raw[..], b"n1 set_channel a b  c");

    let frame = Frame::decode(raw).unwrap();
    assert_eq!(frame.topic, "n1");
    assert_eq!(frame.verb, "set_channel");
    assert_eq!(&frame.payload[..], b"a b  c");
}

#[test]
fn missing_payload_decodes_as_empty() {
    let frame = Frame::decode(Bytes::from_static(b"RESPONSE ping")).unwrap();
    assert_eq!(frame.verb, "ping");
    assert!(frame.payload.is_empty());

    let frame = Frame::decode(Bytes::from_static(b"RESPONSE ping ")).unwrap();
    assert!(frame.payload.is_empty());
}

#[test]
fn malformed_frames_are_rejected() {
    for raw in [
        &b"NEW_NODE"[..],
        &b" verb payload"[..],
        &b"topic  payload"[..],
        &b"\xff\xfe verb x"[..],
    ] {
        assert!(
            matches!(Frame::decode(Bytes::copy_from_slice(raw)), Err(ControllerError::InvalidFrame(_))),
            "{:?}",
            raw
        );
    }
    assert!(matches!(encode_parts("two words", "verb", b""), Err(ControllerError::InvalidFrame(_))));
    assert!(matches!(encode_parts("topic", "", b""), Err(ControllerError::InvalidFrame(_))));
}

#[test]
fn reserved_topics_parse_into_events() {
    let frame = Frame::new("NEW_NODE", "NEW_NODE", &br#"{"id":"n1","name":"agent1"}"#[..]);
    assert_eq!(
        InboundEvent::from_frame(frame).unwrap(),
        InboundEvent::NewNode(NewNodeMsg {
            id: NodeId::from("n1"),
            name: "agent1".to_string(),
        })
    );

    let frame = Frame::new("NODE_EXIT", "NODE_EXIT", &br#"{"id":"n1","reason":"shutdown"}"#[..]);
    assert_eq!(
        InboundEvent::from_frame(frame).unwrap(),
        InboundEvent::NodeExit(NodeExitMsg {
            id: NodeId::from("n1"),
            reason: "shutdown".to_string(),
        })
    );
}

#[test]
fn verbs_route_when_topic_is_not_reserved_for_membership() {
    let frame = Frame::new("RESPONSE", "monitor_transmission_parameters_response", &b"\x01\x02"[..]);
    assert_eq!(
        InboundEvent::from_frame(frame).unwrap(),
        InboundEvent::MonitorResponse {
            topic: "RESPONSE".to_string(),
            payload: Bytes::from_static(b"\x01\x02"),
        }
    );

    let frame = Frame::new("n1", "reboot", Bytes::new());
    assert_eq!(
        InboundEvent::from_frame(frame).unwrap(),
        InboundEvent::Unknown {
            topic: "n1".to_string(),
            verb: "reboot".to_string(),
        }
    );
}

#[test]
fn bad_membership_payload_is_invalid_payload() {
    let frame = Frame::new("NEW_NODE", "NEW_NODE", &b"not json"[..]);
    assert!(matches!(
        InboundEvent::from_frame(frame),
        Err(ControllerError::InvalidPayload { .. })
    ));
}
