use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::error::{ControllerError, ControllerResult};
use crate::common::frame::Frame;
use crate::common::node::NodeId;

// Reserved uplink topics.
pub const TOPIC_ALL: &str = "ALL";
pub const TOPIC_NEW_NODE: &str = "NEW_NODE";
pub const TOPIC_NODE_EXIT: &str = "NODE_EXIT";
pub const TOPIC_RESPONSE: &str = "RESPONSE";

pub const RESERVED_TOPICS: [&str; 4] = [TOPIC_ALL, TOPIC_NEW_NODE, TOPIC_NODE_EXIT, TOPIC_RESPONSE];

pub const VERB_NEW_NODE: &str = "NEW_NODE";
pub const VERB_NODE_EXIT: &str = "NODE_EXIT";
pub const VERB_INSTALL_EGRESS_SCHEDULER: &str = "install_egress_scheduler";
pub const VERB_SET_CHANNEL: &str = "set_channel";
pub const VERB_MONITOR_TRANSMISSION_PARAMETERS: &str = "monitor_transmission_parameters";
pub const VERB_MONITOR_TRANSMISSION_PARAMETERS_RESPONSE: &str =
    "monitor_transmission_parameters_response";
pub const VERB_ECHO_REQUEST: &str = "echo_request";
pub const VERB_ECHO_RESPONSE: &str = "echo_response";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNodeMsg {
    pub id: NodeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeExitMsg {
    pub id: NodeId,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorRequest {
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoRequest {
    pub controller_id: Uuid,
    pub seq: u64,
}

/// Uplink traffic after parsing at the transport boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    NewNode(NewNodeMsg),
    NodeExit(NodeExitMsg),
    MonitorResponse { topic: String, payload: Bytes },
    EchoResponse { topic: String },
    Unknown { topic: String, verb: String },
}

impl InboundEvent {
    /// Routes by topic first (`NEW_NODE`, `NODE_EXIT`), then by verb.
    pub fn from_frame(frame: Frame) -> ControllerResult<Self> {
        let Frame { topic, verb, payload } = frame;
        let event = match (topic.as_str(), verb.as_str()) {
            (TOPIC_NEW_NODE, _) => InboundEvent::NewNode(parse_json(&verb, &payload)?),
            (TOPIC_NODE_EXIT, _) => InboundEvent::NodeExit(parse_json(&verb, &payload)?),
            (_, VERB_MONITOR_TRANSMISSION_PARAMETERS_RESPONSE) => {
                InboundEvent::MonitorResponse { topic, payload }
            }
            (_, VERB_ECHO_RESPONSE) => InboundEvent::EchoResponse { topic },
            _ => InboundEvent::Unknown { topic, verb },
        };
        Ok(event)
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(verb: &str, payload: &[u8]) -> ControllerResult<T> {
    serde_json::from_slice(payload).map_err(|e| ControllerError::InvalidPayload {
        verb: verb.to_string(),
        reason: e.to_string(),
    })
}
