use tokio::time::Instant;

use crate::common::error::{ControllerError, ControllerResult};
use crate::common::node::NodeId;
use crate::common::protocol::{
    MonitorRequest, NewNodeMsg, RESERVED_TOPICS, TOPIC_NEW_NODE, VERB_INSTALL_EGRESS_SCHEDULER,
    VERB_MONITOR_TRANSMISSION_PARAMETERS, VERB_SET_CHANNEL,
};
use crate::handler::context::HandlerContext;
use crate::qos::codec;
use crate::traits::transport::Transport;

/// Register the node, then install QoS, set the channel and start monitoring,
/// in that order, before the loop reads another frame.
pub async fn handle_new_node(ctx: &mut HandlerContext, msg: NewNodeMsg) -> ControllerResult<()> {
    log::debug!("Adding new node with id: {} and name: {}", msg.id, msg.name);
    check_node_id(&msg.id)?;

    let node = ctx.registry.register_node(msg.id, msg.name, Instant::now())?;
    // The controller filters uplink topics locally, so this is effective at once.
    ctx.transport.subscribe(node.id.as_str()).await?;

    send_setup_commands(ctx, &node.id).await?;
    ctx.registry.activate(node.id.as_str(), Instant::now())
}

/// The join sequence. Also resent on heartbeats until the node acknowledges.
pub async fn send_setup_commands(ctx: &mut HandlerContext, node: &NodeId) -> ControllerResult<()> {
    install_egress_scheduler(ctx, node).await?;
    let channel = ctx.config.channel;
    set_channel(ctx, node, channel).await?;
    monitor_transmission_parameters(ctx, node).await
}

pub async fn install_egress_scheduler(ctx: &mut HandlerContext, node: &NodeId) -> ControllerResult<()> {
    log::debug!("Sending QoS config to node {}", node);
    let config = ctx.qos.config();
    let payload = codec::encode(&config);
    ctx.transport
        .publish(node.as_str(), VERB_INSTALL_EGRESS_SCHEDULER, &payload)
        .await
}

pub async fn set_channel(ctx: &mut HandlerContext, node: &NodeId, channel: u32) -> ControllerResult<()> {
    log::debug!("Set channel {} on node {}", channel, node);
    let payload = serde_json::to_vec(&channel)?;
    ctx.transport.publish(node.as_str(), VERB_SET_CHANNEL, &payload).await
}

pub async fn monitor_transmission_parameters(ctx: &mut HandlerContext, node: &NodeId) -> ControllerResult<()> {
    log::debug!("Monitor transmission parameters on node {}", node);
    let request = MonitorRequest {
        parameters: ctx.config.monitor_parameters.clone(),
    };
    let payload = serde_json::to_vec(&request)?;
    ctx.transport
        .publish(node.as_str(), VERB_MONITOR_TRANSMISSION_PARAMETERS, &payload)
        .await
}

// A node id doubles as its topic, and dropping a node unsubscribes it, so it
// must never collide with a reserved uplink topic.
fn check_node_id(id: &NodeId) -> ControllerResult<()> {
    let raw = id.as_str();
    let reason = if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        format!("node id {:?} is not usable as a topic", raw)
    } else if RESERVED_TOPICS.contains(&raw) {
        format!("node id {:?} is a reserved topic", raw)
    } else {
        return Ok(());
    };
    Err(ControllerError::InvalidPayload {
        verb: TOPIC_NEW_NODE.to_string(),
        reason,
    })
}
