use tokio::time::Instant;

use crate::common::error::{ControllerError, ControllerResult};
use crate::common::frame::Frame;
use crate::common::protocol::InboundEvent;
use crate::handler::{
    context::HandlerContext, monitor_response::handle_monitor_response,
    new_node::handle_new_node, node_exit::handle_node_exit,
};

/// Parse an uplink frame and route it. Any frame on a registered node's topic
/// counts as a liveness signal for that node.
pub async fn dispatch_frame(ctx: &mut HandlerContext, frame: Frame) -> ControllerResult<()> {
    log::debug!("Controller received cmd: {} on topic {}", frame.verb, frame.topic);
    if ctx.registry.contains(&frame.topic) {
        ctx.registry.mark_seen(&frame.topic, Instant::now())?;
    }
    let event = InboundEvent::from_frame(frame)?;
    dispatch_event(ctx, event).await
}

pub async fn dispatch_event(ctx: &mut HandlerContext, event: InboundEvent) -> ControllerResult<()> {
    match event {
        InboundEvent::NewNode(msg) => handle_new_node(ctx, msg).await,
        InboundEvent::NodeExit(msg) => handle_node_exit(ctx, msg).await,
        InboundEvent::MonitorResponse { topic, payload } => {
            handle_monitor_response(ctx, topic, payload).await
        }
        InboundEvent::EchoResponse { topic } => {
            log::trace!("Echo response on {}", topic);
            Ok(())
        }
        InboundEvent::Unknown { topic, verb } => {
            Err(ControllerError::UnsupportedOperation { topic, verb })
        }
    }
}
