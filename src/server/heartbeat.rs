use tokio::time::Instant;

use crate::common::error::ControllerResult;
use crate::common::node::{NodeId, NodeState};
use crate::common::protocol::{EchoRequest, VERB_ECHO_REQUEST};
use crate::handler::context::HandlerContext;
use crate::handler::new_node::send_setup_commands;
use crate::membership::registry::SweepReport;
use crate::traits::transport::Transport;

/// One heartbeat period: expire silent nodes, repeat the join sequence for
/// nodes that never answered, then send echo requests to the rest.
pub async fn run_heartbeat_cycle(ctx: &mut HandlerContext, now: Instant) -> ControllerResult<SweepReport> {
    let report = ctx.registry.sweep_timeouts(now);
    for node in &report.exited {
        log::warn!(
            "Node {} ({}) exited after {:?} without a liveness signal",
            node.id,
            node.name,
            ctx.registry.grace_period()
        );
        ctx.transport.unsubscribe(node.id.as_str()).await?;
    }
    for id in ctx.registry.unacknowledged() {
        log::debug!("Node {} has not acknowledged its setup, sending it again", id);
        send_setup_commands(ctx, &id).await?;
    }
    send_echo_requests(ctx).await?;
    Ok(report)
}

pub async fn send_echo_requests(ctx: &mut HandlerContext) -> ControllerResult<()> {
    let targets: Vec<NodeId> = ctx
        .registry
        .nodes()
        .filter(|n| matches!(n.state, NodeState::Active | NodeState::Unresponsive))
        .map(|n| n.id.clone())
        .collect();
    if targets.is_empty() {
        return Ok(());
    }

    ctx.echo_seq += 1;
    let payload = serde_json::to_vec(&EchoRequest {
        controller_id: ctx.controller_id,
        seq: ctx.echo_seq,
    })?;
    for id in &targets {
        ctx.transport.publish(id.as_str(), VERB_ECHO_REQUEST, &payload).await?;
    }
    log::trace!("Sent echo request {} to {} nodes", ctx.echo_seq, targets.len());
    Ok(())
}
