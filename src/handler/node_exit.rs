use crate::common::error::ControllerResult;
use crate::common::protocol::NodeExitMsg;
use crate::handler::context::HandlerContext;
use crate::traits::transport::Transport;

pub async fn handle_node_exit(ctx: &mut HandlerContext, msg: NodeExitMsg) -> ControllerResult<()> {
    log::debug!("Removing node with id: {}, reason: {}", msg.id, msg.reason);
    let node = ctx.registry.remove_node(msg.id.as_str(), &msg.reason)?;
    ctx.transport.unsubscribe(node.id.as_str()).await
}
