use crate::common::error::ControllerResult;
use crate::common::frame::Frame;

/// Topic-filtered publish/subscribe endpoint pair on the control bus.
#[trait_variant::make(Transport: Send)]
pub trait UnsendTransport {
    /// Idempotent. The subscription is in effect when this returns.
    async fn subscribe(&mut self, topic: &str) -> ControllerResult<()>;
    async fn unsubscribe(&mut self, topic: &str) -> ControllerResult<()>;
    /// Fire-and-forget; frames nobody listens to are dropped.
    async fn publish(&mut self, topic: &str, verb: &str, payload: &[u8]) -> ControllerResult<()>;
    /// Next frame on a subscribed topic. Cancel-safe.
    async fn receive(&mut self) -> ControllerResult<Frame>;
    async fn close(&mut self);
}
