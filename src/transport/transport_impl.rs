use crate::common::error::ControllerResult;
use crate::common::frame::Frame;
use crate::traits::transport::Transport;
use crate::transport::memory::memory_bus::MemoryBus;
use crate::transport::tcp::tcp_bus::TcpBus;

pub enum TransportImpl {
    Tcp(TcpBus),
    Memory(MemoryBus),
}

impl Transport for TransportImpl {
    async fn subscribe(&mut self, topic: &str) -> ControllerResult<()> {
        match self {
            TransportImpl::Tcp(t) => t.subscribe(topic).await,
            TransportImpl::Memory(m) => m.subscribe(topic).await,
        }
    }

    async fn unsubscribe(&mut self, topic: &str) -> ControllerResult<()> {
        match self {
            TransportImpl::Tcp(t) => t.unsubscribe(topic).await,
            TransportImpl::Memory(m) => m.unsubscribe(topic).await,
        }
    }

    async fn publish(&mut self, topic: &str, verb: &str, payload: &[u8]) -> ControllerResult<()> {
        match self {
            TransportImpl::Tcp(t) => t.publish(topic, verb, payload).await,
            TransportImpl::Memory(m) => m.publish(topic, verb, payload).await,
        }
    }

    async fn receive(&mut self) -> ControllerResult<Frame> {
        match self {
            TransportImpl::Tcp(t) => t.receive().await,
            TransportImpl::Memory(m) => m.receive().await,
        }
    }

    async fn close(&mut self) {
        match self {
            TransportImpl::Tcp(t) => t.close().await,
            TransportImpl::Memory(m) => m.close().await,
        }
    }
}
