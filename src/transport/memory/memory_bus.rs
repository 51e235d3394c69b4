use std::collections::HashSet;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::common::error::{ControllerError, ControllerResult};
use crate::common::frame::{Frame, encode_parts};
use crate::traits::transport::Transport;

/// In-process control bus. The controller holds the [`MemoryBus`]; the other
/// end, standing in for every agent, is the [`MemoryBusPeer`].
pub struct MemoryBus {
    subscriptions: HashSet<String>,
    uplink_rx: mpsc::UnboundedReceiver<Bytes>,
    downlink_tx: mpsc::UnboundedSender<Bytes>,
    closed: bool,
}

pub struct MemoryBusPeer {
    uplink_tx: mpsc::UnboundedSender<Bytes>,
    downlink_rx: mpsc::UnboundedReceiver<Bytes>,
}

pub fn memory_bus() -> (MemoryBus, MemoryBusPeer) {
    let (uplink_tx, uplink_rx) = mpsc::unbounded_channel();
    let (downlink_tx, downlink_rx) = mpsc::unbounded_channel();
    (
        MemoryBus {
            subscriptions: HashSet::new(),
            uplink_rx,
            downlink_tx,
            closed: false,
        },
        MemoryBusPeer {
            uplink_tx,
            downlink_rx,
        },
    )
}

impl MemoryBus {
    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.contains(topic)
    }

    fn ensure_open(&self) -> ControllerResult<()> {
        if self.closed {
            return Err(ControllerError::TransportClosed);
        }
        Ok(())
    }
}

impl Transport for MemoryBus {
    async fn subscribe(&mut self, topic: &str) -> ControllerResult<()> {
        self.ensure_open()?;
        self.subscriptions.insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> ControllerResult<()> {
        self.ensure_open()?;
        self.subscriptions.remove(topic);
        Ok(())
    }

    async fn publish(&mut self, topic: &str, verb: &str, payload: &[u8]) -> ControllerResult<()> {
        self.ensure_open()?;
        let frame = encode_parts(topic, verb, payload)?;
        if self.downlink_tx.send(frame).is_err() {
            log::debug!("Memory peer gone, dropped {} for {}", verb, topic);
        }
        Ok(())
    }

    async fn receive(&mut self) -> ControllerResult<Frame> {
        loop {
            self.ensure_open()?;
            let raw = self
                .uplink_rx
                .recv()
                .await
                .ok_or(ControllerError::TransportClosed)?;
            match Frame::decode(raw) {
                Ok(frame) if self.subscriptions.contains(&frame.topic) => return Ok(frame),
                Ok(frame) => log::trace!("Ignoring frame on unsubscribed topic {}", frame.topic),
                Err(e) => log::warn!("Dropping undecodable uplink frame: {}", e),
            }
        }
    }

    async fn close(&mut self) {
        self.closed = true;
        self.uplink_rx.close();
    }
}

impl MemoryBusPeer {
    pub fn send(&self, topic: &str, verb: &str, payload: &[u8]) -> ControllerResult<()> {
        self.send_raw(encode_parts(topic, verb, payload)?)
    }

    /// Push raw bytes, bypassing frame validation.
    pub fn send_raw(&self, raw: Bytes) -> ControllerResult<()> {
        self.uplink_tx
            .send(raw)
            .map_err(|_| ControllerError::TransportClosed)
    }

    pub fn try_recv(&mut self) -> Option<Frame> {
        let raw = self.downlink_rx.try_recv().ok()?;
        Frame::decode(raw).ok()
    }

    pub async fn recv(&mut self) -> Option<Frame> {
        let raw = self.downlink_rx.recv().await?;
        Frame::decode(raw).ok()
    }

    /// Every downlink frame published so far.
    pub fn drain(&mut self) -> Vec<Frame> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
