use std::collections::HashSet;
use std::net::SocketAddr;

use anyhow::Context;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LengthDelimitedCodec};
use tokio_util::sync::CancellationToken;

use crate::common::error::{ControllerError, ControllerResult};
use crate::common::frame::{Frame, encode_parts};
use crate::traits::transport::Transport;

const UPLINK_QUEUE_DEPTH: usize = 1024;
const DOWNLINK_QUEUE_DEPTH: usize = 1024;

/// Control bus over TCP. Agents connect to the uplink listener to push frames
/// and to the downlink listener to receive every published frame, filtering
/// topics on their side. Each message is one length-delimited frame.
pub struct TcpBus {
    subscriptions: HashSet<String>,
    uplink_rx: mpsc::Receiver<Bytes>,
    downlink_tx: broadcast::Sender<Bytes>,
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    uplink_addr: SocketAddr,
    downlink_addr: SocketAddr,
    closed: bool,
}

impl TcpBus {
    pub async fn bind(uplink: &str, downlink: &str, max_frame_len: usize) -> anyhow::Result<Self> {
        let uplink_listener = TcpListener::bind(uplink)
            .await
            .with_context(|| format!("failed to bind uplink endpoint {}", uplink))?;
        let downlink_listener = TcpListener::bind(downlink)
            .await
            .with_context(|| format!("failed to bind downlink endpoint {}", downlink))?;
        let uplink_addr = uplink_listener.local_addr()?;
        let downlink_addr = downlink_listener.local_addr()?;
        log::info!("Control bus uplink on {}, downlink on {}", uplink_addr, downlink_addr);

        let (uplink_tx, uplink_rx) = mpsc::channel(UPLINK_QUEUE_DEPTH);
        let (downlink_tx, _) = broadcast::channel(DOWNLINK_QUEUE_DEPTH);
        let shutdown = CancellationToken::new();

        let tasks = vec![
            tokio::spawn(accept_uplink(uplink_listener, uplink_tx, shutdown.clone(), max_frame_len)),
            tokio::spawn(accept_downlink(
                downlink_listener,
                downlink_tx.clone(),
                shutdown.clone(),
                max_frame_len,
            )),
        ];

        Ok(Self {
            subscriptions: HashSet::new(),
            uplink_rx,
            downlink_tx,
            shutdown,
            tasks,
            uplink_addr,
            downlink_addr,
            closed: false,
        })
    }

    pub fn uplink_addr(&self) -> SocketAddr {
        self.uplink_addr
    }

    pub fn downlink_addr(&self) -> SocketAddr {
        self.downlink_addr
    }

    /// Number of agents currently attached to the downlink.
    pub fn downlink_peers(&self) -> usize {
        self.downlink_tx.receiver_count()
    }

    fn ensure_open(&self) -> ControllerResult<()> {
        if self.closed {
            return Err(ControllerError::TransportClosed);
        }
        Ok(())
    }
}

impl Transport for TcpBus {
    async fn subscribe(&mut self, topic: &str) -> ControllerResult<()> {
        self.ensure_open()?;
        if self.subscriptions.insert(topic.to_string()) {
            log::debug!("Subscribed to topic {}", topic);
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> ControllerResult<()> {
        self.ensure_open()?;
        if self.subscriptions.remove(topic) {
            log::debug!("Unsubscribed from topic {}", topic);
        }
        Ok(())
    }

    async fn publish(&mut self, topic: &str, verb: &str, payload: &[u8]) -> ControllerResult<()> {
        self.ensure_open()?;
        let frame = encode_parts(topic, verb, payload)?;
        // Fails only when no agent is attached to the downlink.
        if self.downlink_tx.send(frame).is_err() {
            log::debug!("No downlink peers, dropped {} for {}", verb, topic);
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
        if self.closed {
            return;
        }
        self.closed = true;
        self.release();
        self.uplink_rx.close();
        log::info!("Control bus closed");
    }
}

impl TcpBus {
    fn release(&mut self) {
        self.shutdown.cancel();
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for TcpBus {
    fn drop(&mut self) {
        self.release();
    }
}

fn frame_codec(max_frame_len: usize) -> LengthDelimitedCodec {
    let mut builder = tokio_util::codec::length_delimited::Builder::new();
    builder.length_field_length(4);
    builder.max_frame_length(max_frame_len);
    builder.new_codec()
}

async fn accept_uplink(
    listener: TcpListener,
    tx: mpsc::Sender<Bytes>,
    shutdown: CancellationToken,
    max_frame_len: usize,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, remote)) => {
                log::debug!("Uplink peer connected: {}", remote);
                tokio::spawn(read_uplink(stream, remote, tx.clone(), shutdown.clone(), max_frame_len));
            }
            Err(e) => log::warn!("Uplink accept failed: {:?}", e),
        }
    }
}

async fn read_uplink(
    stream: TcpStream,
    remote: SocketAddr,
    tx: mpsc::Sender<Bytes>,
    shutdown: CancellationToken,
    max_frame_len: usize,
) {
    let mut framed = FramedRead::new(stream, frame_codec(max_frame_len));
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = framed.next() => next,
        };
        match next {
            Some(Ok(frame)) => {
                if tx.send(frame.freeze()).await.is_err() {
                    break;
                }
            }
            Some(Err(e)) => {
                log::warn!("Uplink peer {} sent a bad frame: {:?}", remote, e);
                break;
            }
            None => {
                log::debug!("Uplink peer {} disconnected", remote);
                break;
            }
        }
    }
}

async fn accept_downlink(
    listener: TcpListener,
    tx: broadcast::Sender<Bytes>,
    shutdown: CancellationToken,
    max_frame_len: usize,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, remote)) => {
                log::debug!("Downlink peer connected: {}", remote);
                tokio::spawn(write_downlink(
                    stream,
                    remote,
                    tx.subscribe(),
                    shutdown.clone(),
                    max_frame_len,
                ));
            }
            Err(e) => log::warn!("Downlink accept failed: {:?}", e),
        }
    }
}

async fn write_downlink(
    stream: TcpStream,
    remote: SocketAddr,
    mut rx: broadcast::Receiver<Bytes>,
    shutdown: CancellationToken,
    max_frame_len: usize,
) {
    let mut framed = FramedWrite::new(stream, frame_codec(max_frame_len));
    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = rx.recv() => next,
        };
        match next {
            Ok(frame) => {
                if let Err(e) = framed.send(frame).await {
                    log::debug!("Downlink peer {} gone: {:?}", remote, e);
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                log::warn!("Downlink peer {} lagged, {} frames dropped", remote, skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
