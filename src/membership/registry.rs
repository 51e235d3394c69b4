use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;

use crate::common::error::{ControllerError, ControllerResult};
use crate::common::node::{Node, NodeId, NodeState};

pub const HEARTBEAT_TIMEOUT_REASON: &str = "heartbeat timeout";

/// Outcome of one [`Registry::sweep_timeouts`] pass.
#[derive(Debug, Default)]
pub struct SweepReport {
    pub unresponsive: Vec<NodeId>,
    pub exited: Vec<Node>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.unresponsive.is_empty() && self.exited.is_empty()
    }
}

/// In-memory node table with the heartbeat state machine.
#[derive(Debug)]
pub struct Registry {
    nodes: IndexMap<NodeId, Node>,
    timeout: Duration,
    grace_multiplier: u32,
}

impl Registry {
    pub fn new(timeout: Duration, grace_multiplier: u32) -> Self {
        Self {
            nodes: IndexMap::new(),
            timeout,
            grace_multiplier: grace_multiplier.max(1),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Silence after which an unresponsive node is exited.
    pub fn grace_period(&self) -> Duration {
        self.timeout * self.grace_multiplier
    }

    pub fn register_node(&mut self, id: NodeId, name: String, now: Instant) -> ControllerResult<Node> {
        if self.nodes.contains_key(&id) {
            return Err(ControllerError::DuplicateNode(id));
        }
        let node = Node::new(id.clone(), name, now);
        log::info!("Registered node {} ({})", node.id, node.name);
        self.nodes.insert(id, node.clone());
        Ok(node)
    }

    pub fn activate(&mut self, id: &str, now: Instant) -> ControllerResult<()> {
        let node = self.node_mut(id)?;
        if node.state == NodeState::Joining {
            node.state = NodeState::Active;
            node.last_seen = now;
            log::info!("Node {} is active", node.id);
        }
        Ok(())
    }

    pub fn remove_node(&mut self, id: &str, reason: &str) -> ControllerResult<Node> {
        let mut node = self
            .nodes
            .shift_remove(id)
            .ok_or_else(|| ControllerError::UnknownNode(NodeId::from(id)))?;
        node.state = NodeState::Exited;
        node.exit_reason = Some(reason.to_string());
        log::info!("Removed node {} ({}), reason: {}", node.id, node.name, reason);
        Ok(node)
    }

    pub fn mark_seen(&mut self, id: &str, now: Instant) -> ControllerResult<()> {
        let node = self.node_mut(id)?;
        node.last_seen = now;
        node.acknowledged = true;
        if node.state == NodeState::Unresponsive {
            node.state = NodeState::Active;
            log::info!("Node {} is responsive again", node.id);
        }
        Ok(())
    }

    pub fn sweep_timeouts(&mut self, now: Instant) -> SweepReport {
        let timeout = self.timeout;
        let grace = self.grace_period();
        let mut report = SweepReport::default();
        let mut expired = Vec::new();

        for node in self.nodes.values_mut() {
            let silence = node.silence(now);
            match node.state {
                NodeState::Active if silence > timeout => {
                    node.state = NodeState::Unresponsive;
                    log::warn!("Node {} unresponsive for {:?}", node.id, silence);
                    report.unresponsive.push(node.id.clone());
                }
                NodeState::Unresponsive if silence > grace => expired.push(node.id.clone()),
                _ => {}
            }
        }

        for id in expired {
            if let Ok(node) = self.remove_node(id.as_str(), HEARTBEAT_TIMEOUT_REASON) {
                report.exited.push(node);
            }
        }
        report
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in join order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Joined nodes that have not sent anything on their topic yet.
    pub fn unacknowledged(&self) -> Vec<NodeId> {
        self.nodes
            .values()
            .filter(|n| !n.acknowledged && matches!(n.state, NodeState::Active | NodeState::Unresponsive))
            .map(|n| n.id.clone())
            .collect()
    }

    pub fn count_in_state(&self, state: NodeState) -> usize {
        self.nodes.values().filter(|n| n.state == state).count()
    }

    fn node_mut(&mut self, id: &str) -> ControllerResult<&mut Node> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| ControllerError::UnknownNode(NodeId::from(id)))
    }
}
