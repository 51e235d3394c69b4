use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Identifier of an agent node. Agents announce a UUID string, which is also
/// the node's private downlink topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Joining,
    Active,
    Unresponsive,
    Exited,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Joining => "joining",
            NodeState::Active => "active",
            NodeState::Unresponsive => "unresponsive",
            NodeState::Exited => "exited",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub state: NodeState,
    pub last_seen: Instant,
    pub joined_at: DateTime<Utc>,
    pub exit_reason: Option<String>,
    /// Set once any frame arrived on the node topic, which proves the agent
    /// is attached to the downlink and got its setup commands.
    pub acknowledged: bool,
}

impl Node {
    pub fn new(id: NodeId, name: String, now: Instant) -> Self {
        Self {
            id,
            name,
            state: NodeState::Joining,
            last_seen: now,
            joined_at: Utc::now(),
            exit_reason: None,
            acknowledged: false,
        }
    }

    /// Time since the last liveness signal, zero if `now` is in the past.
    pub fn silence(&self, now: Instant) -> std::time::Duration {
        now.saturating_duration_since(self.last_seen)
    }
}
