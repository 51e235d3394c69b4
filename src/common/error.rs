use thiserror::Error;

use crate::common::node::NodeId;

/// Errors surfaced by the controller core.
///
/// `DuplicateNode`, `UnknownNode`, `UnsupportedOperation` and the payload/frame
/// parse failures are recovered inside the loop. `TransportClosed` ends it.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("node {0} is already registered")]
    DuplicateNode(NodeId),

    #[error("node {0} is not registered")]
    UnknownNode(NodeId),

    #[error("malformed QoS config: {0}")]
    MalformedConfig(String),

    #[error("transport closed")]
    TransportClosed,

    #[error("unsupported operation: topic={topic} verb={verb}")]
    UnsupportedOperation { topic: String, verb: String },

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("invalid {verb} payload: {reason}")]
    InvalidPayload { verb: String, reason: String },

    #[error("invalid policy table: {0}")]
    InvalidPolicy(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl ControllerError {
    /// Errors the dispatch loop logs and skips instead of terminating on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ControllerError::DuplicateNode(_)
                | ControllerError::UnknownNode(_)
                | ControllerError::UnsupportedOperation { .. }
                | ControllerError::InvalidFrame(_)
                | ControllerError::InvalidPayload { .. }
        )
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ControllerError::MalformedConfig(reason.into())
    }
}

pub type ControllerResult<T> = std::result::Result<T, ControllerError>;
