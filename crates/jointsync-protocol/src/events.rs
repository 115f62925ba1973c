//! Event envelopes for the jointsync protocol.
//!
//! Every frame on the wire is an envelope tagging a payload with an event
//! name, mirroring the Socket.IO-style `(event, data)` pairs the protocol
//! grew out of.

use crate::messages::{JointSnapshot, JointStateMessage, JointUpdate};
use serde::{Deserialize, Serialize};

/// An event sent by a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    /// Full joint-state update: merge all pairs.
    JointStates(JointStateMessage),
    /// Single-joint update: merge one pair.
    UpdateJoint(JointUpdate),
}

impl ClientEvent {
    /// Get the wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JointStates(_) => "joint_states",
            ClientEvent::UpdateJoint(_) => "update_joint",
        }
    }
}

/// An event sent by the server to sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Echo of a full update, verbatim as received.
    JointStates(JointStateMessage),
    /// Echo of a single update, verbatim as received.
    UpdateJoint(JointUpdate),
    /// The authoritative snapshot of all joints.
    ServerJointsUpdate(JointSnapshot),
    /// A malformed message was rejected; sent only to the offender.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

impl ServerEvent {
    /// Get the wire name of this event.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::JointStates(_) => "joint_states",
            ServerEvent::UpdateJoint(_) => "update_joint",
            ServerEvent::ServerJointsUpdate(_) => "server_joints_update",
            ServerEvent::Error { .. } => "error",
        }
    }

    /// Create an error event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            message: message.into(),
        }
    }
}
