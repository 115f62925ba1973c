//! Message payload types for jointsync.
//!
//! These mirror the JSON shapes exchanged with clients. Header, velocity and
//! effort fields are pass-through metadata: the server carries them verbatim
//! but never interprets them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A timestamp as carried in message headers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stamp {
    /// Whole seconds.
    #[serde(default)]
    pub secs: i64,
    /// Nanosecond remainder.
    #[serde(default)]
    pub nsecs: i64,
}

/// Message header (timestamp + frame identifier), pass-through.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// When the sender produced the message.
    #[serde(default)]
    pub stamp: Stamp,
    /// Reference frame identifier.
    #[serde(default)]
    pub frame_id: String,
}

/// A full joint-state update.
///
/// Names and positions are paired positionally. The invariant
/// `name.len() == position.len()` is enforced by the merger, not here;
/// deserialization only checks structural shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JointStateMessage {
    /// Pass-through header.
    #[serde(default)]
    pub header: Header,
    /// Joint names, paired positionally with `position`.
    pub name: Vec<String>,
    /// Joint angles in radians.
    pub position: Vec<f64>,
    /// Joint velocities, pass-through.
    #[serde(default)]
    pub velocity: Vec<f64>,
    /// Joint efforts, pass-through.
    #[serde(default)]
    pub effort: Vec<f64>,
}

impl JointStateMessage {
    /// Build a message from (name, angle) pairs, leaving the pass-through
    /// fields at their defaults.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, f64)>) -> Self {
        let (name, position) = pairs.into_iter().unzip();
        Self {
            name,
            position,
            ..Self::default()
        }
    }
}

/// A single-joint update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointUpdate {
    /// Sender-supplied identity tag, pass-through. Clients use it to filter
    /// their own echoes; the server never inspects it.
    #[serde(rename = "transmitterId", skip_serializing_if = "Option::is_none")]
    #[serde(default)]
    pub transmitter_id: Option<String>,
    /// The joint to update.
    #[serde(rename = "jointName")]
    pub joint_name: String,
    /// New angle in radians.
    pub angle: f64,
}

impl JointUpdate {
    /// Create a single-joint update.
    #[must_use]
    pub fn new(joint_name: impl Into<String>, angle: f64) -> Self {
        Self {
            transmitter_id: None,
            joint_name: joint_name.into(),
            angle,
        }
    }
}

/// A point-in-time copy of the shared state, keyed by joint name.
///
/// A `BTreeMap` keeps the map order stable across snapshots.
pub type JointSnapshot = BTreeMap<String, f64>;
