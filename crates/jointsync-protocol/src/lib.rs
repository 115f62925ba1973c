//! # jointsync-protocol
//!
//! Wire protocol definitions for the jointsync state-synchronization server.
//!
//! Clients and server exchange JSON text frames, each an envelope of the form
//! `{"event": "<name>", "data": <payload>}`:
//!
//! - `joint_states` - full set of joint names and positions
//! - `update_joint` - a single joint update
//! - `server_joints_update` - the server's authoritative snapshot
//! - `error` - rejection notice for a malformed message
//!
//! ## Example
//!
//! ```rust
//! use jointsync_protocol::{codec, ClientEvent};
//!
//! let raw = r#"{"event":"update_joint","data":{"jointName":"elbow","angle":1.57}}"#;
//! let event = codec::decode(raw).unwrap();
//! assert!(matches!(event, ClientEvent::UpdateJoint(_)));
//! ```

pub mod codec;
pub mod events;
pub mod messages;

pub use codec::{decode, encode, ProtocolError};
pub use events::{ClientEvent, ServerEvent};
pub use messages::{Header, JointSnapshot, JointStateMessage, JointUpdate, Stamp};
