//! # jointsync-core
//!
//! Shared-state synchronization core for jointsync.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **StateStore** - the authoritative joint-angle mapping with atomic
//!   merge and snapshot operations
//! - **merge** - validation of inbound updates into mergeable pairs
//! - **SessionRegistry** - tracks connected client sessions
//! - **BroadcastRouter** - per-session-isolated fan-out of server events
//! - **SyncEngine** - one update cycle: validate, merge, rebroadcast
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐    ┌────────────┐    ┌────────────┐    ┌─────────────────┐
//! │ Session │───▶│ SyncEngine │───▶│ StateStore │    │ SessionRegistry │
//! └─────────┘    └────────────┘    └────────────┘    └─────────────────┘
//!                       │                                     ▲
//!                       ▼                                     │
//!                ┌─────────────────┐                          │
//!                │ BroadcastRouter │──────────────────────────┘
//!                └─────────────────┘
//! ```

pub mod broadcast;
pub mod merge;
pub mod registry;
pub mod store;
pub mod sync;

pub use broadcast::{BroadcastOutcome, BroadcastRouter, OutboundFrame};
pub use merge::MergeError;
pub use registry::{Session, SessionId, SessionRegistry};
pub use store::StateStore;
pub use sync::{SnapshotBroadcastMode, SyncEngine};
