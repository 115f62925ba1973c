//! The authoritative joint-state store.
//!
//! A single `StateStore` instance lives for the duration of the process and
//! is the only shared mutable resource. All access goes through merge and
//! snapshot operations; no reference to the underlying map ever escapes.

use jointsync_protocol::JointSnapshot;
use std::collections::BTreeMap;
use std::sync::RwLock;
use tracing::trace;

/// In-memory mapping from joint name to angle, guarded by a single lock.
///
/// A multi-key [`merge_full`](StateStore::merge_full) holds the write lock
/// for all of its pairs, so a concurrent [`snapshot`](StateStore::snapshot)
/// sees either all of them or none. The lock is held only for the duration
/// of the call, never across a broadcast.
#[derive(Debug, Default)]
pub struct StateStore {
    joints: RwLock<BTreeMap<String, f64>>,
}

impl StateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a set of (name, angle) pairs, last-write-wins per key.
    ///
    /// Unknown keys are introduced on first write. The whole batch is applied
    /// under one write-lock acquisition and appears atomic to readers.
    pub fn merge_full(&self, pairs: impl IntoIterator<Item = (String, f64)>) {
        let mut joints = self.joints.write().unwrap_or_else(|e| e.into_inner());
        for (name, angle) in pairs {
            trace!(joint = %name, angle, "Merging joint");
            joints.insert(name, angle);
        }
    }

    /// Merge a single (name, angle) pair, overwriting any prior value.
    pub fn merge_one(&self, name: impl Into<String>, angle: f64) {
        let name = name.into();
        trace!(joint = %name, angle, "Merging joint");
        self.joints
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name, angle);
    }

    /// Take a consistent point-in-time copy of the full mapping.
    ///
    /// The returned snapshot is owned by the caller and safe to serialize
    /// without further synchronization.
    #[must_use]
    pub fn snapshot(&self) -> JointSnapshot {
        self.joints
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of joints currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.joints.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
