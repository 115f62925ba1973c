//! Session registry for jointsync.
//!
//! Tracks currently connected client sessions. A session is one connected
//! client's transport identity; all shared state lives in the
//! [`StateStore`](crate::store::StateStore), so a session carries nothing
//! beyond its id and its outbound queue.

use crate::broadcast::OutboundFrame;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tracing::debug;

/// Counter for ensuring unique session IDs even within the same nanosecond.
static SESSION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique identifier for a connected session.
///
/// A reconnect is a brand-new session with a brand-new id; identities are
/// never resumed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a session ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh session ID.
    #[must_use]
    pub fn generate() -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let counter = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(format!("sess_{:x}_{:x}", timestamp, counter))
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A connected session: its identity plus the bounded outbound queue the
/// connection task drains into the transport.
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    queue: mpsc::Sender<OutboundFrame>,
}

impl Session {
    /// Create a session around an outbound queue.
    #[must_use]
    pub fn new(id: SessionId, queue: mpsc::Sender<OutboundFrame>) -> Self {
        Self { id, queue }
    }

    /// Get the session's identity.
    #[must_use]
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Try to enqueue a frame without blocking.
    ///
    /// # Errors
    ///
    /// Returns the underlying error when the queue is full or the receiving
    /// connection task has gone away.
    pub fn try_send(
        &self,
        frame: OutboundFrame,
    ) -> Result<(), mpsc::error::TrySendError<OutboundFrame>> {
        self.queue.try_send(frame)
    }
}

/// Registry of currently connected sessions.
///
/// Register/unregister are idempotent and keyed by session id. Iteration via
/// [`all`](SessionRegistry::all) is over a point-in-time snapshot: a
/// registration that happens after the snapshot was taken is not observed by
/// it.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Session>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. Re-registering the same id replaces the entry.
    pub fn register(&self, session: Session) {
        debug!(session = %session.id(), "Session registered");
        self.sessions.insert(session.id().clone(), session);
    }

    /// Unregister a session by id.
    ///
    /// Returns `true` if the session was registered.
    pub fn unregister(&self, id: &SessionId) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            debug!(session = %id, "Session unregistered");
        }
        removed
    }

    /// Check if a session is registered.
    #[must_use]
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Look up a session by id.
    #[must_use]
    pub fn get(&self, id: &SessionId) -> Option<Session> {
        self.sessions.get(id).map(|s| s.value().clone())
    }

    /// Take a snapshot of all registered sessions.
    #[must_use]
    pub fn all(&self) -> Vec<Session> {
        self.sessions.iter().map(|s| s.value().clone()).collect()
    }

    /// Number of registered sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if no sessions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
