//! Broadcast fan-out for jointsync.
//!
//! The router delivers one server event to every registered session, with
//! per-session delivery isolation: each session has its own bounded queue,
//! sends never block, and a full or closed queue affects that session only.
//! A frame is encoded once and shared across the whole fan-out.

use crate::registry::{Session, SessionId, SessionRegistry};
use jointsync_protocol::{codec, ServerEvent};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, warn};

/// An encoded event shared across all deliveries of one broadcast.
pub type OutboundFrame = Arc<String>;

/// Per-session delivery result.
enum Delivery {
    /// Frame queued for the session.
    Queued,
    /// Session queue full; frame dropped for this session only.
    Dropped,
    /// Session queue closed; session unregistered.
    Gone,
}

/// Tally of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastOutcome {
    /// Sessions the frame was queued for.
    pub delivered: usize,
    /// Sessions that dropped the frame because their queue was full.
    pub dropped: usize,
}

impl std::ops::AddAssign for BroadcastOutcome {
    fn add_assign(&mut self, other: Self) {
        self.delivered += other.delivered;
        self.dropped += other.dropped;
    }
}

/// Fan-out of server events to registered sessions.
#[derive(Debug, Clone)]
pub struct BroadcastRouter {
    registry: Arc<SessionRegistry>,
}

impl BroadcastRouter {
    /// Create a router over a session registry.
    #[must_use]
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Deliver an event to every registered session except `exclude`.
    ///
    /// Delivery is best-effort and non-blocking: a session whose queue is
    /// full drops this frame (logged and counted), and a session whose
    /// connection task is gone is unregistered. Neither outcome affects the
    /// other sessions or the caller.
    ///
    /// Returns how many sessions the frame was queued for and how many
    /// dropped it, so callers can account for slow consumers.
    pub fn broadcast(&self, event: &ServerEvent, exclude: Option<&SessionId>) -> BroadcastOutcome {
        let frame = match self.encode(event) {
            Some(frame) => frame,
            None => return BroadcastOutcome::default(),
        };

        let mut outcome = BroadcastOutcome::default();
        for session in self.registry.all() {
            if exclude.is_some_and(|id| id == session.id()) {
                continue;
            }
            match self.deliver(&session, Arc::clone(&frame), event.name()) {
                Delivery::Queued => outcome.delivered += 1,
                Delivery::Dropped => outcome.dropped += 1,
                Delivery::Gone => {}
            }
        }

        debug!(
            event = event.name(),
            recipients = outcome.delivered,
            dropped = outcome.dropped,
            "Broadcast"
        );
        outcome
    }

    /// Deliver an event to a single session.
    ///
    /// Returns `true` if the frame was queued.
    pub fn send_to(&self, id: &SessionId, event: &ServerEvent) -> bool {
        let Some(frame) = self.encode(event) else {
            return false;
        };
        match self.registry.get(id) {
            Some(session) => matches!(
                self.deliver(&session, frame, event.name()),
                Delivery::Queued
            ),
            None => false,
        }
    }

    fn encode(&self, event: &ServerEvent) -> Option<OutboundFrame> {
        match codec::encode(event) {
            Ok(text) => Some(Arc::new(text)),
            Err(e) => {
                error!(event = event.name(), error = %e, "Failed to encode event");
                None
            }
        }
    }

    fn deliver(&self, session: &Session, frame: OutboundFrame, event_name: &str) -> Delivery {
        match session.try_send(frame) {
            Ok(()) => Delivery::Queued,
            Err(TrySendError::Full(_)) => {
                // Slow consumer: drop this frame for this session only.
                warn!(
                    session = %session.id(),
                    event = event_name,
                    "Outbound queue full, dropping frame"
                );
                Delivery::Dropped
            }
            Err(TrySendError::Closed(_)) => {
                debug!(
                    session = %session.id(),
                    "Outbound queue closed, unregistering session"
                );
                self.registry.unregister(session.id());
                Delivery::Gone
            }
        }
    }
}
