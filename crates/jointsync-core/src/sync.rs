//! The update cycle: validate, merge, rebroadcast.
//!
//! One inbound event is handled start-to-finish by the session's own task.
//! The store lock is released before any broadcast; fan-out works from the
//! returned snapshot and the echoed message, so slow session I/O never holds
//! up a merge.

use crate::broadcast::{BroadcastOutcome, BroadcastRouter};
use crate::merge::{self, MergeError};
use crate::registry::{Session, SessionId, SessionRegistry};
use crate::store::StateStore;
use jointsync_protocol::{ClientEvent, ServerEvent};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// When to broadcast the authoritative snapshot after a merge.
///
/// The `server_joints_update` event lets late or passive observers reconcile
/// on every change; leaner deployments can restrict it to full updates or
/// turn it off entirely and rely on the echoed updates alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotBroadcastMode {
    /// Broadcast the snapshot after every merge.
    Always,
    /// Broadcast the snapshot only after full updates.
    FullOnly,
    /// Never broadcast the snapshot after a merge.
    Never,
}

impl Default for SnapshotBroadcastMode {
    fn default() -> Self {
        Self::Always
    }
}

impl SnapshotBroadcastMode {
    fn after_full(self) -> bool {
        matches!(self, Self::Always | Self::FullOnly)
    }

    fn after_single(self) -> bool {
        matches!(self, Self::Always)
    }
}

/// The shared-state synchronization engine.
///
/// Owns the single process-wide [`StateStore`] and [`SessionRegistry`];
/// both live for the duration of the process.
#[derive(Debug, Clone)]
pub struct SyncEngine {
    store: Arc<StateStore>,
    registry: Arc<SessionRegistry>,
    router: BroadcastRouter,
    mode: SnapshotBroadcastMode,
    suppress_sender_echo: bool,
}

impl SyncEngine {
    /// Create an engine with empty state.
    ///
    /// When `suppress_sender_echo` is set, update broadcasts exclude the
    /// originating session; otherwise clients filter their own echoes via
    /// the pass-through `transmitterId` tag.
    #[must_use]
    pub fn new(mode: SnapshotBroadcastMode, suppress_sender_echo: bool) -> Self {
        info!(?mode, suppress_sender_echo, "Creating sync engine");
        let registry = Arc::new(SessionRegistry::new());
        Self {
            store: Arc::new(StateStore::new()),
            router: BroadcastRouter::new(Arc::clone(&registry)),
            registry,
            mode,
            suppress_sender_echo,
        }
    }

    /// The authoritative state store.
    #[must_use]
    pub fn store(&self) -> &StateStore {
        &self.store
    }

    /// The session registry.
    #[must_use]
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// The broadcast router, for targeted sends outside the update cycle.
    #[must_use]
    pub fn router(&self) -> &BroadcastRouter {
        &self.router
    }

    /// Register a newly connected session and bring it up to date.
    ///
    /// The current snapshot is sent to the new session immediately, so a
    /// client learns the shared state without having to send anything first.
    pub fn connect(&self, session: Session) {
        let id = session.id().clone();
        self.registry.register(session);
        self.router
            .send_to(&id, &ServerEvent::ServerJointsUpdate(self.store.snapshot()));
        debug!(session = %id, sessions = self.registry.len(), "Session connected");
    }

    /// Unregister a disconnected session. Idempotent.
    pub fn disconnect(&self, id: &SessionId) {
        self.registry.unregister(id);
        debug!(session = %id, sessions = self.registry.len(), "Session disconnected");
    }

    /// Handle one inbound event from a session: validate, merge, rebroadcast.
    ///
    /// Returns the combined fan-out tally across the echo and snapshot
    /// broadcasts, so callers can account for slow-consumer drops.
    ///
    /// # Errors
    ///
    /// Returns a [`MergeError`] for a malformed message; nothing is merged
    /// and nothing is broadcast in that case. The caller decides whether to
    /// report back to the sender.
    pub fn handle_event(
        &self,
        sender: &SessionId,
        event: ClientEvent,
    ) -> Result<BroadcastOutcome, MergeError> {
        let exclude = self.suppress_sender_echo.then_some(sender);
        let mut outcome = BroadcastOutcome::default();

        match event {
            ClientEvent::JointStates(msg) => {
                let pairs = merge::full_update_pairs(&msg)?;
                debug!(session = %sender, joints = pairs.len(), "Full update");
                self.store.merge_full(pairs);

                // Full updates echo exactly what was received.
                outcome += self.router.broadcast(&ServerEvent::JointStates(msg), exclude);
                if self.mode.after_full() {
                    outcome += self.broadcast_snapshot(exclude);
                }
            }
            ClientEvent::UpdateJoint(update) => {
                let (name, angle) = merge::single_update_pair(&update)?;
                debug!(session = %sender, joint = %name, angle, "Single update");
                self.store.merge_one(name, angle);

                outcome += self
                    .router
                    .broadcast(&ServerEvent::UpdateJoint(update), exclude);
                if self.mode.after_single() {
                    outcome += self.broadcast_snapshot(exclude);
                }
            }
        }

        Ok(outcome)
    }

    fn broadcast_snapshot(&self, exclude: Option<&SessionId>) -> BroadcastOutcome {
        self.router.broadcast(
            &ServerEvent::ServerJointsUpdate(self.store.snapshot()),
            exclude,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::OutboundFrame;
    use jointsync_protocol::{JointStateMessage, JointUpdate};
    use tokio::sync::mpsc;

    fn connect(engine: &SyncEngine, id: &str) -> mpsc::Receiver<OutboundFrame> {
        let (tx, rx) = mpsc::channel(16);
        engine.connect(Session::new(SessionId::from(id), tx));
        rx
    }

    fn event_name(frame: &OutboundFrame) -> String {
        let value: serde_json::Value = serde_json::from_str(frame).unwrap();
        value["event"].as_str().unwrap().to_string()
    }

    fn drain(rx: &mut mpsc::Receiver<OutboundFrame>) -> Vec<String> {
        let mut names = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            names.push(event_name(&frame));
        }
        names
    }

    #[tokio::test]
    async fn test_single_update_reaches_other_session() {
        let engine = SyncEngine::new(SnapshotBroadcastMode::Always, false);
        let mut rx_a = connect(&engine, "a");
        let mut rx_b = connect(&engine, "b");
        drain(&mut rx_a);
        drain(&mut rx_b);

        let sender = SessionId::from("a");
        engine
            .handle_event(
                &sender,
                ClientEvent::UpdateJoint(JointUpdate::new("elbow", 1.57)),
            )
            .unwrap();

        // B receives the echo and, in always mode, the snapshot.
        let frames: Vec<OutboundFrame> = {
            let mut frames = Vec::new();
            while let Ok(f) = rx_b.try_recv() {
                frames.push(f);
            }
            frames
        };
        assert_eq!(frames.len(), 2);

        let echo: serde_json::Value = serde_json::from_str(&frames[0]).unwrap();
        assert_eq!(echo["event"], "update_joint");
        assert_eq!(echo["data"]["jointName"], "elbow");

        let snapshot: serde_json::Value = serde_json::from_str(&frames[1]).unwrap();
        assert_eq!(snapshot["event"], "server_joints_update");
        assert_eq!(snapshot["data"]["elbow"], 1.57);

        // The sender gets the same frames (self-filtering is client-side).
        assert_eq!(drain(&mut rx_a).len(), 2);

        // A newly connecting session is brought up to date immediately.
        let mut rx_c = connect(&engine, "c");
        let frame = rx_c.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "server_joints_update");
        assert_eq!(value["data"]["elbow"], 1.57);
    }

    #[tokio::test]
    async fn test_full_update_echoes_verbatim() {
        let engine = SyncEngine::new(SnapshotBroadcastMode::Always, false);
        let mut rx_b = connect(&engine, "b");
        drain(&mut rx_b);

        let msg = JointStateMessage::from_pairs([
            ("shoulder".to_string(), 0.5),
            ("elbow".to_string(), 1.57),
        ]);
        engine
            .handle_event(&SessionId::from("a"), ClientEvent::JointStates(msg.clone()))
            .unwrap();

        let frame = rx_b.try_recv().unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "joint_states");
        assert_eq!(value["data"]["name"], serde_json::json!(["shoulder", "elbow"]));
        assert_eq!(value["data"]["position"], serde_json::json!([0.5, 1.57]));

        assert_eq!(engine.store().snapshot()["shoulder"], 0.5);
    }

    #[tokio::test]
    async fn test_snapshot_broadcast_modes() {
        for (mode, after_full, after_single) in [
            (SnapshotBroadcastMode::Always, true, true),
            (SnapshotBroadcastMode::FullOnly, true, false),
            (SnapshotBroadcastMode::Never, false, false),
        ] {
            let engine = SyncEngine::new(mode, false);
            let mut rx = connect(&engine, "observer");
            // The connect-time snapshot is sent in every mode.
            assert_eq!(
                drain(&mut rx),
                vec!["server_joints_update".to_string()],
                "connect snapshot in {:?}",
                mode
            );

            let sender = SessionId::from("writer");
            engine
                .handle_event(
                    &sender,
                    ClientEvent::JointStates(JointStateMessage::from_pairs([(
                        "elbow".to_string(),
                        1.0,
                    )])),
                )
                .unwrap();

            let mut expected = vec!["joint_states".to_string()];
            if after_full {
                expected.push("server_joints_update".to_string());
            }
            assert_eq!(drain(&mut rx), expected, "full update in {:?}", mode);

            engine
                .handle_event(
                    &sender,
                    ClientEvent::UpdateJoint(JointUpdate::new("elbow", 2.0)),
                )
                .unwrap();

            let mut expected = vec!["update_joint".to_string()];
            if after_single {
                expected.push("server_joints_update".to_string());
            }
            assert_eq!(drain(&mut rx), expected, "single update in {:?}", mode);
        }
    }

    #[tokio::test]
    async fn test_suppress_sender_echo() {
        let engine = SyncEngine::new(SnapshotBroadcastMode::Always, true);
        let mut rx_a = connect(&engine, "a");
        let mut rx_b = connect(&engine, "b");
        drain(&mut rx_a);
        drain(&mut rx_b);

        engine
            .handle_event(
                &SessionId::from("a"),
                ClientEvent::UpdateJoint(JointUpdate::new("elbow", 1.57)),
            )
            .unwrap();

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(
            drain(&mut rx_b),
            vec!["update_joint".to_string(), "server_joints_update".to_string()]
        );
    }

    #[tokio::test]
    async fn test_malformed_message_merges_and_broadcasts_nothing() {
        let engine = SyncEngine::new(SnapshotBroadcastMode::Always, false);
        let mut rx_b = connect(&engine, "b");
        drain(&mut rx_b);

        let msg = JointStateMessage {
            name: vec!["a".to_string(), "b".to_string()],
            position: vec![1.0],
            ..JointStateMessage::default()
        };
        let result = engine.handle_event(&SessionId::from("a"), ClientEvent::JointStates(msg));
        assert!(matches!(result, Err(MergeError::LengthMismatch { .. })));

        let result = engine.handle_event(
            &SessionId::from("a"),
            ClientEvent::UpdateJoint(JointUpdate::new("elbow", f64::NAN)),
        );
        assert!(matches!(result, Err(MergeError::NonFiniteAngle { .. })));

        assert!(engine.store().is_empty());
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn test_slow_session_drops_are_tallied() {
        let engine = SyncEngine::new(SnapshotBroadcastMode::Always, false);

        // Capacity 1: the connect-time snapshot fills the queue, so both
        // frames of the next update cycle are dropped for this session.
        let (tx, mut rx) = mpsc::channel(1);
        engine.connect(Session::new(SessionId::from("slow"), tx));

        let outcome = engine
            .handle_event(
                &SessionId::from("writer"),
                ClientEvent::UpdateJoint(JointUpdate::new("elbow", 1.57)),
            )
            .unwrap();

        assert_eq!(outcome.delivered, 0);
        assert_eq!(outcome.dropped, 2);

        // The update was still merged and the session stays registered.
        assert_eq!(engine.store().snapshot()["elbow"], 1.57);
        assert!(engine.registry().contains(&SessionId::from("slow")));
        assert_eq!(drain(&mut rx), vec!["server_joints_update".to_string()]);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let engine = SyncEngine::new(SnapshotBroadcastMode::Always, false);
        let _rx = connect(&engine, "a");
        assert_eq!(engine.registry().len(), 1);

        engine.disconnect(&SessionId::from("a"));
        engine.disconnect(&SessionId::from("a"));
        assert!(engine.registry().is_empty());
    }
}
