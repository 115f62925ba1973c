//! Connection handlers for the jointsync server.
//!
//! This module handles the connection lifecycle: register the session with
//! the sync engine, pump its outbound queue into the socket, and feed
//! decoded inbound events through the engine. A malformed message or a dead
//! session is logged and survived; nothing here is fatal to the process.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use jointsync_core::{Session, SessionId, SyncEngine};
use jointsync_protocol::{codec, ServerEvent};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Landing page served at `/`.
const INDEX_HTML: &str = include_str!("index.html");

/// Shared server state.
pub struct AppState {
    /// The synchronization engine.
    pub engine: SyncEngine,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            engine: SyncEngine::new(config.snapshot_broadcast_mode, config.suppress_sender_echo),
            config,
        }
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route("/", get(index_handler))
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("jointsync server listening on {}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Landing page handler.
async fn index_handler() -> impl IntoResponse {
    Html(INDEX_HTML)
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.engine.registry().len(),
        "joints": state.engine.store().len(),
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let session_id = SessionId::generate();
    debug!(session = %session_id, "WebSocket connected");

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Bounded outbound queue: the broadcast path drops frames for this
    // session when it falls behind instead of stalling other sessions.
    let (tx, mut outbound) = mpsc::channel(state.config.limits.session_queue_capacity);

    // Registering also queues the current snapshot for this session.
    state
        .engine
        .connect(Session::new(session_id.clone(), tx));
    metrics::set_active_joints(state.engine.store().len());

    loop {
        tokio::select! {
            biased;

            // Drain the outbound queue into the socket
            Some(frame) = outbound.recv() => {
                metrics::record_message(frame.len(), "outbound");
                if sender.send(Message::Text(frame.as_str().to_owned())).await.is_err() {
                    debug!(session = %session_id, "Send failed, closing");
                    break;
                }
            }

            // Receive from the WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics::record_message(text.len(), "inbound");
                        handle_text(&text, &session_id, &state);
                    }
                    Some(Ok(Message::Binary(data))) => {
                        // Some clients send text frames as binary.
                        metrics::record_message(data.len(), "inbound");
                        match std::str::from_utf8(&data) {
                            Ok(text) => handle_text(text, &session_id, &state),
                            Err(_) => {
                                warn!(session = %session_id, "Non-UTF-8 binary frame");
                                metrics::record_error("protocol");
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(session = %session_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(session = %session_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(session = %session_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    state.engine.disconnect(&session_id);
    debug!(session = %session_id, "WebSocket disconnected");
}

/// Decode one inbound text frame and run it through the engine.
///
/// Rejections are reported back to the offending session only; other
/// sessions see nothing.
fn handle_text(text: &str, session_id: &SessionId, state: &Arc<AppState>) {
    let event = match codec::decode_with_limit(text, state.config.limits.max_event_bytes) {
        Ok(event) => event,
        Err(e) => {
            warn!(session = %session_id, error = %e, "Rejected undecodable frame");
            metrics::record_error("protocol");
            reject(session_id, state, e.to_string());
            return;
        }
    };

    let kind = event.name();
    match state.engine.handle_event(session_id, event) {
        Ok(outcome) => {
            metrics::record_merge(kind);
            metrics::record_broadcast_drops(outcome.dropped);
            metrics::set_active_joints(state.engine.store().len());
        }
        Err(e) => {
            warn!(session = %session_id, error = %e, "Rejected malformed update");
            metrics::record_error("malformed");
            reject(session_id, state, e.to_string());
        }
    }
}

/// Send an error event to the originating session, best-effort.
fn reject(session_id: &SessionId, state: &Arc<AppState>, message: String) {
    state
        .engine
        .router()
        .send_to(session_id, &ServerEvent::error(message));
}
