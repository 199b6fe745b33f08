//! WebSocket Handler
//!
//! Upgrades `GET /api/v1/ws` requests and hands each connection to the hub
//! as a new session.

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use futures_util::StreamExt;
use std::sync::Arc;

use super::hub::ConnectionHub;
use super::session::ClientSession;
use super::transport::{FrameSink, WsSink, WsSource};
use crate::api::AppState;

/// WebSocket upgrade handler
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Drive one upgraded connection until it closes
async fn handle_socket(socket: WebSocket, hub: ConnectionHub) {
    let (sink, stream) = socket.split();
    let mut sink = WsSink::new(sink);

    let session = ClientSession::new(hub.config().session_queue_capacity);
    let session_id = session.id();

    let session = match session.register(&hub).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(session_id = %session_id, error = %e, "Failed to register WebSocket session");
            sink.close().await;
            return;
        }
    };

    let reason = session.run(sink, WsSource::new(stream)).await;
    tracing::debug!(session_id = %session_id, reason = %reason, "WebSocket connection released");
}
