use crate::resource::ResourceTree;
use crate::subscription::ConnectionManager;
use axum::{
    extract::{
        ws::{WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// Shared application state for WebSocket handler
pub struct WsAppState {
    pub tree: Arc<ResourceTree>,
    /// Notification queue depth per connection
    pub observe_buffer: usize,
}

/// GET /api/ws - WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<WsAppState>>) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Create WebSocket router
pub fn create_ws_router(state: Arc<WsAppState>) -> Router {
    Router::new()
        .route("/api/ws", get(ws_handler))
        .with_state(state)
}

/// Handle WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<WsAppState>) {
    let (notification_tx, notification_rx) = mpsc::channel(state.observe_buffer);

    let manager = ConnectionManager::new(Arc::clone(&state.tree), notification_tx);

    manager.handle(socket, notification_rx).await;
}
