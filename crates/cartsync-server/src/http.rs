//! HTTP surface: WebSocket endpoint, cart history query and static files.

use crate::connection;
use crate::hub::HubHandle;
use crate::keepalive::Keepalive;
use axum::{
    Json, Router,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::Response,
    routing::get,
};
use cartsync_core::{CartHistory, HISTORY_LIMIT};
use cartsync_store::CartStore;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Largest inbound WebSocket message accepted by default.
pub const MAX_MESSAGE_SIZE: usize = 512 * 512;

#[derive(Clone)]
pub struct AppState {
    hub: HubHandle,
    history: Arc<Mutex<dyn CartStore>>,
    keepalive: Keepalive,
    max_message_size: usize,
}

impl AppState {
    /// `history` should be a read-only view of the hub's store; the query
    /// endpoint never writes.
    pub fn new(hub: HubHandle, history: impl CartStore, keepalive: Keepalive) -> Self {
        Self {
            hub,
            history: Arc::new(Mutex::new(history)),
            keepalive,
            max_message_size: MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_max_message_size(mut self, max_message_size: usize) -> Self {
        self.max_message_size = max_message_size;
        self
    }
}

pub fn router(state: AppState, public_dir: impl AsRef<Path>) -> Router {
    Router::new()
        .route("/ws", get(upgrade))
        .route("/api/v1/carts", get(list_carts))
        .fallback_service(ServeDir::new(public_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let AppState {
        hub,
        keepalive,
        max_message_size,
        ..
    } = state;
    ws.max_message_size(max_message_size)
        .on_failed_upgrade(|e| tracing::warn!("WebSocket upgrade failed: {}", e))
        .on_upgrade(move |socket| connection::serve(socket, hub, keepalive))
}

async fn list_carts(
    State(state): State<AppState>,
) -> Result<Json<CartHistory>, (StatusCode, &'static str)> {
    let history = state.history.clone();
    let result = tokio::task::spawn_blocking(move || match history.lock() {
        Ok(store) => store.history(HISTORY_LIMIT).map_err(|e| e.to_string()),
        Err(_) => Err("history store lock poisoned".to_string()),
    })
    .await;

    match result {
        Ok(Ok(history)) => Ok(Json(history)),
        Ok(Err(e)) => {
            tracing::error!("Error fetching carts: {}", e);
            Err((StatusCode::BAD_GATEWAY, "Error fetching data from API"))
        }
        Err(e) => {
            tracing::error!("Cart query task failed: {}", e);
            Err((StatusCode::BAD_GATEWAY, "Error fetching data from API"))
        }
    }
}
