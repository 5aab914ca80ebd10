// HTTP and WebSocket APIs

pub mod sessions;
pub mod websocket;

pub use sessions::{create_sessions_router, SessionsAppState};
pub use websocket::{create_ws_router, ws_handler, WsAppState};

use crate::hub::HubHandle;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Build the full application router for a running hub
pub fn create_router(hub: HubHandle) -> Router {
    let sessions_state = Arc::new(SessionsAppState {
        registry: Arc::clone(hub.registry()),
    });
    let ws_state = Arc::new(WsAppState { hub });

    Router::new()
        .merge(create_ws_router(ws_state))
        .merge(create_sessions_router(sessions_state))
        .layer(CorsLayer::permissive())
}
