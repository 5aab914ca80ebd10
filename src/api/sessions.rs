use crate::hub::SessionRegistry;
use crate::protocol::Snapshot;
use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use std::sync::Arc;

/// Shared application state for the read-only roster API
#[derive(Clone)]
pub struct SessionsAppState {
    pub registry: Arc<SessionRegistry>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sessions: usize,
}

pub fn create_sessions_router(state: Arc<SessionsAppState>) -> Router {
    Router::new()
        .route("/api/sessions", get(list_sessions))
        .route("/health", get(health))
        .with_state(state)
}

/// GET /api/sessions - snapshots of every connected session
async fn list_sessions(State(state): State<Arc<SessionsAppState>>) -> Json<Vec<Snapshot>> {
    let mut snapshots = state.registry.snapshots();
    snapshots.sort_by(|a, b| a.id.cmp(&b.id));
    Json(snapshots)
}

/// GET /health
async fn health(State(state): State<Arc<SessionsAppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        sessions: state.registry.len(),
    })
}
