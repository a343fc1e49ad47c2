use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Health check endpoint, no auth required.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.service.snapshot().ok();
    Json(json!({
        "status": "ok",
        "universe": state.service.universe().len(),
        "last_refresh": snapshot.as_ref().map(|s| s.computed_at),
        "scored": snapshot.as_ref().map(|s| s.scored.len()),
    }))
}
