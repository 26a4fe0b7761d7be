use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Liveness check, no auth required.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let bot_state = state.supervisor.state().await;
    Json(json!({
        "status": "ok",
        "bot": bot_state.to_string(),
        "symbol": state.supervisor.symbol(),
    }))
}
