use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};

use common::{ActionResult, StatusReport};

use crate::{auth::require_auth, AppState};

/// `/start` and `/stop` sit behind the bearer check; `/status` is open.
pub fn control_router(state: AppState) -> Router<AppState> {
    let guarded = Router::new()
        .route("/start", post(start_bot))
        .route("/stop", post(stop_bot))
        .route_layer(middleware::from_fn_with_state(state, require_auth));

    Router::new().route("/status", get(status)).merge(guarded)
}

async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    Json(state.supervisor.status().await)
}

async fn start_bot(State(state): State<AppState>) -> Json<ActionResult> {
    Json(state.supervisor.start().await)
}

async fn stop_bot(State(state): State<AppState>) -> Json<ActionResult> {
    Json(state.supervisor.stop().await)
}
