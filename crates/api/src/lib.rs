mod auth;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use engine::SupervisorHandle;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub supervisor: SupervisorHandle,
    /// When set, `/start` and `/stop` require `Authorization: Bearer <token>`.
    pub dashboard_token: Option<Arc<str>>,
}

impl AppState {
    pub fn new(supervisor: SupervisorHandle, dashboard_token: Option<String>) -> Self {
        Self {
            supervisor,
            dashboard_token: dashboard_token.map(Arc::from),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::control_router(state.clone()))
        .merge(routes::candles_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors)
}

/// Build and run the HTTP control API.
pub async fn serve(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    info!(%addr, "Control API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await
}
