use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use common::AnalyzedCandle;

use crate::AppState;

pub fn candles_router() -> Router<AppState> {
    Router::new().route("/candles", get(get_candles))
}

#[derive(Deserialize)]
struct CandlesQuery {
    symbol: Option<String>,
}

/// Latest analyzed window for chart rendering.
async fn get_candles(
    State(state): State<AppState>,
    Query(q): Query<CandlesQuery>,
) -> Json<Vec<AnalyzedCandle>> {
    Json(
        state
            .supervisor
            .latest_analyzed_candles(q.symbol.as_deref())
            .await,
    )
}
