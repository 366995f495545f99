//! Raw data inspection endpoint.

use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Extension, Router,
};
use serde::Deserialize;
use tracing::info;

use crate::api::error::ApiResult;
use crate::api::state::{AppState, RequestId};
use crate::pipeline::{resolve_window, DebugData};

#[derive(Debug, Default, Deserialize)]
pub struct DebugParams {
    pub days: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/data", get(debug_data))
        .with_state(state)
}

/// GET /debug/data - First records of the window with their signals, plus metrics.
async fn debug_data(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(params): Query<DebugParams>,
) -> ApiResult<Json<DebugData>> {
    let config = state.config.snapshot().await;
    let today = config.report.today();
    let window = resolve_window(&config.report, today, params.days, None)?;

    info!("[{}] Fetching debug data for {}", request_id, window);
    let data = state.service(&config)?.debug_data(window, today).await?;
    Ok(Json(data))
}
