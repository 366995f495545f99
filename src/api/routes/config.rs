//! Configuration reload endpoint.

use axum::{extract::State, response::Json, routing::post, Router};
use serde_json::{json, Value};
use tracing::{error, info};

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/reload", post(reload))
        .with_state(state)
}

/// POST /config/reload - Re-read the config file. The previous config stays
/// active when the new one is invalid.
async fn reload(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let config = state.config.reload().await.map_err(|e| {
        error!("Config reload failed: {:#}", e);
        ApiError::internal(format!("Config reload failed: {:#}", e))
    })?;

    info!("Configuration reloaded");
    Ok(Json(json!({
        "status": "reloaded",
        "store": config.store.provider,
        "summarizer_enabled": config.summarizer.enabled && config.summarizer.api_key.is_some(),
    })))
}
