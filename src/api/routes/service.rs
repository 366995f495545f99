//! Service info and health endpoints.

use axum::{response::Json, routing::get, Router};
use serde_json::{json, Value};

pub fn router() -> Router {
    Router::new()
        .route("/", get(status))
        .route("/health", get(health))
}

/// GET / - Service info.
async fn status() -> Json<Value> {
    Json(json!({
        "service": "insights-mailer",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": [
            "GET /health",
            "GET /email/preview",
            "POST /email/send",
            "GET /debug/data",
            "POST /config/reload"
        ]
    }))
}

/// GET /health - Liveness check.
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
