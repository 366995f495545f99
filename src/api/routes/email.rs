//! Email preview and send endpoints.
//!
//! - `GET /email/preview?days=N&end=YYYY-MM-DD&mode=insights|coaching` renders
//!   the report as HTML
//! - `POST /email/send` renders and delivers it

use axum::{
    body::Bytes,
    extract::{Query, State},
    response::{Html, Json},
    routing::{get, post},
    Extension, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::{AppState, RequestId};
use crate::pipeline::{resolve_recipient, resolve_window};
use crate::report::ReportMode;

#[derive(Debug, Default, Deserialize)]
pub struct PreviewParams {
    pub days: Option<u32>,
    pub end: Option<NaiveDate>,
    pub mode: Option<ReportMode>,
}

/// Request body for `POST /email/send`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct SendRequest {
    pub to: Option<String>,
    pub days: Option<u32>,
    pub end: Option<NaiveDate>,
    pub mode: Option<ReportMode>,
}

/// An empty body means defaults; anything else must be a valid request.
fn parse_send_request(body: &[u8]) -> ApiResult<SendRequest> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(SendRequest::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/preview", get(preview_email))
        .route("/send", post(send_email))
        .with_state(state)
}

async fn preview_email(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(params): Query<PreviewParams>,
) -> ApiResult<Html<String>> {
    let config = state.config.snapshot().await;
    let today = config.report.today();
    let window = resolve_window(&config.report, today, params.days, params.end)?;
    let mode = params.mode.unwrap_or_default();

    info!("[{}] Generating {} preview for {}", request_id, mode, window);
    let service = state.service(&config)?;
    let generated = service.generate(mode, window, today).await?;

    info!(
        "[{}] Preview ready: {} meetings, {} bytes",
        request_id,
        generated.report.metrics.total_meetings,
        generated.html.len()
    );
    Ok(Html(generated.html))
}

async fn send_email(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let request = parse_send_request(&body)?;
    let config = state.config.snapshot().await;

    let recipient = resolve_recipient(request.to.as_deref(), &config.delivery.default_recipient)?;
    let today = config.report.today();
    let window = resolve_window(&config.report, today, request.days, request.end)?;
    let mode = request.mode.unwrap_or_default();

    info!(
        "[{}] Sending {} report for {} to {}",
        request_id, mode, window, recipient
    );
    let service = state.service(&config)?;
    let outcome = service.send(&recipient, mode, window, today).await?;

    Ok(Json(json!({
        "status": outcome.receipt.status,
        "message": outcome.receipt.message,
        "to": outcome.recipient,
        "subject": outcome.subject,
        "mode": mode,
        "total_meetings": outcome.total_meetings,
        "request_id": request_id,
    })))
}
