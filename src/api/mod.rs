//! REST API server for the insights mailer.
//!
//! Provides HTTP endpoints for:
//! - Service info and health
//! - Email preview and delivery
//! - Raw data inspection
//! - Configuration reload

pub mod error;
pub mod routes;
pub mod state;

use anyhow::{Context, Result};
use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::{self, Next},
    response::Response,
    Router,
};
use tower::ServiceBuilder;
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, ConfigHandle};
pub use state::{AppState, RequestId, ServiceFactory};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub struct ApiServer {
    host: String,
    port: u16,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: &Config, handle: ConfigHandle) -> Self {
        Self {
            host: config.server.host.clone(),
            port: config.server.port,
            state: AppState::new(handle),
        }
    }

    pub async fn start(self) -> Result<()> {
        let app = router(self.state);
        let addr = format!("{}:{}", self.host, self.port);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;

        info!("API server listening on http://{}", addr);
        info!("Endpoints:");
        info!("  GET  /               - Service info");
        info!("  GET  /health         - Health check");
        info!("  GET  /email/preview  - Render the weekly report");
        info!("  POST /email/send     - Render and deliver the weekly report");
        info!("  GET  /debug/data     - Raw records and signals");
        info!("  POST /config/reload  - Re-read configuration");

        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// The full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::service::router())
        .nest("/email", routes::email::router(state.clone()))
        .nest("/debug", routes::debug::router(state.clone()))
        .nest("/config", routes::config::router(state))
        .layer(ServiceBuilder::new().layer(middleware::from_fn(request_id)))
}

/// Tags each request with a fresh id, logs it, and echoes it back in the
/// `X-Request-ID` header.
async fn request_id(mut request: Request, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    info!("[{}] {} {}", id, method, path);
    request.extensions_mut().insert(RequestId(id.clone()));

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    info!("[{}] {} {} -> {}", id, method, path, response.status());
    response
}
