use std::sync::Arc;

use super::error::ApiError;
use crate::config::{Config, ConfigHandle};
use crate::pipeline::ReportService;

/// Builds a report service from a config snapshot.
pub type ServiceFactory = Arc<dyn Fn(&Config) -> anyhow::Result<ReportService> + Send + Sync>;

/// Shared state for every handler: the reloadable config and the way
/// services are wired from it.
#[derive(Clone)]
pub struct AppState {
    pub config: ConfigHandle,
    factory: ServiceFactory,
}

impl AppState {
    pub fn new(config: ConfigHandle) -> Self {
        Self::with_factory(config, Arc::new(ReportService::from_config))
    }

    pub fn with_factory(config: ConfigHandle, factory: ServiceFactory) -> Self {
        Self { config, factory }
    }

    pub fn service(&self, config: &Config) -> Result<ReportService, ApiError> {
        (self.factory)(config).map_err(ApiError::from)
    }
}

/// Id assigned to each request by the request-id middleware.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);
