use crate::api::ApiServer;
use crate::config::{Config, ConfigHandle};
use anyhow::Result;
use tracing::{info, warn};

pub async fn run_service() -> Result<()> {
    info!("Starting insights mailer service");

    let config = Config::load()?;
    config.validate()?;

    info!(
        "Evidence store: {} ({})",
        config.store.provider,
        match config.store.provider.as_str() {
            "bigquery" => config.store.table_id(),
            _ => config.store.json_path.clone().unwrap_or_default(),
        }
    );
    if config.delivery.default_recipient.is_empty() {
        warn!("No default recipient configured; POST /email/send needs an explicit \"to\"");
    }

    let server = ApiServer::new(&config, ConfigHandle::new(config.clone()));

    tokio::select! {
        result = server.start() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutting down"),
    }

    Ok(())
}
