//! Evidence store adapters.
//!
//! An [`EvidenceStore`] returns the scored meetings for a date window.
//! Providers:
//! - `bigquery`: BigQuery REST `jobs.query` with named parameters
//! - `json-file`: a local JSON array of rows in the same shape, for offline
//!   previews and fixtures
//!
//! Malformed rows are skipped and logged; only a failure to reach the store
//! at all aborts a fetch.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::StoreConfig;
use crate::meeting::{DateWindow, MeetingRecord};

pub mod bigquery;
pub mod json_file;
pub mod memory;
pub mod row;
pub mod token;

pub use bigquery::BigQueryStore;
pub use json_file::JsonFileStore;
pub use memory::StaticStore;
pub use row::{parse_row, parse_rows, RecordError, Row};
pub use token::TokenSource;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Evidence store unavailable: {0}")]
    Unavailable(String),

    #[error("Unexpected response from evidence store: {0}")]
    Protocol(String),
}

/// Records for one window plus the number of rows that were dropped.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub records: Vec<MeetingRecord>,
    pub skipped: usize,
}

#[async_trait]
pub trait EvidenceStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn fetch(&self, window: DateWindow) -> Result<FetchOutcome, StoreError>;
}

/// Builds the configured store provider.
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn EvidenceStore>> {
    let store: Arc<dyn EvidenceStore> = match config.provider.as_str() {
        "bigquery" => {
            let client = reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_seconds))
                .build()
                .context("Failed to build BigQuery HTTP client")?;
            let tokens = match &config.access_token {
                Some(token) => TokenSource::Static(token.clone()),
                None => TokenSource::metadata(client.clone()),
            };
            Arc::new(BigQueryStore::new(client, config, tokens)?)
        }
        "json-file" => {
            let path = config
                .json_path
                .clone()
                .context("store.json_path is required for the json-file provider")?;
            Arc::new(JsonFileStore::new(path))
        }
        other => bail!(
            "Unknown evidence store provider '{}'. Supported providers: bigquery, json-file",
            other
        ),
    };

    info!("Using {} evidence store", store.name());
    Ok(store)
}
