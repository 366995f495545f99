use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

use super::{parse_rows, EvidenceStore, FetchOutcome, StoreError};
use crate::meeting::DateWindow;

/// Reads rows from a JSON array on disk, in the same column shape the
/// BigQuery store produces. Used for offline previews and fixtures.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EvidenceStore for JsonFileStore {
    fn name(&self) -> &'static str {
        "JSON file"
    }

    async fn fetch(&self, window: DateWindow) -> Result<FetchOutcome, StoreError> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            StoreError::Unavailable(format!("cannot read {}: {}", self.path.display(), e))
        })?;

        let values: Vec<Value> = serde_json::from_str(&content).map_err(|e| {
            StoreError::Protocol(format!(
                "{} is not a JSON array of rows: {}",
                self.path.display(),
                e
            ))
        })?;

        let mut non_objects = 0;
        let rows: Vec<_> = values
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(row) => Some(row),
                other => {
                    warn!("Skipping non-object row: {}", other);
                    non_objects += 1;
                    None
                }
            })
            .collect();

        let mut outcome = parse_rows(rows);
        outcome.skipped += non_objects;
        outcome.records.retain(|record| window.contains(record.date));

        info!(
            "Loaded {} meetings for {} from {}",
            outcome.records.len(),
            window,
            self.path.display()
        );
        Ok(outcome)
    }
}
