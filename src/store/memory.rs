use async_trait::async_trait;

use super::{EvidenceStore, FetchOutcome, StoreError};
use crate::meeting::{DateWindow, MeetingRecord};

/// A fixed set of records held in memory. Returns the records inside the
/// requested window, or a configured outage.
pub struct StaticStore {
    records: Vec<MeetingRecord>,
    outage: Option<String>,
}

impl StaticStore {
    pub fn new(records: Vec<MeetingRecord>) -> Self {
        Self {
            records,
            outage: None,
        }
    }

    /// A store that always reports itself unreachable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            outage: Some(reason.into()),
        }
    }
}

#[async_trait]
impl EvidenceStore for StaticStore {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn fetch(&self, window: DateWindow) -> Result<FetchOutcome, StoreError> {
        if let Some(reason) = &self.outage {
            return Err(StoreError::Unavailable(reason.clone()));
        }

        Ok(FetchOutcome {
            records: self
                .records
                .iter()
                .filter(|record| window.contains(record.date))
                .cloned()
                .collect(),
            skipped: 0,
        })
    }
}
