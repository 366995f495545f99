//! Narrative summarizer.
//!
//! Turns a composed [`Report`] into a short prose briefing using an
//! OpenAI-compatible Chat Completions endpoint. Called at most once per
//! report; any failure leaves the fallback narrative in place.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SummarizerConfig;
use crate::report::{Narrative, Report};

mod openai;
mod prompt;

pub use openai::OpenAiSummarizer;
pub use prompt::{system_prompt, user_prompt};

#[derive(Error, Debug)]
pub enum SummarizerError {
    #[error("summarizer is disabled")]
    Disabled,

    #[error("summarizer request failed: {0}")]
    Request(String),

    #[error("summarizer API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid summarizer response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait NarrativeSummarizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn summarize(&self, report: &Report) -> Result<String, SummarizerError>;
}

/// Stand-in used when no model is configured.
pub struct DisabledSummarizer;

#[async_trait]
impl NarrativeSummarizer for DisabledSummarizer {
    fn name(&self) -> &'static str {
        "disabled"
    }

    async fn summarize(&self, _report: &Report) -> Result<String, SummarizerError> {
        Err(SummarizerError::Disabled)
    }
}

pub fn build_summarizer(config: &SummarizerConfig, brand: &str) -> Result<Arc<dyn NarrativeSummarizer>> {
    let api_key = match (&config.api_key, config.enabled) {
        (Some(key), true) if !key.trim().is_empty() => key.clone(),
        _ => {
            debug!("Summarizer disabled or missing API key");
            return Ok(Arc::new(DisabledSummarizer));
        }
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()
        .context("Failed to build summarizer HTTP client")?;

    Ok(Arc::new(OpenAiSummarizer::new(client, config, api_key, brand)))
}

/// Asks the summarizer for a narrative when the report has content.
/// Errors and blank replies keep the fallback text.
pub async fn apply_narrative(summarizer: &dyn NarrativeSummarizer, report: &mut Report) {
    if !report.wants_narrative() {
        debug!("Skipping summarizer: {:?} narrative", report.narrative.source);
        return;
    }

    match summarizer.summarize(report).await {
        Ok(text) if !text.trim().is_empty() => {
            info!("Narrative generated by {} ({} chars)", summarizer.name(), text.len());
            report.narrative = Narrative::generated(text.trim());
        }
        Ok(_) => warn!("Summarizer returned an empty narrative, using fallback"),
        Err(SummarizerError::Disabled) => debug!("Summarizer disabled, using fallback narrative"),
        Err(e) => warn!("Summarizer failed, using fallback narrative: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meeting::{DateWindow, FieldKind, MeetingRecord};
    use crate::report::{AnalyzedMeeting, ComposeOptions, Composer, NarrativeSource};
    use crate::signals::SignalExtractor;
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Scripted {
        reply: Result<String, u16>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(reply: Result<&str, u16>) -> Self {
            Self {
                reply: reply.map(str::to_string),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NarrativeSummarizer for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn summarize(&self, _report: &Report) -> Result<String, SummarizerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(status) => Err(SummarizerError::Api {
                    status: *status,
                    message: "overloaded".to_string(),
                }),
            }
        }
    }

    fn report(records: Vec<MeetingRecord>) -> Report {
        let extractor = SignalExtractor::new().unwrap();
        let meetings = records
            .into_iter()
            .map(|record| AnalyzedMeeting {
                signals: extractor.extract(&record),
                record,
            })
            .collect();
        let today = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        Composer::new(ComposeOptions::default())
            .unwrap()
            .compose(meetings, DateWindow::ending(today, 7).unwrap(), today)
    }

    fn qualified_meeting() -> MeetingRecord {
        MeetingRecord::new("m1", NaiveDate::from_ymd_opt(2025, 3, 12).unwrap())
            .with_client("Footballco")
            .with_score(5, true)
            .with_evidence(FieldKind::Measure, true, "£2.2M ARR target")
    }

    #[tokio::test]
    async fn test_generated_narrative_replaces_fallback() {
        let summarizer = Scripted::new(Ok("  ## This week\nStrong pipeline.  "));
        let mut report = report(vec![qualified_meeting()]);

        apply_narrative(&summarizer, &mut report).await;

        assert_eq!(report.narrative.source, NarrativeSource::Summarizer);
        assert_eq!(report.narrative.text, "## This week\nStrong pipeline.");
    }

    #[tokio::test]
    async fn test_error_keeps_fallback() {
        let summarizer = Scripted::new(Err(529));
        let mut report = report(vec![qualified_meeting()]);

        apply_narrative(&summarizer, &mut report).await;

        assert_eq!(report.narrative, Narrative::fallback());
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_blank_reply_keeps_fallback() {
        let summarizer = Scripted::new(Ok("   \n"));
        let mut report = report(vec![qualified_meeting()]);

        apply_narrative(&summarizer, &mut report).await;

        assert_eq!(report.narrative.source, NarrativeSource::Fallback);
    }

    #[tokio::test]
    async fn test_empty_report_never_calls_summarizer() {
        let summarizer = Scripted::new(Ok("should not be used"));
        let mut report = report(Vec::new());

        apply_narrative(&summarizer, &mut report).await;

        assert_eq!(report.narrative, Narrative::no_meetings());
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disabled_summarizer_keeps_fallback() {
        let mut report = report(vec![qualified_meeting()]);
        apply_narrative(&DisabledSummarizer, &mut report).await;
        assert_eq!(report.narrative, Narrative::fallback());
    }

    #[test]
    fn test_build_summarizer_without_key_is_disabled() {
        let config = SummarizerConfig {
            api_key: None,
            ..SummarizerConfig::default()
        };
        assert_eq!(build_summarizer(&config, "Brand").unwrap().name(), "disabled");

        let config = SummarizerConfig {
            api_key: Some("sk-test".to_string()),
            enabled: false,
            ..SummarizerConfig::default()
        };
        assert_eq!(build_summarizer(&config, "Brand").unwrap().name(), "disabled");

        let config = SummarizerConfig {
            api_key: Some("sk-test".to_string()),
            ..SummarizerConfig::default()
        };
        assert_eq!(build_summarizer(&config, "Brand").unwrap().name(), "OpenAI");
    }
}
