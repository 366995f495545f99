//! Report pipeline: fetch, extract, compose, summarize, render, deliver.
//!
//! Every run is sequential and owns its data. The HTTP handlers and the CLI
//! both go through [`ReportService`].

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, ReportConfig};
use crate::delivery::{build_delivery, Delivery, DeliveryAdapter, DeliveryError, DeliveryReceipt};
use crate::meeting::DateWindow;
use crate::render::{email_subject, RenderOptions, Renderer};
use crate::report::{
    period_totals, week_over_week, AnalyzedMeeting, ComposeOptions, Composer, PeriodTotals,
    Report, ReportMode, SummaryMetrics, WeekOverWeek,
};
use crate::signals::SignalExtractor;
use crate::store::{build_store, EvidenceStore, StoreError};
use crate::summarizer::{apply_narrative, build_summarizer, NarrativeSummarizer};

/// Longest look-back a caller may request.
pub const MAX_WINDOW_DAYS: u32 = 365;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Data unavailable: {0}")]
    DataUnavailable(#[from] StoreError),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("No recipient given and no default recipient configured")]
    MissingRecipient,

    #[error("Invalid window: {0}")]
    InvalidWindow(String),
}

/// A rendered report ready to preview or send.
#[derive(Debug, Clone)]
pub struct GeneratedReport {
    pub report: Report,
    pub html: String,
    pub subject: String,
    /// Rows dropped as malformed while fetching.
    pub skipped: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SendOutcome {
    pub recipient: String,
    pub subject: String,
    pub receipt: DeliveryReceipt,
    pub total_meetings: usize,
}

/// Raw records and their signals, for inspecting what the store returns.
#[derive(Debug, Clone, Serialize)]
pub struct DebugData {
    pub window: DateWindow,
    pub total_records: usize,
    pub skipped: usize,
    pub sample: Vec<AnalyzedMeeting>,
    pub metrics: SummaryMetrics,
}

/// The look-back window ending at `end` (default: today).
pub fn resolve_window(
    config: &ReportConfig,
    today: NaiveDate,
    days: Option<u32>,
    end: Option<NaiveDate>,
) -> Result<DateWindow, PipelineError> {
    let days = days.unwrap_or(config.days);
    if days == 0 || days > MAX_WINDOW_DAYS {
        return Err(PipelineError::InvalidWindow(format!(
            "days must be between 1 and {}, got {}",
            MAX_WINDOW_DAYS, days
        )));
    }
    let end = end.unwrap_or(today);
    DateWindow::ending(end, days).ok_or_else(|| {
        PipelineError::InvalidWindow(format!(
            "a {}-day window ending {} starts before the earliest supported date",
            days, end
        ))
    })
}

/// An explicit recipient wins over the configured default.
pub fn resolve_recipient(explicit: Option<&str>, default: &str) -> Result<String, PipelineError> {
    explicit
        .map(str::trim)
        .filter(|to| !to.is_empty())
        .or_else(|| Some(default.trim()).filter(|to| !to.is_empty()))
        .map(str::to_string)
        .ok_or(PipelineError::MissingRecipient)
}

pub struct ReportService {
    store: Arc<dyn EvidenceStore>,
    summarizer: Arc<dyn NarrativeSummarizer>,
    delivery: Arc<dyn DeliveryAdapter>,
    extractor: SignalExtractor,
    composer: Composer,
    renderer: Renderer,
    debug_sample: usize,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn EvidenceStore>,
        summarizer: Arc<dyn NarrativeSummarizer>,
        delivery: Arc<dyn DeliveryAdapter>,
        report: &ReportConfig,
    ) -> Result<Self> {
        Ok(Self {
            store,
            summarizer,
            delivery,
            extractor: SignalExtractor::new()?,
            composer: Composer::new(ComposeOptions::from(report))?,
            renderer: Renderer::new(RenderOptions {
                brand: report.brand.clone(),
            })?,
            debug_sample: report.debug_sample,
        })
    }

    /// Wires the configured providers together.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            build_store(&config.store)?,
            build_summarizer(&config.summarizer, &config.report.brand)?,
            build_delivery(&config.delivery)?,
            &config.report,
        )
    }

    async fn analyze(&self, window: DateWindow) -> Result<(Vec<AnalyzedMeeting>, usize), PipelineError> {
        let outcome = self.store.fetch(window).await?;
        if outcome.skipped > 0 {
            warn!("{} malformed rows skipped for {}", outcome.skipped, window);
        }

        let meetings = outcome
            .records
            .into_iter()
            .map(|record| AnalyzedMeeting {
                signals: self.extractor.extract(&record),
                record,
            })
            .collect();
        Ok((meetings, outcome.skipped))
    }

    /// Totals for the window before `window`, or `None` when they cannot be read.
    async fn trends(&self, window: DateWindow, report: &Report) -> Option<WeekOverWeek> {
        let Some(previous) = window.preceding() else {
            warn!("No window precedes {}, skipping trends", window);
            return None;
        };
        match self.store.fetch(previous).await {
            Ok(outcome) => Some(week_over_week(
                PeriodTotals::from(&report.metrics),
                period_totals(&outcome.records),
            )),
            Err(e) => {
                warn!("Previous period {} unavailable, skipping trends: {}", previous, e);
                None
            }
        }
    }

    /// Builds and renders the report without delivering it.
    pub async fn generate(
        &self,
        mode: ReportMode,
        window: DateWindow,
        today: NaiveDate,
    ) -> Result<GeneratedReport, PipelineError> {
        let (meetings, skipped) = self.analyze(window).await?;
        info!(
            "Composing {} report for {} from {} meetings",
            mode,
            window,
            meetings.len()
        );

        let mut report = self.composer.compose_for(mode, meetings, window, today);
        report.trends = self.trends(window, &report).await;
        apply_narrative(self.summarizer.as_ref(), &mut report).await;

        let html = self.renderer.render_report(&report);
        let subject = email_subject(self.renderer.brand(), mode, today);

        Ok(GeneratedReport {
            report,
            html,
            subject,
            skipped,
        })
    }

    /// Generates the report and delivers it once. An empty report is still sent.
    pub async fn send(
        &self,
        recipient: &str,
        mode: ReportMode,
        window: DateWindow,
        today: NaiveDate,
    ) -> Result<SendOutcome, PipelineError> {
        let generated = self.generate(mode, window, today).await?;

        let delivery = Delivery {
            to: recipient.to_string(),
            subject: generated.subject.clone(),
            html: generated.html,
        };
        let receipt = self.delivery.deliver(&delivery).await?;

        Ok(SendOutcome {
            recipient: delivery.to,
            subject: delivery.subject,
            receipt,
            total_meetings: generated.report.metrics.total_meetings,
        })
    }

    pub async fn debug_data(&self, window: DateWindow, today: NaiveDate) -> Result<DebugData, PipelineError> {
        let (meetings, skipped) = self.analyze(window).await?;
        let total_records = meetings.len();
        let sample = meetings.iter().take(self.debug_sample).cloned().collect();
        let metrics = self.composer.compose(meetings, window, today).metrics;

        Ok(DebugData {
            window,
            total_records,
            skipped,
            sample,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_resolve_window_defaults_and_bounds() {
        let config = ReportConfig::default();
        let today = date(2025, 3, 14);

        let window = resolve_window(&config, today, None, None).unwrap();
        assert_eq!(window, DateWindow::ending(today, 7).unwrap());

        let window = resolve_window(&config, today, Some(40), Some(date(2025, 2, 28))).unwrap();
        assert_eq!(window.start, date(2025, 1, 19));
        assert_eq!(window.end, date(2025, 2, 28));

        assert!(matches!(
            resolve_window(&config, today, Some(0), None),
            Err(PipelineError::InvalidWindow(_))
        ));
        assert!(resolve_window(&config, today, Some(366), None).is_err());
    }

    #[test]
    fn test_resolve_window_before_earliest_date_is_invalid() {
        let config = ReportConfig::default();

        let result = resolve_window(&config, NaiveDate::MIN, Some(7), None);
        assert!(matches!(result, Err(PipelineError::InvalidWindow(_))));

        let result = resolve_window(&config, date(2025, 3, 14), Some(7), Some(NaiveDate::MIN));
        assert!(matches!(result, Err(PipelineError::InvalidWindow(_))));
    }

    #[test]
    fn test_resolve_recipient() {
        assert_eq!(resolve_recipient(Some("a@x.com"), "b@x.com").unwrap(), "a@x.com");
        assert_eq!(resolve_recipient(None, "b@x.com").unwrap(), "b@x.com");
        assert_eq!(resolve_recipient(Some("  "), "b@x.com").unwrap(), "b@x.com");
        assert!(matches!(
            resolve_recipient(None, ""),
            Err(PipelineError::MissingRecipient)
        ));
    }
}
