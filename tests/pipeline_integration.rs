//! End-to-end tests of the report pipeline with in-memory collaborators.
//!
//! ## Running tests
//! ```bash
//! cargo test --test pipeline_integration
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use insights_mailer::config::ReportConfig;
use insights_mailer::delivery::{Delivery, DeliveryAdapter, DeliveryError, DeliveryReceipt};
use insights_mailer::meeting::{DateWindow, FieldKind, MeetingRecord};
use insights_mailer::pipeline::{PipelineError, ReportService};
use insights_mailer::report::{
    NarrativeSource, Report, ReportMode, SectionKind, FALLBACK_NARRATIVE, NO_MEETINGS_NARRATIVE,
};
use insights_mailer::store::{EvidenceStore, FetchOutcome, JsonFileStore, StaticStore, StoreError};
use insights_mailer::summarizer::{NarrativeSummarizer, SummarizerError};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn today() -> NaiveDate {
    date(2025, 3, 14)
}

fn window() -> DateWindow {
    DateWindow::ending(today(), 7).unwrap()
}

struct Summarizer {
    reply: Option<&'static str>,
    calls: AtomicUsize,
}

impl Summarizer {
    fn replying(text: &'static str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(text),
            calls: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl NarrativeSummarizer for Summarizer {
    fn name(&self) -> &'static str {
        "test"
    }

    async fn summarize(&self, _report: &Report) -> Result<String, SummarizerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply
            .map(str::to_string)
            .ok_or_else(|| SummarizerError::Request("connection reset".to_string()))
    }
}

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<Delivery>>,
    reject: bool,
}

#[async_trait]
impl DeliveryAdapter for Outbox {
    async fn deliver(&self, delivery: &Delivery) -> Result<DeliveryReceipt, DeliveryError> {
        self.sent.lock().unwrap().push(delivery.clone());
        if self.reject {
            return Err(DeliveryError::Rejected {
                status: 503,
                body: "hook disabled".to_string(),
            });
        }
        Ok(DeliveryReceipt {
            status: "sent".to_string(),
            message: format!("Email sent to {}", delivery.to),
        })
    }
}

fn sample_records() -> Vec<MeetingRecord> {
    let mut footballco = MeetingRecord::new("m-1", date(2025, 3, 12))
        .with_client("Footballco")
        .with_score(5, true)
        .with_evidence(FieldKind::Measure, true, "£2.2M ARR target")
        .with_evidence(FieldKind::Now, true, "Need a head of data ASAP");
    footballco.owner = Some("Sam".to_string());
    footballco.notes_url = Some("https://notes.example.com/m-1".to_string());

    let instacart = MeetingRecord::new("m-2", date(2025, 3, 11))
        .with_client("Instacart")
        .with_score(4, true)
        .with_evidence(FieldKind::Fit, true, "Competitors are cutting day rate budgets");

    let cold = MeetingRecord::new("m-3", date(2025, 3, 10))
        .with_client("Cold Lead")
        .with_score(1, false)
        .with_evidence(FieldKind::Blocker, false, "Budget capped at $40k");

    let stale = MeetingRecord::new("m-old", date(2025, 1, 2))
        .with_client("Last Year")
        .with_score(5, true);

    vec![footballco, instacart, cold, stale]
}

fn service(
    records: Vec<MeetingRecord>,
    summarizer: Arc<Summarizer>,
    outbox: Arc<Outbox>,
) -> ReportService {
    ReportService::new(
        Arc::new(StaticStore::new(records)),
        summarizer,
        outbox,
        &ReportConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn test_generate_full_report() {
    let summarizer = Summarizer::replying("## Highlights\n- **Footballco** £2.2M ARR");
    let service = service(sample_records(), summarizer.clone(), Arc::default());

    let generated = service.generate(ReportMode::Insights, window(), today()).await.unwrap();
    let report = &generated.report;

    let priority = report.section(SectionKind::PriorityOpportunities).unwrap();
    let ids: Vec<&str> = priority.entries.iter().map(|e| e.meeting.id.as_str()).collect();
    assert_eq!(ids, vec!["m-1", "m-2"]);

    let pipeline = report.section(SectionKind::DealPipeline).unwrap();
    let ids: Vec<&str> = pipeline.entries.iter().map(|e| e.meeting.id.as_str()).collect();
    assert_eq!(ids, vec!["m-1", "m-3"]);

    let market = report.section(SectionKind::MarketIntelligence).unwrap();
    assert_eq!(market.entries[0].meeting.id, "m-2");

    let hot = report.section(SectionKind::HotActions).unwrap();
    assert_eq!(hot.entries[0].meeting.id, "m-1");
    assert_eq!(hot.entries[0].matched_terms, vec!["asap".to_string()]);

    assert_eq!(report.metrics.total_meetings, 3);
    assert_eq!(report.metrics.qualified_meetings, 2);
    assert_eq!(report.narrative.source, NarrativeSource::Summarizer);
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);

    assert!(generated.html.contains("<strong>Footballco</strong> £2.2M ARR"));
    assert!(generated.html.contains("https://notes.example.com/m-1"));
    assert!(!generated.html.contains("Last Year"));
    assert_eq!(generated.subject, "UNKNOWN Brain Weekly Insights (w/e 14 Mar)");
}

#[tokio::test]
async fn test_summarizer_failure_falls_back() {
    let summarizer = Summarizer::failing();
    let outbox = Arc::new(Outbox::default());
    let service = service(sample_records(), summarizer.clone(), outbox.clone());

    let outcome = service.send("team@example.com", ReportMode::Insights, window(), today()).await.unwrap();

    assert_eq!(outcome.receipt.status, "sent");
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);
    let sent = outbox.sent.lock().unwrap();
    assert!(sent[0].html.contains(FALLBACK_NARRATIVE));
    assert!(sent[0].html.contains("Footballco"));
}

#[tokio::test]
async fn test_empty_window_still_delivers() {
    let summarizer = Summarizer::replying("unused");
    let outbox = Arc::new(Outbox::default());
    let service = service(Vec::new(), summarizer.clone(), outbox.clone());

    let outcome = service.send("team@example.com", ReportMode::Insights, window(), today()).await.unwrap();

    assert_eq!(outcome.total_meetings, 0);
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 0);

    let sent = outbox.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "team@example.com");
    assert!(sent[0].html.contains(NO_MEETINGS_NARRATIVE));
}

#[tokio::test]
async fn test_delivery_failure_is_reported_once() {
    let outbox = Arc::new(Outbox {
        reject: true,
        ..Outbox::default()
    });
    let service = service(sample_records(), Summarizer::replying("ok"), outbox.clone());

    let err = service
        .send("team@example.com", ReportMode::Insights, window(), today())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Delivery(DeliveryError::Rejected { status: 503, .. })));
    assert_eq!(outbox.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_store_outage_aborts_before_delivery() {
    let outbox = Arc::new(Outbox::default());
    let service = ReportService::new(
        Arc::new(StaticStore::unavailable("quota exceeded")),
        Summarizer::replying("ok"),
        outbox.clone(),
        &ReportConfig::default(),
    )
    .unwrap();

    let err = service
        .send("team@example.com", ReportMode::Insights, window(), today())
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::DataUnavailable(_)));
    assert!(outbox.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_generation_is_deterministic() {
    let service = service(sample_records(), Summarizer::failing(), Arc::default());

    let first = service.generate(ReportMode::Insights, window(), today()).await.unwrap();
    let second = service.generate(ReportMode::Insights, window(), today()).await.unwrap();

    assert_eq!(first.report, second.report);
    assert_eq!(first.html, second.html);
}

#[tokio::test]
async fn test_json_file_store_end_to_end() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"[
            {{
                "meeting_id": "bq-1",
                "date": "2025-03-13",
                "calendar_event_title": "Data leadership search",
                "creator_name": "Priya",
                "client_info": "{{\"client\": \"Footballco\"}}",
                "measure": "{{\"qualified\": true, \"evidence\": \"Budget of £120k-£150k for the role\"}}",
                "qualified": "true",
                "total_qualified_sections": "4"
            }},
            {{"meeting_id": "bad-score", "date": "2025-03-13", "total_qualified_sections": "9"}}
        ]"#
    )
    .unwrap();

    let service = ReportService::new(
        Arc::new(JsonFileStore::new(file.path())),
        Summarizer::failing(),
        Arc::new(Outbox::default()),
        &ReportConfig::default(),
    )
    .unwrap();

    let generated = service.generate(ReportMode::Insights, window(), today()).await.unwrap();

    assert_eq!(generated.skipped, 1);
    let pipeline = generated.report.section(SectionKind::DealPipeline).unwrap();
    let signal = &pipeline.entries[0].signals[0];
    assert_eq!(signal.amount, 120_000.0);
    assert_eq!(signal.upper, Some(150_000.0));
    assert_eq!(generated.report.team[0].owner, "Priya");
    assert!(generated.html.contains("Data leadership search"));
}

/// Serves the first fetch, then fails every later one.
struct FirstFetchOnly {
    records: Vec<MeetingRecord>,
    calls: AtomicUsize,
}

#[async_trait]
impl EvidenceStore for FirstFetchOnly {
    fn name(&self) -> &'static str {
        "first-fetch-only"
    }

    async fn fetch(&self, window: DateWindow) -> Result<FetchOutcome, StoreError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(StoreError::Unavailable("rate limited".to_string()));
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

#[tokio::test]
async fn test_trends_compare_with_previous_window() {
    let mut records = sample_records();
    records.push(
        MeetingRecord::new("prev-1", date(2025, 3, 3))
            .with_client("Footballco")
            .with_score(3, true),
    );
    records.push(MeetingRecord::new("prev-2", date(2025, 3, 5)).with_score(2, false));
    let service = service(records, Summarizer::failing(), Arc::default());

    let generated = service
        .generate(ReportMode::Insights, window(), today())
        .await
        .unwrap();
    let trends = generated.report.trends.as_ref().unwrap();

    assert_eq!(trends.current.meetings, 3);
    assert_eq!(trends.previous.meetings, 2);
    assert_eq!(trends.meetings_change, 1);
    assert_eq!(trends.meetings_pct, Some(50.0));
    assert_eq!(trends.qualified_change, 1);
    assert_eq!(trends.score_change, 0.8);
    assert!(generated.html.contains("Versus Previous Period"));

    // Previous-window meetings never leak into this window's analytics.
    let clients = &generated.report.analytics.clients;
    assert_eq!(clients.iter().find(|c| c.client == "Footballco").unwrap().meeting_count, 1);
}

#[tokio::test]
async fn test_previous_window_outage_only_drops_trends() {
    let store = Arc::new(FirstFetchOnly {
        records: sample_records(),
        calls: AtomicUsize::new(0),
    });
    let service = ReportService::new(
        store.clone(),
        Summarizer::failing(),
        Arc::new(Outbox::default()),
        &ReportConfig::default(),
    )
    .unwrap();

    let generated = service
        .generate(ReportMode::Insights, window(), today())
        .await
        .unwrap();

    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    assert!(generated.report.trends.is_none());
    assert_eq!(generated.report.metrics.total_meetings, 3);
    assert!(!generated.html.contains("Versus Previous Period"));
}

#[tokio::test]
async fn test_coaching_report_end_to_end() {
    let host = |id: &str, owner: &str, d: u32, score: u8| {
        MeetingRecord::new(id, date(2025, 3, d))
            .with_client("Footballco")
            .with_owner(owner)
            .with_score(score, score >= 3)
    };
    let records = vec![
        host("s-1", "Sam", 12, 5)
            .with_evidence(FieldKind::Now, true, "Start in April")
            .with_evidence(FieldKind::Measure, true, "Time to hire under 30 days")
            .with_evidence(FieldKind::Blocker, true, "Board sign-off"),
        host("s-2", "Sam", 11, 4)
            .with_evidence(FieldKind::Now, true, "Urgent backfill")
            .with_evidence(FieldKind::Measure, true, "Retention at 12 months"),
        host("e-1", "Ellie", 13, 2),
        host("e-2", "Ellie", 10, 3).with_evidence(FieldKind::Now, true, "This quarter"),
    ];
    let summarizer = Summarizer::replying("## Team\n- **Sam** leads on discovery");
    let outbox = Arc::new(Outbox::default());
    let service = service(records, summarizer.clone(), outbox.clone());

    let outcome = service
        .send("coaches@example.com", ReportMode::Coaching, window(), today())
        .await
        .unwrap();

    assert_eq!(outcome.subject, "UNKNOWN Brain Calls & Coaching (w/e 14 Mar)");
    assert_eq!(outcome.total_meetings, 4);
    assert_eq!(summarizer.calls.load(Ordering::SeqCst), 1);

    let sent = outbox.sent.lock().unwrap();
    let html = &sent[0].html;
    assert!(html.contains("<li><strong>Sam</strong> leads on discovery</li>"));
    assert!(html.contains("<h2>Host Performance</h2>"));
    assert!(html.contains("<td>Sam</td><td>2</td><td>4.5</td><td>100%</td><td>100%</td><td>50%</td>"));
    assert!(html.contains("<td>Ellie</td><td>2</td><td>2.5</td><td>50%</td><td>0%</td><td>0%</td>"));
    assert!(html.contains("Blocker Identification"));
    assert!(!html.contains("Deal Pipeline"));
}
