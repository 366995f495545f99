use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::meeting::{DateWindow, FieldKind, MeetingRecord};
use crate::signals::ExtractedSignal;

pub const NO_MEETINGS_NARRATIVE: &str = "No qualifying meetings were recorded in this period.";
pub const FALLBACK_NARRATIVE: &str = "Insights unavailable this week.";

/// Which briefing to build from the same evidence.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum ReportMode {
    /// Opportunities, pipeline and market signals for the whole team.
    #[default]
    Insights,
    /// Discovery quality per host, benchmarked against the team.
    Coaching,
}

impl ReportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insights => "insights",
            Self::Coaching => "coaching",
        }
    }

    /// Email heading and subject label.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Insights => "Weekly Insights",
            Self::Coaching => "Calls & Coaching",
        }
    }
}

impl fmt::Display for ReportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    PriorityOpportunities,
    DealPipeline,
    MarketIntelligence,
    HotActions,
}

impl SectionKind {
    /// Order sections appear in every report.
    pub const ALL: [SectionKind; 4] = [
        SectionKind::PriorityOpportunities,
        SectionKind::DealPipeline,
        SectionKind::MarketIntelligence,
        SectionKind::HotActions,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Self::PriorityOpportunities => "Priority Opportunities",
            Self::DealPipeline => "Deal Pipeline",
            Self::MarketIntelligence => "Market Intelligence",
            Self::HotActions => "Hot Actions",
        }
    }

    pub fn empty_message(&self) -> &'static str {
        match self {
            Self::PriorityOpportunities => "No qualified meetings this period.",
            Self::DealPipeline => "No budgets or commercial figures were mentioned.",
            Self::MarketIntelligence => "No market signals were captured.",
            Self::HotActions => "No urgent follow-ups were identified.",
        }
    }
}

/// A meeting and its signals as fed to the composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedMeeting {
    pub record: MeetingRecord,
    pub signals: Vec<ExtractedSignal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub meeting: MeetingRecord,
    pub signals: Vec<ExtractedSignal>,
    /// Classification terms that placed the meeting in this section.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub matched_terms: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSection {
    pub kind: SectionKind,
    pub entries: Vec<SectionEntry>,
}

impl ReportSection {
    pub fn title(&self) -> &'static str {
        self.kind.title()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub total_meetings: usize,
    pub qualified_meetings: usize,
    /// Mean qualification score, one decimal place.
    pub avg_score: f64,
    /// Share of meetings qualified, percent with one decimal place.
    pub pct_qualified: f64,
    pub total_signals: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub meeting_id: String,
    pub title: String,
    pub client: String,
    pub score: u8,
    pub date: NaiveDate,
}

/// One host's qualified conversations for the period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamMember {
    pub owner: String,
    pub conversations: Vec<Conversation>,
    pub average_score: f64,
}

/// Engagement with one client over the window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientEngagement {
    pub client: String,
    pub meeting_count: usize,
    pub qualified_count: usize,
    pub avg_score: f64,
    pub best_score: u8,
    pub last_meeting_date: NaiveDate,
    pub last_meeting_owner: Option<String>,
    pub last_meeting_title: Option<String>,
}

/// Share of qualified FIT opportunities pointing at one service line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceShare {
    pub service: String,
    pub count: usize,
    pub avg_score: f64,
    pub percentage: f64,
}

/// A qualified blocker, counted across meetings with the same wording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockerPattern {
    pub summary: Option<String>,
    pub evidence: Option<String>,
    pub frequency: usize,
}

/// Aggregates behind the insights briefing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightAnalytics {
    /// Busiest clients first.
    pub clients: Vec<ClientEngagement>,
    pub services: Vec<ServiceShare>,
    pub fit_opportunities: usize,
    pub blockers: Vec<BlockerPattern>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodTotals {
    pub meetings: usize,
    pub qualified: usize,
    pub avg_score: f64,
}

impl From<&SummaryMetrics> for PeriodTotals {
    fn from(metrics: &SummaryMetrics) -> Self {
        Self {
            meetings: metrics.total_meetings,
            qualified: metrics.qualified_meetings,
            avg_score: metrics.avg_score,
        }
    }
}

/// This window against the one before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekOverWeek {
    pub current: PeriodTotals,
    pub previous: PeriodTotals,
    pub meetings_change: i64,
    pub qualified_change: i64,
    pub score_change: f64,
    /// `None` when the previous window had no meetings.
    pub meetings_pct: Option<f64>,
    pub qualified_pct: Option<f64>,
}

/// Discovery quality for one host. Rates are percentages of the host's meetings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostPerformance {
    pub host: String,
    pub total_meetings: usize,
    pub qualified_meetings: usize,
    pub avg_score: f64,
    pub now_rate: f64,
    pub next_rate: f64,
    pub measure_rate: f64,
    pub blocker_rate: f64,
    pub fit_rate: f64,
    /// Mean of the NOW, MEASURE and BLOCKER capture rates.
    pub discovery_depth: f64,
    pub vs_team_score: f64,
    pub vs_team_discovery: f64,
}

impl HostPerformance {
    pub fn rate(&self, kind: FieldKind) -> f64 {
        match kind {
            FieldKind::Now => self.now_rate,
            FieldKind::Next => self.next_rate,
            FieldKind::Measure => self.measure_rate,
            FieldKind::Blocker => self.blocker_rate,
            FieldKind::Fit => self.fit_rate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamBenchmarks {
    pub avg_score: f64,
    pub avg_discovery_depth: f64,
    pub avg_now_rate: f64,
    pub avg_measure_rate: f64,
    pub avg_blocker_rate: f64,
}

/// A discovery area where the team average sits below its floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImprovementArea {
    pub field: FieldKind,
    pub area: String,
    /// Team average capture rate, percent.
    pub current: f64,
    pub target: String,
    pub suggestion: String,
}

/// Aggregates behind the coaching briefing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoachingSummary {
    /// Highest average score first.
    pub hosts: Vec<HostPerformance>,
    pub benchmarks: Option<TeamBenchmarks>,
    pub improvement_areas: Vec<ImprovementArea>,
}

impl CoachingSummary {
    pub fn top_performers(&self) -> &[HostPerformance] {
        &self.hosts[..self.hosts.len().min(3)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeSource {
    Summarizer,
    Fallback,
    NoMeetings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Narrative {
    pub text: String,
    pub source: NarrativeSource,
}

impl Narrative {
    pub fn fallback() -> Self {
        Self {
            text: FALLBACK_NARRATIVE.to_string(),
            source: NarrativeSource::Fallback,
        }
    }

    pub fn no_meetings() -> Self {
        Self {
            text: NO_MEETINGS_NARRATIVE.to_string(),
            source: NarrativeSource::NoMeetings,
        }
    }

    pub fn generated(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: NarrativeSource::Summarizer,
        }
    }
}

/// One generated briefing. Never persisted: built, rendered, discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub mode: ReportMode,
    pub window: DateWindow,
    pub generated_on: NaiveDate,
    /// Insight sections; empty in coaching mode.
    pub sections: Vec<ReportSection>,
    pub metrics: SummaryMetrics,
    pub analytics: InsightAnalytics,
    pub team: Vec<TeamMember>,
    /// Mean score over every qualified conversation in the team table.
    pub team_average: f64,
    pub coaching: Option<CoachingSummary>,
    /// Filled in after composition when the previous window could be read.
    pub trends: Option<WeekOverWeek>,
    pub narrative: Narrative,
}

impl Report {
    pub fn section(&self, kind: SectionKind) -> Option<&ReportSection> {
        self.sections.iter().find(|section| section.kind == kind)
    }

    /// True when no section has any entry.
    pub fn has_no_entries(&self) -> bool {
        self.sections.iter().all(ReportSection::is_empty)
    }

    /// Nothing worth briefing on: no section entries for insights, no
    /// meetings at all for coaching.
    pub fn is_empty(&self) -> bool {
        match self.mode {
            ReportMode::Insights => self.has_no_entries(),
            ReportMode::Coaching => self.metrics.total_meetings == 0,
        }
    }

    /// Whether the external summarizer should be asked for a narrative.
    pub fn wants_narrative(&self) -> bool {
        self.narrative.source == NarrativeSource::Fallback && !self.is_empty()
    }
}
