//! Report composition.
//!
//! Ranks analyzed meetings and groups them into the briefing sections, or
//! into per-host coaching metrics. The composer is pure: the reporting date
//! is passed in, never read from the clock, so the same input always
//! produces the same report.

mod analytics;
mod composer;
mod model;

pub use analytics::{
    blocker_patterns, client_concentration, host_performance, improvement_areas,
    period_totals, service_fit, team_benchmarks, week_over_week,
};
pub use composer::{ComposeOptions, Composer, TermMatcher};
pub use model::{
    AnalyzedMeeting, BlockerPattern, ClientEngagement, CoachingSummary, Conversation,
    HostPerformance, ImprovementArea, InsightAnalytics, Narrative, NarrativeSource,
    PeriodTotals, Report, ReportMode, ReportSection, SectionEntry, SectionKind, ServiceShare,
    SummaryMetrics, TeamBenchmarks, TeamMember, WeekOverWeek, FALLBACK_NARRATIVE,
    NO_MEETINGS_NARRATIVE,
};
