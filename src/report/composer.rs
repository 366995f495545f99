use anyhow::Result;
use chrono::NaiveDate;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::debug;

use super::analytics::{
    blocker_patterns, client_concentration, host_performance, improvement_areas, round1,
    service_fit, team_benchmarks, TOP_BLOCKERS, TOP_CLIENTS,
};
use super::model::{
    AnalyzedMeeting, CoachingSummary, Conversation, InsightAnalytics, Narrative, Report,
    ReportMode, ReportSection, SectionEntry, SectionKind, SummaryMetrics, TeamMember,
};
use crate::config::{ReportConfig, MAX_PRIORITY_LIMIT};
use crate::meeting::{DateWindow, FieldKind};

/// Section sizes and classification vocabularies.
#[derive(Debug, Clone)]
pub struct ComposeOptions {
    pub priority_limit: usize,
    /// Cap for Market Intelligence and Hot Actions.
    pub section_limit: usize,
    pub market_terms: Vec<String>,
    pub urgency_terms: Vec<String>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self::from(&ReportConfig::default())
    }
}

impl From<&ReportConfig> for ComposeOptions {
    fn from(report: &ReportConfig) -> Self {
        Self {
            priority_limit: report.priority_limit.min(MAX_PRIORITY_LIMIT),
            section_limit: report.section_limit,
            market_terms: report.market_terms.clone(),
            urgency_terms: report.urgency_terms.clone(),
        }
    }
}

/// Case-insensitive whole-word matcher over a list of terms.
pub struct TermMatcher {
    terms: Vec<(String, Regex)>,
}

impl TermMatcher {
    pub fn new(terms: &[String]) -> Result<Self> {
        let mut compiled: Vec<(String, Regex)> = Vec::new();
        for term in terms {
            let term = term.trim().to_lowercase();
            if term.is_empty() || compiled.iter().any(|(existing, _)| *existing == term) {
                continue;
            }
            let words: Vec<String> = term.split_whitespace().map(regex::escape).collect();
            let pattern = format!(r"(?i)\b{}\b", words.join(r"\s+"));
            compiled.push((term, Regex::new(&pattern)?));
        }
        Ok(Self { terms: compiled })
    }

    /// Terms found in any of `texts`, in configured order.
    pub fn matches(&self, texts: &[&str]) -> Vec<String> {
        self.terms
            .iter()
            .filter(|(_, regex)| texts.iter().any(|text| regex.is_match(text)))
            .map(|(term, _)| term.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

/// Builds reports from analyzed meetings.
///
/// Section rules:
/// - Priority Opportunities: qualified meetings, top `priority_limit`.
/// - Deal Pipeline: any meeting with at least one signal, uncapped.
/// - Market Intelligence: qualified meetings whose evidence in any field
///   mentions a market term, top `section_limit`.
/// - Hot Actions: qualified meetings with a qualified NOW field whose NOW or
///   NEXT evidence mentions an urgency term, top `section_limit`.
///
/// Every section is ordered by score descending, then date descending, then
/// meeting id.
pub struct Composer {
    options: ComposeOptions,
    market: TermMatcher,
    urgency: TermMatcher,
}

impl Composer {
    pub fn new(options: ComposeOptions) -> Result<Self> {
        let market = TermMatcher::new(&options.market_terms)?;
        let urgency = TermMatcher::new(&options.urgency_terms)?;
        Ok(Self {
            options,
            market,
            urgency,
        })
    }

    pub fn compose(
        &self,
        mut meetings: Vec<AnalyzedMeeting>,
        window: DateWindow,
        today: NaiveDate,
    ) -> Report {
        meetings.sort_by(rank_order);

        let metrics = summary_metrics(&meetings);
        let team = team_performance(&meetings);

        let priority: Vec<SectionEntry> = meetings
            .iter()
            .filter(|m| m.record.qualified)
            .take(self.options.priority_limit)
            .map(|m| entry(m, Vec::new()))
            .collect();

        let pipeline: Vec<SectionEntry> = meetings
            .iter()
            .filter(|m| !m.signals.is_empty())
            .map(|m| entry(m, Vec::new()))
            .collect();

        let market: Vec<SectionEntry> = meetings
            .iter()
            .filter(|m| m.record.qualified)
            .filter_map(|m| {
                let texts: Vec<&str> = m
                    .record
                    .fields()
                    .filter_map(|(_, field)| field.evidence_text())
                    .collect();
                let terms = self.market.matches(&texts);
                (!terms.is_empty()).then(|| entry(m, terms))
            })
            .take(self.options.section_limit)
            .collect();

        let hot: Vec<SectionEntry> = meetings
            .iter()
            .filter(|m| m.record.qualified && m.record.now.qualified)
            .filter_map(|m| {
                let texts: Vec<&str> = [FieldKind::Now, FieldKind::Next]
                    .iter()
                    .filter_map(|kind| m.record.field(*kind).evidence_text())
                    .collect();
                let terms = self.urgency.matches(&texts);
                (!terms.is_empty()).then(|| entry(m, terms))
            })
            .take(self.options.section_limit)
            .collect();

        let sections: Vec<ReportSection> = SectionKind::ALL
            .into_iter()
            .zip([priority, pipeline, market, hot])
            .map(|(kind, entries)| ReportSection { kind, entries })
            .collect();

        let records = meetings.iter().map(|m| &m.record);
        let (services, fit_opportunities) = service_fit(records.clone());
        let analytics = InsightAnalytics {
            clients: client_concentration(records.clone(), TOP_CLIENTS),
            services,
            fit_opportunities,
            blockers: blocker_patterns(records, TOP_BLOCKERS),
        };

        debug!(
            "Composed report for {}: {}",
            window,
            sections
                .iter()
                .map(|s| format!("{}={}", s.title(), s.len()))
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut report = Report {
            mode: ReportMode::Insights,
            window,
            generated_on: today,
            sections,
            metrics,
            analytics,
            team_average: team_average(&team),
            team,
            coaching: None,
            trends: None,
            narrative: Narrative::fallback(),
        };
        if report.is_empty() {
            report.narrative = Narrative::no_meetings();
        }
        report
    }

    /// Per-host discovery metrics instead of insight sections.
    pub fn compose_coaching(
        &self,
        mut meetings: Vec<AnalyzedMeeting>,
        window: DateWindow,
        today: NaiveDate,
    ) -> Report {
        meetings.sort_by(rank_order);

        let metrics = summary_metrics(&meetings);
        let team = team_performance(&meetings);
        let hosts = host_performance(meetings.iter().map(|m| &m.record));
        let coaching = CoachingSummary {
            benchmarks: team_benchmarks(&hosts),
            improvement_areas: improvement_areas(&hosts),
            hosts,
        };

        debug!(
            "Composed coaching report for {}: {} hosts, {} improvement areas",
            window,
            coaching.hosts.len(),
            coaching.improvement_areas.len()
        );

        let mut report = Report {
            mode: ReportMode::Coaching,
            window,
            generated_on: today,
            sections: Vec::new(),
            metrics,
            analytics: InsightAnalytics::default(),
            team_average: team_average(&team),
            team,
            coaching: Some(coaching),
            trends: None,
            narrative: Narrative::fallback(),
        };
        if report.is_empty() {
            report.narrative = Narrative::no_meetings();
        }
        report
    }

    pub fn compose_for(
        &self,
        mode: ReportMode,
        meetings: Vec<AnalyzedMeeting>,
        window: DateWindow,
        today: NaiveDate,
    ) -> Report {
        match mode {
            ReportMode::Insights => self.compose(meetings, window, today),
            ReportMode::Coaching => self.compose_coaching(meetings, window, today),
        }
    }
}

fn rank_order(a: &AnalyzedMeeting, b: &AnalyzedMeeting) -> Ordering {
    b.record
        .score
        .cmp(&a.record.score)
        .then_with(|| b.record.date.cmp(&a.record.date))
        .then_with(|| a.record.id.cmp(&b.record.id))
}

fn entry(meeting: &AnalyzedMeeting, matched_terms: Vec<String>) -> SectionEntry {
    SectionEntry {
        meeting: meeting.record.clone(),
        signals: meeting.signals.clone(),
        matched_terms,
    }
}

fn summary_metrics(meetings: &[AnalyzedMeeting]) -> SummaryMetrics {
    let total = meetings.len();
    if total == 0 {
        return SummaryMetrics::default();
    }

    let qualified = meetings.iter().filter(|m| m.record.qualified).count();
    let score_sum: u32 = meetings.iter().map(|m| u32::from(m.record.score)).sum();

    SummaryMetrics {
        total_meetings: total,
        qualified_meetings: qualified,
        avg_score: round1(f64::from(score_sum) / total as f64),
        pct_qualified: round1(100.0 * qualified as f64 / total as f64),
        total_signals: meetings.iter().map(|m| m.signals.len()).sum(),
    }
}

/// Qualified conversations grouped by host, hosts in name order.
/// Expects `meetings` already in rank order.
fn team_performance(meetings: &[AnalyzedMeeting]) -> Vec<TeamMember> {
    let mut by_owner: BTreeMap<String, Vec<Conversation>> = BTreeMap::new();

    for meeting in meetings.iter().filter(|m| m.record.qualified) {
        let record = &meeting.record;
        by_owner
            .entry(record.display_owner().to_string())
            .or_default()
            .push(Conversation {
                meeting_id: record.id.clone(),
                title: record.display_title().to_string(),
                client: record.client_name().to_string(),
                score: record.score,
                date: record.date,
            });
    }

    by_owner
        .into_iter()
        .map(|(owner, conversations)| {
            let total: u32 = conversations.iter().map(|c| u32::from(c.score)).sum();
            let average_score = round1(f64::from(total) / conversations.len() as f64);
            TeamMember {
                owner,
                conversations,
                average_score,
            }
        })
        .collect()
}

/// Mean over every conversation in the table, 0 when there are none.
fn team_average(team: &[TeamMember]) -> f64 {
    let scores: Vec<u32> = team
        .iter()
        .flat_map(|member| member.conversations.iter().map(|c| u32::from(c.score)))
        .collect();
    if scores.is_empty() {
        return 0.0;
    }
    round1(f64::from(scores.iter().sum::<u32>()) / scores.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meeting::MeetingRecord;
    use crate::report::model::NarrativeSource;
    use crate::signals::SignalExtractor;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn window() -> DateWindow {
        DateWindow::ending(date(14), 7).unwrap()
    }

    fn analyzed(records: Vec<MeetingRecord>) -> Vec<AnalyzedMeeting> {
        let extractor = SignalExtractor::new().unwrap();
        records
            .into_iter()
            .map(|record| AnalyzedMeeting {
                signals: extractor.extract(&record),
                record,
            })
            .collect()
    }

    fn composer() -> Composer {
        Composer::new(ComposeOptions::default()).unwrap()
    }

    fn ids(report: &Report, kind: SectionKind) -> Vec<String> {
        report
            .section(kind)
            .unwrap()
            .entries
            .iter()
            .map(|e| e.meeting.id.clone())
            .collect()
    }

    #[test]
    fn test_empty_input_produces_empty_report() {
        let report = composer().compose(Vec::new(), window(), date(14));

        assert_eq!(report.sections.len(), 4);
        assert!(report.has_no_entries());
        assert_eq!(report.narrative.source, NarrativeSource::NoMeetings);
        assert_eq!(report.metrics, SummaryMetrics::default());
        assert!(report.team.is_empty());
        assert!(!report.wants_narrative());
    }

    #[test]
    fn test_priority_is_qualified_top_three_in_rank_order() {
        let records = vec![
            MeetingRecord::new("a", date(10)).with_score(4, true),
            MeetingRecord::new("b", date(12)).with_score(5, true),
            MeetingRecord::new("c", date(13)).with_score(4, true),
            MeetingRecord::new("d", date(13)).with_score(5, false),
            MeetingRecord::new("e", date(11)).with_score(3, true),
            MeetingRecord::new("f", date(11)).with_score(5, true),
        ];

        let report = composer().compose(analyzed(records), window(), date(14));
        assert_eq!(
            ids(&report, SectionKind::PriorityOpportunities),
            vec!["b", "f", "c"]
        );
    }

    #[test]
    fn test_ties_broken_by_id_for_identical_score_and_date() {
        let records = vec![
            MeetingRecord::new("z", date(10)).with_score(4, true),
            MeetingRecord::new("m", date(10)).with_score(4, true),
        ];

        let report = composer().compose(analyzed(records), window(), date(14));
        assert_eq!(ids(&report, SectionKind::PriorityOpportunities), vec!["m", "z"]);
    }

    #[test]
    fn test_deal_pipeline_ignores_qualification_flag() {
        let records = vec![
            MeetingRecord::new("unq", date(12))
                .with_score(1, false)
                .with_evidence(FieldKind::Measure, false, "£50k budget"),
            MeetingRecord::new("q", date(11))
                .with_score(5, true)
                .with_evidence(FieldKind::Now, true, "no numbers here"),
            MeetingRecord::new("q2", date(10))
                .with_score(4, true)
                .with_evidence(FieldKind::Blocker, true, "hiring freeze on 10 roles"),
        ];

        let report = composer().compose(analyzed(records), window(), date(14));
        assert_eq!(ids(&report, SectionKind::DealPipeline), vec!["q2", "unq"]);
    }

    #[test]
    fn test_arr_scenario_lands_in_priority_and_pipeline() {
        let records = vec![MeetingRecord::new("m1", date(12))
            .with_client("Footballco")
            .with_score(5, true)
            .with_evidence(FieldKind::Measure, true, "£2.2M ARR target")];

        let report = composer().compose(analyzed(records), window(), date(14));
        assert_eq!(ids(&report, SectionKind::PriorityOpportunities), vec!["m1"]);
        assert_eq!(ids(&report, SectionKind::DealPipeline), vec!["m1"]);

        let entry = &report.section(SectionKind::DealPipeline).unwrap().entries[0];
        assert_eq!(entry.signals.len(), 1);
        assert_eq!(entry.signals[0].amount, 2_200_000.0);
        assert!(report.wants_narrative());
    }

    #[test]
    fn test_market_intelligence_rule() {
        let records = vec![
            MeetingRecord::new("m1", date(12))
                .with_score(4, true)
                .with_evidence(FieldKind::Fit, true, "Competitors are moving to AI tooling"),
            MeetingRecord::new("m2", date(12))
                .with_score(5, false)
                .with_evidence(FieldKind::Fit, true, "industry trend towards nearshoring"),
            MeetingRecord::new("m3", date(12))
                .with_score(5, true)
                .with_evidence(FieldKind::Now, true, "marketing team restructure"),
        ];

        let report = composer().compose(analyzed(records), window(), date(14));
        let section = report.section(SectionKind::MarketIntelligence).unwrap();

        assert_eq!(section.len(), 1);
        assert_eq!(section.entries[0].meeting.id, "m1");
        assert_eq!(section.entries[0].matched_terms, vec!["competitors"]);
    }

    #[test]
    fn test_hot_actions_rule() {
        let records = vec![
            MeetingRecord::new("hot", date(12))
                .with_score(4, true)
                .with_evidence(FieldKind::Now, true, "Needs a designer ASAP")
                .with_evidence(FieldKind::Next, true, "Send shortlist this  week"),
            MeetingRecord::new("now-unqualified", date(12))
                .with_score(4, true)
                .with_evidence(FieldKind::Now, false, "urgent request"),
            MeetingRecord::new("blocker-only", date(12))
                .with_score(4, true)
                .with_evidence(FieldKind::Now, true, "wants help")
                .with_evidence(FieldKind::Blocker, true, "deadline slipped"),
        ];

        let report = composer().compose(analyzed(records), window(), date(14));
        let section = report.section(SectionKind::HotActions).unwrap();

        assert_eq!(section.len(), 1);
        assert_eq!(section.entries[0].meeting.id, "hot");
        assert_eq!(section.entries[0].matched_terms, vec!["asap", "this week"]);
    }

    #[test]
    fn test_section_limit_applies_to_classified_sections() {
        let records: Vec<MeetingRecord> = (1..=8)
            .map(|i| {
                MeetingRecord::new(format!("m{}", i), date(i))
                    .with_score(4, true)
                    .with_evidence(FieldKind::Fit, true, "pricing pressure")
            })
            .collect();

        let report = composer().compose(analyzed(records), window(), date(14));
        let section = report.section(SectionKind::MarketIntelligence).unwrap();
        assert_eq!(section.len(), 5);
        assert_eq!(section.entries[0].meeting.id, "m8");
    }

    #[test]
    fn test_metrics_and_team_table() {
        let mut a = MeetingRecord::new("a", date(10)).with_score(5, true);
        a.owner = Some("Sam".to_string());
        let mut b = MeetingRecord::new("b", date(11)).with_score(4, true);
        b.owner = Some("Sam".to_string());
        let mut c = MeetingRecord::new("c", date(12)).with_score(4, true);
        c.owner = Some("Ellie".to_string());
        let d = MeetingRecord::new("d", date(12)).with_score(1, false);

        let report = composer().compose(analyzed(vec![a, b, c, d]), window(), date(14));

        assert_eq!(report.metrics.total_meetings, 4);
        assert_eq!(report.metrics.qualified_meetings, 3);
        assert_eq!(report.metrics.avg_score, 3.5);
        assert_eq!(report.metrics.pct_qualified, 75.0);

        let owners: Vec<&str> = report.team.iter().map(|m| m.owner.as_str()).collect();
        assert_eq!(owners, vec!["Ellie", "Sam"]);
        assert_eq!(report.team[1].average_score, 4.5);
        assert_eq!(report.team[1].conversations[0].meeting_id, "a");
    }

    #[test]
    fn test_compose_is_deterministic() {
        let records = vec![
            MeetingRecord::new("a", date(10))
                .with_score(4, true)
                .with_evidence(FieldKind::Measure, true, "£1m target, 20% growth"),
            MeetingRecord::new("b", date(12))
                .with_score(4, true)
                .with_evidence(FieldKind::Now, true, "urgent: start date next week"),
        ];
        let mut reversed = records.clone();
        reversed.reverse();

        let composer = composer();
        let first = composer.compose(analyzed(records), window(), date(14));
        let second = composer.compose(analyzed(reversed), window(), date(14));

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_term_matcher_respects_word_boundaries() {
        let matcher = TermMatcher::new(&["market".to_string(), "day rate".to_string()]).unwrap();

        assert!(matcher.matches(&["supermarkets everywhere"]).is_empty());
        assert_eq!(matcher.matches(&["quoted a Day   Rate"]), vec!["day rate"]);
        assert!(TermMatcher::new(&["  ".to_string()]).unwrap().is_empty());
    }
    #[test]
    fn test_priority_limit_is_clamped_to_three() {
        let report_config = ReportConfig {
            priority_limit: 10,
            ..ReportConfig::default()
        };
        let options = ComposeOptions::from(&report_config);
        assert_eq!(options.priority_limit, MAX_PRIORITY_LIMIT);

        let records: Vec<MeetingRecord> = (1..=6)
            .map(|i| MeetingRecord::new(format!("m{}", i), date(i)).with_score(4, true))
            .collect();
        let report = Composer::new(options)
            .unwrap()
            .compose(analyzed(records), window(), date(14));
        assert_eq!(report.section(SectionKind::PriorityOpportunities).unwrap().len(), 3);
    }

    #[test]
    fn test_insights_report_carries_analytics_and_team_average() {
        let records = vec![
            MeetingRecord::new("a", date(10))
                .with_client("Footballco")
                .with_owner("Sam")
                .with_score(5, true),
            MeetingRecord::new("b", date(11))
                .with_client("Footballco")
                .with_owner("Sam")
                .with_score(4, true),
            MeetingRecord::new("c", date(12))
                .with_client("Instacart")
                .with_owner("Ellie")
                .with_score(3, true),
            MeetingRecord::new("d", date(12))
                .with_client("Instacart")
                .with_score(1, false),
        ];

        let report = composer().compose(analyzed(records), window(), date(14));

        assert_eq!(report.mode, ReportMode::Insights);
        assert_eq!(report.analytics.clients[0].client, "Footballco");
        assert_eq!(report.analytics.clients[0].meeting_count, 2);
        assert_eq!(report.team_average, 4.0);
        assert!(report.coaching.is_none());
        assert!(report.trends.is_none());
    }

    #[test]
    fn test_coaching_report_has_hosts_and_no_sections() {
        let records = vec![
            MeetingRecord::new("a", date(10))
                .with_owner("Sam")
                .with_score(5, true)
                .with_evidence(FieldKind::Now, true, "now")
                .with_evidence(FieldKind::Measure, true, "kpi"),
            MeetingRecord::new("b", date(11))
                .with_owner("Sam")
                .with_score(3, true)
                .with_evidence(FieldKind::Now, true, "now"),
            MeetingRecord::new("c", date(12)).with_owner("Ellie").with_score(2, false),
        ];

        let report = composer().compose_coaching(analyzed(records), window(), date(14));

        assert_eq!(report.mode, ReportMode::Coaching);
        assert!(report.sections.is_empty());
        assert_eq!(report.metrics.total_meetings, 3);
        assert_eq!(report.narrative.source, NarrativeSource::Fallback);
        assert!(report.wants_narrative());

        let coaching = report.coaching.as_ref().unwrap();
        assert_eq!(coaching.hosts.len(), 1);
        assert_eq!(coaching.hosts[0].host, "Sam");
        assert_eq!(coaching.hosts[0].now_rate, 100.0);
        assert_eq!(coaching.hosts[0].measure_rate, 50.0);
        assert_eq!(coaching.top_performers().len(), 1);
        let areas: Vec<FieldKind> = coaching.improvement_areas.iter().map(|a| a.field).collect();
        assert_eq!(areas, vec![FieldKind::Blocker]);
    }

    #[test]
    fn test_empty_coaching_report_uses_no_meetings_narrative() {
        let report = composer().compose_for(ReportMode::Coaching, Vec::new(), window(), date(14));

        assert_eq!(report.narrative.source, NarrativeSource::NoMeetings);
        assert!(report.coaching.as_ref().unwrap().hosts.is_empty());
        assert!(report.coaching.as_ref().unwrap().benchmarks.is_none());
        assert!(!report.wants_narrative());
    }
}
