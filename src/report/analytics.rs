//! Aggregations over fetched meetings: client concentration, service fit,
//! blocker patterns, window-over-window trends and per-host discovery
//! metrics for coaching.

use std::collections::BTreeMap;

use super::model::{
    BlockerPattern, ClientEngagement, HostPerformance, ImprovementArea, PeriodTotals,
    ServiceShare, TeamBenchmarks, WeekOverWeek,
};
use crate::meeting::{FieldKind, MeetingRecord};

pub const TOP_CLIENTS: usize = 10;
pub const TOP_BLOCKERS: usize = 5;

/// Hosts with fewer meetings than this are left out of coaching metrics.
pub const MIN_HOST_MEETINGS: usize = 2;

const UNSPECIFIED_SERVICE: &str = "Unspecified";

/// Fields averaged into a host's discovery depth.
const DISCOVERY_FIELDS: [FieldKind; 3] = [FieldKind::Now, FieldKind::Measure, FieldKind::Blocker];

struct DiscoveryFloor {
    field: FieldKind,
    area: &'static str,
    floor: f64,
    target: &'static str,
    suggestion: &'static str,
}

const DISCOVERY_FLOORS: [DiscoveryFloor; 3] = [
    DiscoveryFloor {
        field: FieldKind::Now,
        area: "Urgency Discovery",
        floor: 30.0,
        target: "40%+",
        suggestion: "Ask: 'What needs to happen in the next 60 days?'",
    },
    DiscoveryFloor {
        field: FieldKind::Measure,
        area: "Metrics Discovery",
        floor: 40.0,
        target: "50%+",
        suggestion: "Ask: 'How will you measure success?'",
    },
    DiscoveryFloor {
        field: FieldKind::Blocker,
        area: "Blocker Identification",
        floor: 35.0,
        target: "45%+",
        suggestion: "Ask: 'What's preventing you from moving forward today?'",
    },
];

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));
    (count > 0).then(|| sum / count as f64)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Clients with the most meetings, ties broken by average score then name.
/// Meetings without a client name are not counted.
pub fn client_concentration<'a, I>(records: I, limit: usize) -> Vec<ClientEngagement>
where
    I: IntoIterator<Item = &'a MeetingRecord>,
{
    let mut by_client: BTreeMap<&str, Vec<&MeetingRecord>> = BTreeMap::new();
    for record in records {
        if let Some(client) = non_blank(record.client.name.as_deref()) {
            by_client.entry(client).or_default().push(record);
        }
    }

    let mut clients: Vec<ClientEngagement> = by_client
        .into_iter()
        .filter_map(|(client, meetings)| {
            // Latest date wins; on the same day the lowest id does.
            let latest = meetings
                .iter()
                .max_by(|a, b| a.date.cmp(&b.date).then_with(|| b.id.cmp(&a.id)))?;
            Some(ClientEngagement {
                client: client.to_string(),
                meeting_count: meetings.len(),
                qualified_count: meetings.iter().filter(|m| m.qualified).count(),
                avg_score: round1(mean(meetings.iter().map(|m| f64::from(m.score))).unwrap_or(0.0)),
                best_score: meetings.iter().map(|m| m.score).max().unwrap_or(0),
                last_meeting_date: latest.date,
                last_meeting_owner: latest.owner.clone(),
                last_meeting_title: latest.title.clone(),
            })
        })
        .collect();

    clients.sort_by(|a, b| {
        b.meeting_count
            .cmp(&a.meeting_count)
            .then_with(|| b.avg_score.total_cmp(&a.avg_score))
            .then_with(|| a.client.cmp(&b.client))
    });
    clients.truncate(limit);
    clients
}

/// Distribution of qualified meetings with a qualified FIT field over their
/// primary service line. Returns the shares and the number of such meetings.
pub fn service_fit<'a, I>(records: I) -> (Vec<ServiceShare>, usize)
where
    I: IntoIterator<Item = &'a MeetingRecord>,
{
    let mut by_service: BTreeMap<String, (usize, u32)> = BTreeMap::new();
    for record in records.into_iter().filter(|r| r.qualified && r.fit.qualified) {
        let service = non_blank(record.fit.services.first().map(String::as_str))
            .unwrap_or(UNSPECIFIED_SERVICE);
        let slot = by_service.entry(service.to_string()).or_default();
        slot.0 += 1;
        slot.1 += u32::from(record.score);
    }

    let total: usize = by_service.values().map(|(count, _)| count).sum();
    let mut shares: Vec<ServiceShare> = by_service
        .into_iter()
        .map(|(service, (count, score_sum))| ServiceShare {
            service,
            count,
            avg_score: round1(f64::from(score_sum) / count as f64),
            percentage: round1(100.0 * count as f64 / total as f64),
        })
        .collect();

    shares.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.service.cmp(&b.service)));
    (shares, total)
}

/// Most frequent qualified blockers, grouped by identical summary and evidence.
pub fn blocker_patterns<'a, I>(records: I, limit: usize) -> Vec<BlockerPattern>
where
    I: IntoIterator<Item = &'a MeetingRecord>,
{
    let mut counts: BTreeMap<(Option<String>, Option<String>), usize> = BTreeMap::new();
    for record in records.into_iter().filter(|r| r.blocker.qualified) {
        let summary = non_blank(record.blocker.summary.as_deref()).map(str::to_string);
        let evidence = record.blocker.evidence_text().map(str::to_string);
        if summary.is_none() && evidence.is_none() {
            continue;
        }
        *counts.entry((summary, evidence)).or_default() += 1;
    }

    let mut patterns: Vec<BlockerPattern> = counts
        .into_iter()
        .map(|((summary, evidence), frequency)| BlockerPattern {
            summary,
            evidence,
            frequency,
        })
        .collect();

    // Stable: equal frequencies stay in key order.
    patterns.sort_by(|a, b| b.frequency.cmp(&a.frequency));
    patterns.truncate(limit);
    patterns
}

pub fn period_totals<'a, I>(records: I) -> PeriodTotals
where
    I: IntoIterator<Item = &'a MeetingRecord>,
{
    let mut totals = PeriodTotals::default();
    let mut score_sum: u32 = 0;
    for record in records {
        totals.meetings += 1;
        if record.qualified {
            totals.qualified += 1;
        }
        score_sum += u32::from(record.score);
    }
    if totals.meetings > 0 {
        totals.avg_score = round1(f64::from(score_sum) / totals.meetings as f64);
    }
    totals
}

pub fn week_over_week(current: PeriodTotals, previous: PeriodTotals) -> WeekOverWeek {
    let meetings_change = current.meetings as i64 - previous.meetings as i64;
    let qualified_change = current.qualified as i64 - previous.qualified as i64;
    let pct = |change: i64, base: usize| (base > 0).then(|| round1(100.0 * change as f64 / base as f64));

    WeekOverWeek {
        current,
        previous,
        meetings_change,
        qualified_change,
        score_change: round1(current.avg_score - previous.avg_score),
        meetings_pct: pct(meetings_change, previous.meetings),
        qualified_pct: pct(qualified_change, previous.qualified),
    }
}

/// Discovery metrics per host, best average score first, each compared with
/// the mean across the listed hosts.
pub fn host_performance<'a, I>(records: I) -> Vec<HostPerformance>
where
    I: IntoIterator<Item = &'a MeetingRecord>,
{
    let mut by_host: BTreeMap<&str, Vec<&MeetingRecord>> = BTreeMap::new();
    for record in records {
        if let Some(host) = non_blank(record.owner.as_deref()) {
            by_host.entry(host).or_default().push(record);
        }
    }

    let mut hosts: Vec<HostPerformance> = by_host
        .into_iter()
        .filter(|(_, meetings)| meetings.len() >= MIN_HOST_MEETINGS)
        .map(|(host, meetings)| host_metrics(host, &meetings))
        .collect();

    hosts.sort_by(|a, b| {
        b.avg_score
            .total_cmp(&a.avg_score)
            .then_with(|| a.host.cmp(&b.host))
    });

    let team_score = mean(hosts.iter().map(|h| h.avg_score));
    let team_depth = mean(hosts.iter().map(|h| h.discovery_depth));
    if let (Some(score), Some(depth)) = (team_score, team_depth) {
        for host in &mut hosts {
            host.vs_team_score = round1(host.avg_score - score);
            host.vs_team_discovery = round1(host.discovery_depth - depth);
        }
    }
    hosts
}

fn host_metrics(host: &str, meetings: &[&MeetingRecord]) -> HostPerformance {
    let total = meetings.len() as f64;
    let rate = |kind: FieldKind| {
        let captured = meetings.iter().filter(|m| m.field(kind).qualified).count();
        round1(100.0 * captured as f64 / total)
    };
    let depth_sum: f64 = meetings
        .iter()
        .map(|m| {
            let captured = DISCOVERY_FIELDS
                .iter()
                .filter(|kind| m.field(**kind).qualified)
                .count();
            captured as f64 / DISCOVERY_FIELDS.len() as f64
        })
        .sum();
    let score_sum: u32 = meetings.iter().map(|m| u32::from(m.score)).sum();

    HostPerformance {
        host: host.to_string(),
        total_meetings: meetings.len(),
        qualified_meetings: meetings.iter().filter(|m| m.qualified).count(),
        avg_score: round1(f64::from(score_sum) / total),
        now_rate: rate(FieldKind::Now),
        next_rate: rate(FieldKind::Next),
        measure_rate: rate(FieldKind::Measure),
        blocker_rate: rate(FieldKind::Blocker),
        fit_rate: rate(FieldKind::Fit),
        discovery_depth: round1(100.0 * depth_sum / total),
        vs_team_score: 0.0,
        vs_team_discovery: 0.0,
    }
}

/// Team means of the host metrics, or `None` without hosts.
pub fn team_benchmarks(hosts: &[HostPerformance]) -> Option<TeamBenchmarks> {
    let avg = |metric: fn(&HostPerformance) -> f64| mean(hosts.iter().map(metric)).map(round1);

    Some(TeamBenchmarks {
        avg_score: avg(|h| h.avg_score)?,
        avg_discovery_depth: avg(|h| h.discovery_depth)?,
        avg_now_rate: avg(|h| h.now_rate)?,
        avg_measure_rate: avg(|h| h.measure_rate)?,
        avg_blocker_rate: avg(|h| h.blocker_rate)?,
    })
}

/// Discovery areas whose team-average capture rate is under its floor
/// (NOW 30%, MEASURE 40%, BLOCKER 35%).
pub fn improvement_areas(hosts: &[HostPerformance]) -> Vec<ImprovementArea> {
    DISCOVERY_FLOORS
        .iter()
        .filter_map(|floor| {
            let current = mean(hosts.iter().map(|h| h.rate(floor.field)))?;
            (current < floor.floor).then(|| ImprovementArea {
                field: floor.field,
                area: floor.area.to_string(),
                current: round1(current),
                target: floor.target.to_string(),
                suggestion: floor.suggestion.to_string(),
            })
        })
        .collect()
}
