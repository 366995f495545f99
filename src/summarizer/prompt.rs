use serde_json::{json, Value};

use crate::report::{CoachingSummary, Report, ReportMode, ReportSection, SectionEntry};
use crate::signals::ExtractedSignal;

const MAX_WORDS: usize = 400;
const MAX_COACHING_WORDS: usize = 350;

pub fn system_prompt(brand: &str) -> String {
    format!(
        "You are {}'s internal analyst. Write a concise UK-English weekly briefing for the team.\n\
         \n\
         Rules:\n\
         1. Use Markdown: ## for headings, - for bullets, **double asterisks** for bold.\n\
         2. Quote evidence verbatim. Never invent clients, figures or dates.\n\
         3. Highlight every budget, percentage, headcount and timeline.\n\
         4. Keep to at most {} words.",
        brand, MAX_WORDS
    )
}

/// User message: instructions followed by the report skeleton as JSON.
/// The narrative itself is never part of the payload.
pub fn user_prompt(report: &Report) -> String {
    let (instructions, data) = match report.mode {
        ReportMode::Insights => (
            format!(
                "Summarise this week's meeting intelligence ({}) as an executive briefing.\n\
                 Open with the two or three most important opportunities, then pipeline value, \
                 market signals and the actions that need following up this week. \
                 Mention the busiest clients and how activity moved against the previous period.",
                report.window
            ),
            insights_skeleton(report),
        ),
        ReportMode::Coaching => (
            format!(
                "Write a calls and coaching briefing for the team ({}), under {} words.\n\
                 Cover, in order: a team performance summary with the change against last week, \
                 the top three performers, one strength and one gap for each host, the team's \
                 improvement focus with the suggested questions, and the quality indicators \
                 behind the numbers.",
                report.window, MAX_COACHING_WORDS
            ),
            coaching_skeleton(report),
        ),
    };
    let data = serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());

    format!("{}\n\nData:\n{}", instructions, data)
}

fn window(report: &Report) -> Value {
    json!({
        "start": report.window.start.to_string(),
        "end": report.window.end.to_string(),
    })
}

fn insights_skeleton(report: &Report) -> Value {
    json!({
        "window": window(report),
        "metrics": report.metrics,
        "trends": report.trends,
        "sections": report.sections.iter().map(section).collect::<Vec<_>>(),
        "clients": report.analytics.clients,
        "service_fit": report.analytics.services,
        "blockers": report.analytics.blockers,
        "team": report.team.iter().map(|member| json!({
            "owner": member.owner,
            "meetings": member.conversations.len(),
            "average_score": member.average_score,
        })).collect::<Vec<_>>(),
        "team_average": report.team_average,
    })
}

fn coaching_skeleton(report: &Report) -> Value {
    let empty = CoachingSummary::default();
    let coaching = report.coaching.as_ref().unwrap_or(&empty);
    json!({
        "window": window(report),
        "metrics": report.metrics,
        "trends": report.trends,
        "hosts": coaching.hosts,
        "top_performers": coaching
            .top_performers()
            .iter()
            .map(|h| h.host.as_str())
            .collect::<Vec<_>>(),
        "benchmarks": coaching.benchmarks,
        "improvement_areas": coaching.improvement_areas,
    })
}

fn section(section: &ReportSection) -> Value {
    json!({
        "title": section.title(),
        "entries": section.entries.iter().map(entry).collect::<Vec<_>>(),
    })
}

fn entry(entry: &SectionEntry) -> Value {
    let meeting = &entry.meeting;
    let evidence: serde_json::Map<String, Value> = meeting
        .fields()
        .filter_map(|(kind, field)| {
            field
                .evidence_text()
                .map(|text| (kind.to_string(), Value::String(text.to_string())))
        })
        .collect();

    json!({
        "client": meeting.client_name(),
        "title": meeting.display_title(),
        "date": meeting.date.to_string(),
        "owner": meeting.display_owner(),
        "score": meeting.score,
        "evidence": evidence,
        "figures": entry.signals.iter().map(figure).collect::<Vec<_>>(),
        "matched_terms": entry.matched_terms,
        "notes_url": meeting.notes_url,
    })
}

fn figure(signal: &ExtractedSignal) -> String {
    format!("{} ({})", signal.literal, signal.field)
}
