//! HTML email rendering.

use anyhow::Result;
use chrono::{Datelike, Duration, NaiveDate};

use crate::meeting::MeetingRecord;
use crate::report::{
    CoachingSummary, InsightAnalytics, Report, ReportMode, ReportSection, SectionEntry,
    SummaryMetrics, TeamMember, WeekOverWeek,
};
use crate::signals::ExtractedSignal;

mod markdown;

pub use markdown::NarrativeMarkdown;

const STYLE: &str = r#"
        body { font-family: 'Helvetica Neue', Helvetica, Arial, sans-serif; background-color: #f4f4f4; margin: 0; padding: 0; }
        .container { max-width: 600px; margin: 0 auto; background-color: #ffffff; }
        .header { text-align: center; padding: 30px 20px 10px; }
        .header h1 { font-size: 24px; font-weight: 700; margin: 0 0 10px 0; color: #1a1a1a; }
        .header .subtitle { font-size: 16px; color: #666666; margin: 0; }
        .header .generated { font-size: 12px; color: #999999; margin-top: 5px; }
        .content { padding: 20px 30px 30px; font-size: 15px; color: #333333; line-height: 1.7; }
        .content h2 { font-size: 20px; font-weight: 700; margin: 30px 0 15px 0; color: #1a1a1a; border-bottom: 2px solid #0066cc; padding-bottom: 8px; }
        .content h3 { font-size: 17px; font-weight: 700; margin: 25px 0 12px 0; color: #1a1a1a; }
        .content h4 { font-size: 15px; font-weight: 600; margin: 18px 0 8px 0; color: #2c2c2c; }
        .content ul { margin: 10px 0 20px 0; padding-left: 20px; }
        .content li { margin-bottom: 8px; line-height: 1.6; }
        .content p { margin: 0 0 12px 0; }
        .content strong, .content b { font-weight: 600; color: #1a1a1a; }
        .insight-card { background: #f8f9fa; border-left: 4px solid #0066cc; padding: 16px 20px; margin: 20px 0; border-radius: 4px; }
        .insight-card h3 { margin-top: 0; color: #0066cc; font-size: 16px; }
        .insight-card .meta { font-size: 13px; color: #666; margin: 0 0 8px 0; }
        .insight-card .evidence { font-style: italic; color: #555; margin: 8px 0; font-size: 14px; }
        .insight-card .tag { display: inline-block; background: #e3f2fd; color: #0066cc; padding: 4px 12px; border-radius: 12px; font-size: 12px; font-weight: 600; margin: 8px 6px 0 0; }
        .empty { color: #999999; font-style: italic; }
        .metric { font-size: 28px; font-weight: 700; color: #0066cc; line-height: 1.2; }
        .metric-label { font-size: 13px; color: #666; text-transform: uppercase; letter-spacing: 0.5px; font-weight: 600; }
        .content table { width: 100%; border-collapse: collapse; margin: 15px 0; }
        .content th { background: #f8f8f8; padding: 10px; text-align: left; font-weight: 600; border-bottom: 2px solid #e0e0e0; }
        .content td { padding: 10px; border-bottom: 1px solid #f0f0f0; }
        .up { color: #1b7f3b; font-weight: 600; }
        .down { color: #b3261e; font-weight: 600; }
        .footer { font-size: 12px; color: #999999; margin-top: 30px; padding: 20px 30px 30px; border-top: 1px solid #e0e0e0; text-align: center; }
"#;

#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub brand: String,
}

/// Renders reports to a self-contained HTML document.
pub struct Renderer {
    options: RenderOptions,
    markdown: NarrativeMarkdown,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Result<Self> {
        Ok(Self {
            options,
            markdown: NarrativeMarkdown::new()?,
        })
    }

    pub fn brand(&self) -> &str {
        &self.options.brand
    }

    /// Pure function of the report: the same report renders byte-identically.
    pub fn render_report(&self, report: &Report) -> String {
        let brand = escape_html(&self.options.brand);
        let mut body = String::new();

        body.push_str("<h2>Summary</h2>\n");
        body.push_str(&self.markdown.to_html(&report.narrative.text));
        body.push_str(&metrics_table(&report.metrics));
        if let Some(trends) = &report.trends {
            body.push_str(&trends_block(trends));
        }

        match report.mode {
            ReportMode::Insights => {
                for section in &report.sections {
                    body.push_str(&render_section(section));
                }
                body.push_str(&analytics_blocks(&report.analytics));
                if !report.team.is_empty() {
                    body.push_str(&team_table(&report.team, report.team_average));
                }
            }
            ReportMode::Coaching => {
                let empty = CoachingSummary::default();
                body.push_str(&coaching_blocks(report.coaching.as_ref().unwrap_or(&empty)));
            }
        }

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{brand} - {title} Report</title>
    <style>{style}</style>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>{brand}</h1>
            <p class="subtitle">{title} Report</p>
            <p class="generated">Automated Intelligence | Generated {generated}</p>
        </div>
        <div class="content">
{body}        </div>
        <div class="footer">
            Automated {brand} Report<br/>
            Analysis Period: {period}<br/>
            Generated from {qualified} qualified meetings | Internal use only
        </div>
    </div>
</body>
</html>
"#,
            brand = brand,
            title = escape_html(report.mode.title()),
            style = STYLE,
            generated = report.generated_on.format("%d %b %Y"),
            body = body,
            period = report.window,
            qualified = report.metrics.qualified_meetings,
        )
    }
}

/// Subject line for the weekly email, dated to the Friday ending the week.
pub fn email_subject(brand: &str, mode: ReportMode, today: NaiveDate) -> String {
    format!(
        "{} {} (w/e {})",
        brand,
        mode.title(),
        week_ending(today).format("%d %b")
    )
}

/// Friday of the current week; Saturday and Sunday roll to the next Friday.
pub fn week_ending(today: NaiveDate) -> NaiveDate {
    let weekday = today.weekday().num_days_from_monday() as i64;
    let mut days_ahead = 4 - weekday;
    if days_ahead < 0 {
        days_ahead += 7;
    }
    today + Duration::days(days_ahead)
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// The URL, if it is an absolute http(s) link.
pub fn safe_url(url: &str) -> Option<&str> {
    let url = url.trim();
    let lower = url.to_ascii_lowercase();
    let allowed = lower.starts_with("https://") || lower.starts_with("http://");
    (allowed && !url.chars().any(char::is_whitespace)).then_some(url)
}

fn metrics_table(metrics: &SummaryMetrics) -> String {
    let cells = [
        (metrics.total_meetings.to_string(), "Meetings"),
        (metrics.qualified_meetings.to_string(), "Qualified"),
        (format!("{:.1}%", metrics.pct_qualified), "Qualified rate"),
        (format!("{:.1}", metrics.avg_score), "Average score"),
        (metrics.total_signals.to_string(), "Signals"),
    ];

    let mut html = String::from("<table>\n<tr>\n");
    for (value, label) in cells {
        html.push_str(&format!(
            "<td><div class=\"metric\">{}</div><div class=\"metric-label\">{}</div></td>\n",
            value, label
        ));
    }
    html.push_str("</tr>\n</table>\n");
    html
}

fn render_section(section: &ReportSection) -> String {
    let mut html = format!("<h2>{}</h2>\n", section.title());

    if section.is_empty() {
        html.push_str(&format!(
            "<p class=\"empty\">{}</p>\n",
            section.kind.empty_message()
        ));
        return html;
    }

    for entry in &section.entries {
        html.push_str(&render_entry(entry));
    }
    html
}

fn render_entry(entry: &SectionEntry) -> String {
    let meeting = &entry.meeting;
    let mut html = String::from("<div class=\"insight-card\">\n");

    html.push_str(&format!("<h3>{}</h3>\n", escape_html(meeting.client_name())));
    html.push_str(&format!("<p class=\"meta\">{}</p>\n", meta_line(meeting)));

    for (kind, field) in meeting.fields() {
        if let Some(evidence) = field.evidence_text() {
            html.push_str(&format!(
                "<p class=\"evidence\"><strong>{}</strong>: &ldquo;{}&rdquo;</p>\n",
                kind,
                escape_html(evidence)
            ));
        }
    }

    if !entry.signals.is_empty() || !entry.matched_terms.is_empty() {
        html.push_str("<div>");
        for signal in &entry.signals {
            html.push_str(&format!(
                "<span class=\"tag\">{}</span>",
                escape_html(&describe_signal(signal))
            ));
        }
        for term in &entry.matched_terms {
            html.push_str(&format!("<span class=\"tag\">#{}</span>", escape_html(term)));
        }
        html.push_str("</div>\n");
    }

    if let Some(url) = meeting.notes_url.as_deref().and_then(safe_url) {
        html.push_str(&format!(
            "<p><a href=\"{}\">View full notes &rarr;</a></p>\n",
            escape_html(url)
        ));
    }

    html.push_str("</div>\n");
    html
}

fn meta_line(meeting: &MeetingRecord) -> String {
    let mut parts = vec![
        escape_html(meeting.display_title()),
        meeting.date.format("%d %b").to_string(),
        format!("Owner: {}", escape_html(meeting.display_owner())),
        format!("Score: {}/5", meeting.score),
    ];
    if let Some(desk) = meeting.desk.as_deref() {
        parts.push(format!("Desk: {}", escape_html(desk)));
    }
    parts.join(" | ")
}

fn describe_signal(signal: &ExtractedSignal) -> String {
    format!("{} ({})", signal.literal, signal.field)
}

fn team_table(team: &[TeamMember], team_average: f64) -> String {
    let mut html = String::from(
        "<h2>Team Performance</h2>\n<table>\n<tr><th>Owner</th><th>Qualified meetings</th><th>Average score</th><th>Top conversation</th></tr>\n",
    );
    for member in team {
        let top = member
            .conversations
            .first()
            .map(|c| format!("{} ({}/5)", escape_html(&c.client), c.score))
            .unwrap_or_default();
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{:.1}</td><td>{}</td></tr>\n",
            escape_html(&member.owner),
            member.conversations.len(),
            member.average_score,
            top
        ));
    }
    let conversations: usize = team.iter().map(|m| m.conversations.len()).sum();
    html.push_str(&format!(
        "<tr><td><strong>Team average</strong></td><td>{}</td><td><strong>{:.1}</strong></td><td></td></tr>\n",
        conversations, team_average
    ));
    html.push_str("</table>\n");
    html
}

/// "+3 (+50.0%)" style change, coloured by direction.
fn change(delta: i64, pct: Option<f64>) -> String {
    let class = match delta.signum() {
        1 => "up",
        -1 => "down",
        _ => "empty",
    };
    let pct = pct.map(|p| format!(" ({:+.1}%)", p)).unwrap_or_default();
    format!("<span class=\"{}\">{:+}{}</span>", class, delta, pct)
}

fn trends_block(trends: &WeekOverWeek) -> String {
    let score_class = if trends.score_change > 0.0 {
        "up"
    } else if trends.score_change < 0.0 {
        "down"
    } else {
        "empty"
    };
    let mut html = String::from(
        "<h3>Versus Previous Period</h3>\n<table>\n<tr><th></th><th>This period</th><th>Previous</th><th>Change</th></tr>\n",
    );
    html.push_str(&format!(
        "<tr><td>Meetings</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        trends.current.meetings,
        trends.previous.meetings,
        change(trends.meetings_change, trends.meetings_pct)
    ));
    html.push_str(&format!(
        "<tr><td>Qualified</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
        trends.current.qualified,
        trends.previous.qualified,
        change(trends.qualified_change, trends.qualified_pct)
    ));
    html.push_str(&format!(
        "<tr><td>Average score</td><td>{:.1}</td><td>{:.1}</td><td><span class=\"{}\">{:+.1}</span></td></tr>\n",
        trends.current.avg_score, trends.previous.avg_score, score_class, trends.score_change
    ));
    html.push_str("</table>\n");
    html
}

fn analytics_blocks(analytics: &InsightAnalytics) -> String {
    let mut html = String::new();

    if !analytics.clients.is_empty() {
        html.push_str(
            "<h2>Client Engagement</h2>\n<table>\n<tr><th>Client</th><th>Meetings</th><th>Qualified</th><th>Avg score</th><th>Latest</th></tr>\n",
        );
        for client in &analytics.clients {
            let latest = match client.last_meeting_owner.as_deref() {
                Some(owner) => format!(
                    "{} ({})",
                    client.last_meeting_date.format("%d %b"),
                    escape_html(owner)
                ),
                None => client.last_meeting_date.format("%d %b").to_string(),
            };
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{:.1}</td><td>{}</td></tr>\n",
                escape_html(&client.client),
                client.meeting_count,
                client.qualified_count,
                client.avg_score,
                latest
            ));
        }
        html.push_str("</table>\n");
    }

    if !analytics.services.is_empty() {
        html.push_str(&format!(
            "<h2>Service Fit</h2>\n<p class=\"meta\">{} qualified FIT opportunities</p>\n<ul>\n",
            analytics.fit_opportunities
        ));
        for share in &analytics.services {
            html.push_str(&format!(
                "<li><strong>{}</strong>: {} ({:.1}%), avg score {:.1}</li>\n",
                escape_html(&share.service),
                share.count,
                share.percentage,
                share.avg_score
            ));
        }
        html.push_str("</ul>\n");
    }

    if !analytics.blockers.is_empty() {
        html.push_str("<h2>Common Blockers</h2>\n<ul>\n");
        for blocker in &analytics.blockers {
            let label = match (blocker.summary.as_deref(), blocker.evidence.as_deref()) {
                (Some(summary), Some(evidence)) => format!(
                    "<strong>{}</strong>: &ldquo;{}&rdquo;",
                    escape_html(summary),
                    escape_html(evidence)
                ),
                (Some(text), None) => format!("<strong>{}</strong>", escape_html(text)),
                (None, Some(text)) => format!("&ldquo;{}&rdquo;", escape_html(text)),
                (None, None) => continue,
            };
            html.push_str(&format!("<li>{} &times;{}</li>\n", label, blocker.frequency));
        }
        html.push_str("</ul>\n");
    }

    html
}

fn coaching_blocks(coaching: &CoachingSummary) -> String {
    let mut html = String::new();

    html.push_str("<h2>Top Performers</h2>\n");
    if coaching.hosts.is_empty() {
        html.push_str("<p class=\"empty\">No host had enough meetings for coaching metrics.</p>\n");
        return html;
    }
    html.push_str("<ul>\n");
    for host in coaching.top_performers() {
        html.push_str(&format!(
            "<li><strong>{}</strong>: {:.1} avg score over {} meetings, discovery depth {:.1}%</li>\n",
            escape_html(&host.host),
            host.avg_score,
            host.total_meetings,
            host.discovery_depth
        ));
    }
    html.push_str("</ul>\n");

    html.push_str(
        "<h2>Host Performance</h2>\n<table>\n<tr><th>Host</th><th>Meetings</th><th>Avg score</th><th>NOW</th><th>MEASURE</th><th>BLOCKER</th><th>Depth</th><th>vs team</th></tr>\n",
    );
    for host in &coaching.hosts {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{:.1}</td><td>{:.0}%</td><td>{:.0}%</td><td>{:.0}%</td><td>{:.1}%</td><td>{:+.1}</td></tr>\n",
            escape_html(&host.host),
            host.total_meetings,
            host.avg_score,
            host.now_rate,
            host.measure_rate,
            host.blocker_rate,
            host.discovery_depth,
            host.vs_team_score
        ));
    }
    html.push_str("</table>\n");

    if let Some(benchmarks) = &coaching.benchmarks {
        html.push_str(&format!(
            "<h3>Team Benchmarks</h3>\n<p class=\"meta\">Avg score {:.1} | Discovery depth {:.1}% | NOW {:.1}% | MEASURE {:.1}% | BLOCKER {:.1}%</p>\n",
            benchmarks.avg_score,
            benchmarks.avg_discovery_depth,
            benchmarks.avg_now_rate,
            benchmarks.avg_measure_rate,
            benchmarks.avg_blocker_rate
        ));
    }

    html.push_str("<h2>Improvement Focus</h2>\n");
    if coaching.improvement_areas.is_empty() {
        html.push_str("<p class=\"empty\">Every discovery area is at or above its floor.</p>\n");
        return html;
    }
    for area in &coaching.improvement_areas {
        html.push_str(&format!(
            "<div class=\"insight-card\">\n<h3>{}</h3>\n<p class=\"meta\">Team rate {:.1}%, target {}</p>\n<p>{}</p>\n</div>\n",
            escape_html(&area.area),
            area.current,
            escape_html(&area.target),
            escape_html(&area.suggestion)
        ));
    }
    html
}
