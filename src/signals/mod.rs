//! Numeric signal extraction from meeting evidence.
//!
//! Scans the evidence quote of each scoring field for monetary amounts,
//! percentages and headcount-style counts. Extraction never fails: figures
//! that do not parse cleanly are skipped.

use anyhow::Result;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

use crate::meeting::{FieldKind, MeetingRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Money,
    Percentage,
    Count,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Gbp,
    Usd,
    Eur,
}

impl Currency {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "£" | "GBP" => Some(Self::Gbp),
            "$" | "USD" => Some(Self::Usd),
            "€" | "EUR" => Some(Self::Eur),
            _ => None,
        }
    }
}

/// A numeric fact found in one field's evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedSignal {
    pub field: FieldKind,
    pub kind: SignalKind,
    /// The substring exactly as it appeared in the evidence.
    pub literal: String,
    /// Normalized value; the lower bound for ranges.
    pub amount: f64,
    pub upper: Option<f64>,
    pub currency: Option<Currency>,
    /// Noun for counts ("roles", "hires").
    pub unit: Option<String>,
}

const MONEY_PATTERN: &str = r"(?ix)
    (?P<cur>[£$€]|\b(?:gbp|usd|eur)\s?)?
    (?P<lo>(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)
    (?:\s?(?P<lo_unit>thousand|million|billion|mm|mn|bn|k|m|b)\b)?
    (?:
        \s*(?:-|–|—|to)\s*
        (?P<cur2>[£$€])?
        (?P<hi>(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?)
        (?:\s?(?P<hi_unit>thousand|million|billion|mm|mn|bn|k|m|b)\b)?
    )?";

const PERCENT_PATTERN: &str = r"(?ix)
    (?P<lo>\d+(?:\.\d+)?)
    (?:\s*(?:-|–|—|to)\s*(?P<hi>\d+(?:\.\d+)?))?
    \s?(?:%|percent\b|per\s+cent\b)";

const COUNT_PATTERN: &str = r"(?ix)
    \b(?P<n>\d{1,3}(?:,\d{3})+|\d+)
    \s+(?:(?:new|more|additional|extra|senior|junior|permanent|perm)\s+)?
    (?P<unit>roles?|hires?|people|heads|headcount|staff|engineers?|developers?|designers?
        |seats?|clients?|candidates?|ftes?|positions?|employees?|offices?|markets?|freelancers?)\b";

/// Compiled extraction patterns. Build once, share freely.
pub struct SignalExtractor {
    money: Regex,
    percent: Regex,
    count: Regex,
}

impl SignalExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            money: Regex::new(MONEY_PATTERN)?,
            percent: Regex::new(PERCENT_PATTERN)?,
            count: Regex::new(COUNT_PATTERN)?,
        })
    }

    /// All signals in a meeting, fields in scan order, text order within a field.
    pub fn extract(&self, record: &MeetingRecord) -> Vec<ExtractedSignal> {
        let signals: Vec<ExtractedSignal> = record
            .fields()
            .filter_map(|(kind, field)| field.evidence_text().map(|text| (kind, text)))
            .flat_map(|(kind, text)| self.extract_text(kind, text))
            .collect();

        if !signals.is_empty() {
            debug!("Meeting {}: {} signal(s)", record.id, signals.len());
        }
        signals
    }

    /// Signals in a single evidence string.
    pub fn extract_text(&self, field: FieldKind, text: &str) -> Vec<ExtractedSignal> {
        let mut found: Vec<(Range<usize>, ExtractedSignal)> = Vec::new();

        for caps in self.money.captures_iter(text) {
            if let Some((span, signal)) = money_signal(field, text, &caps) {
                push_unless_overlapping(&mut found, span, signal);
            }
        }

        for caps in self.percent.captures_iter(text) {
            if let Some((span, signal)) = percent_signal(field, text, &caps) {
                push_unless_overlapping(&mut found, span, signal);
            }
        }

        for caps in self.count.captures_iter(text) {
            if let Some((span, signal)) = count_signal(field, text, &caps) {
                push_unless_overlapping(&mut found, span, signal);
            }
        }

        found.sort_by_key(|(span, _)| span.start);
        found.into_iter().map(|(_, signal)| signal).collect()
    }
}

fn push_unless_overlapping(
    found: &mut Vec<(Range<usize>, ExtractedSignal)>,
    span: Range<usize>,
    signal: ExtractedSignal,
) {
    let overlaps = found
        .iter()
        .any(|(existing, _)| span.start < existing.end && existing.start < span.end);
    if !overlaps {
        found.push((span, signal));
    }
}

fn money_signal(
    field: FieldKind,
    text: &str,
    caps: &Captures<'_>,
) -> Option<(Range<usize>, ExtractedSignal)> {
    let whole = caps.get(0)?;
    if !cleanly_bounded(text, whole.start(), whole.end()) {
        return None;
    }

    let cur = caps.name("cur").and_then(|m| Currency::parse(m.as_str()));
    let cur2 = caps.name("cur2").and_then(|m| Currency::parse(m.as_str()));

    // "10 to £200k": the lower figure is not money, keep only the upper one.
    if cur.is_none() && cur2.is_some() {
        let start = caps.name("cur2")?.start();
        let unit = caps.name("hi_unit").map(|m| m.as_str());
        let value = scaled(caps.name("hi")?.as_str(), unit)?;
        let span = start..whole.end();
        return Some((
            span.clone(),
            ExtractedSignal {
                field,
                kind: SignalKind::Money,
                literal: text[span].to_string(),
                amount: value,
                upper: None,
                currency: cur2,
                unit: None,
            },
        ));
    }

    let lo_unit = caps.name("lo_unit").map(|m| m.as_str());
    let hi_unit = caps.name("hi_unit").map(|m| m.as_str());
    if cur.is_none() && lo_unit.is_none() && hi_unit.is_none() {
        return None;
    }

    let lo = scaled(caps.name("lo")?.as_str(), lo_unit.or(hi_unit))?;
    let upper = match caps.name("hi") {
        Some(hi) => {
            let hi_is_bare = cur2.is_none() && hi_unit.is_none();
            let lo_is_money = cur.is_some() || lo_unit.is_some();
            match scaled(hi.as_str(), hi_unit.or(lo_unit)) {
                Some(hi) if lo <= hi && !(hi_is_bare && lo_is_money) => Some(hi),
                // "£50k - 2 hires", "£500-200k": keep the lower figure alone.
                _ => return lone_lower_figure(field, text, caps, cur),
            }
        }
        None => None,
    };

    Some((
        whole.range(),
        ExtractedSignal {
            field,
            kind: SignalKind::Money,
            literal: whole.as_str().trim().to_string(),
            amount: lo,
            upper,
            currency: cur,
            unit: None,
        },
    ))
}

/// The lower figure of a failed range, scaled by its own unit only.
fn lone_lower_figure(
    field: FieldKind,
    text: &str,
    caps: &Captures<'_>,
    currency: Option<Currency>,
) -> Option<(Range<usize>, ExtractedSignal)> {
    let lo = caps.name("lo")?;
    let lo_unit = caps.name("lo_unit");
    if currency.is_none() && lo_unit.is_none() {
        return None;
    }

    let start = caps.name("cur").map_or(lo.start(), |m| m.start());
    let end = lo_unit.map_or(lo.end(), |m| m.end());
    let amount = scaled(lo.as_str(), lo_unit.map(|m| m.as_str()))?;
    let span = start..end;
    Some((
        span.clone(),
        ExtractedSignal {
            field,
            kind: SignalKind::Money,
            literal: text[span].trim().to_string(),
            amount,
            upper: None,
            currency,
            unit: None,
        },
    ))
}

fn percent_signal(
    field: FieldKind,
    text: &str,
    caps: &Captures<'_>,
) -> Option<(Range<usize>, ExtractedSignal)> {
    let whole = caps.get(0)?;
    if !cleanly_bounded(text, whole.start(), whole.end()) {
        return None;
    }

    let lo = parse_number(caps.name("lo")?.as_str())?;
    let upper = match caps.name("hi") {
        Some(hi) => {
            let hi = parse_number(hi.as_str())?;
            if lo > hi {
                return None;
            }
            Some(hi)
        }
        None => None,
    };

    Some((
        whole.range(),
        ExtractedSignal {
            field,
            kind: SignalKind::Percentage,
            literal: whole.as_str().to_string(),
            amount: lo,
            upper,
            currency: None,
            unit: None,
        },
    ))
}

fn count_signal(
    field: FieldKind,
    text: &str,
    caps: &Captures<'_>,
) -> Option<(Range<usize>, ExtractedSignal)> {
    let whole = caps.get(0)?;
    if !cleanly_bounded(text, whole.start(), whole.end()) {
        return None;
    }

    let value = parse_number(caps.name("n")?.as_str())?;
    Some((
        whole.range(),
        ExtractedSignal {
            field,
            kind: SignalKind::Count,
            literal: whole.as_str().to_string(),
            amount: value,
            upper: None,
            currency: None,
            unit: caps.name("unit").map(|m| m.as_str().to_lowercase()),
        },
    ))
}

/// Rejects figures glued to other digits or letters ("£1.2.3", "v2.5%", "Q3").
fn cleanly_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let starts_with_digit = text[start..]
        .chars()
        .next()
        .map(|c| c.is_ascii_digit())
        .unwrap_or(false);
    if starts_with_digit {
        if let Some(c) = before {
            if c.is_alphanumeric() || c == '.' || c == ',' {
                return false;
            }
        }
    }

    let mut after = text[end..].chars();
    match after.next() {
        Some(c) if c.is_ascii_digit() => false,
        Some('.') | Some(',') => !after.next().map(|c| c.is_ascii_digit()).unwrap_or(false),
        _ => true,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}

fn unit_factor(unit: &str) -> Option<f64> {
    match unit.to_ascii_lowercase().as_str() {
        "k" | "thousand" => Some(1e3),
        "m" | "mm" | "mn" | "million" => Some(1e6),
        "b" | "bn" | "billion" => Some(1e9),
        _ => None,
    }
}

fn scaled(raw: &str, unit: Option<&str>) -> Option<f64> {
    let value = parse_number(raw)?;
    let factor = match unit {
        Some(unit) => unit_factor(unit)?,
        None => 1.0,
    };
    Some(((value * factor) * 100.0).round() / 100.0)
}
