//! Row decoding shared by all store providers.
//!
//! A row is a flat JSON object keyed by column name. Values may arrive as
//! native JSON (fixture files) or as strings (BigQuery REST returns every
//! scalar as a string, and JSON columns as serialized text).

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use super::FetchOutcome;
use crate::meeting::{
    ClientInfo, FieldKind, MeetingRecord, ScoringField, MAX_SCORE, QUALIFIED_THRESHOLD,
};

pub type Row = Map<String, Value>;

#[derive(Error, Debug, PartialEq)]
#[error("malformed record {id}: {reason}")]
pub struct RecordError {
    pub id: String,
    pub reason: String,
}

impl RecordError {
    fn new(id: Option<&str>, reason: impl Into<String>) -> Self {
        Self {
            id: id.unwrap_or("<no id>").to_string(),
            reason: reason.into(),
        }
    }
}

/// Decodes every row, dropping and logging the ones that are malformed.
pub fn parse_rows<I>(rows: I) -> FetchOutcome
where
    I: IntoIterator<Item = Row>,
{
    let mut outcome = FetchOutcome::default();
    for row in rows {
        match parse_row(&row) {
            Ok(record) => outcome.records.push(record),
            Err(e) => {
                warn!("Skipping {}", e);
                outcome.skipped += 1;
            }
        }
    }
    outcome
}

pub fn parse_row(row: &Row) -> Result<MeetingRecord, RecordError> {
    let id = text(row, &["meeting_id", "id"]);
    let id_ref = id.as_deref();
    let id = id
        .clone()
        .ok_or_else(|| RecordError::new(None, "missing meeting_id"))?;

    let raw_date =
        text(row, &["date"]).ok_or_else(|| RecordError::new(id_ref, "missing date"))?;
    let date = parse_date(&raw_date)
        .ok_or_else(|| RecordError::new(id_ref, format!("unparseable date '{}'", raw_date)))?;

    let score = match first(row, &["score", "total_qualified_sections"]) {
        None => 0,
        Some(value) => {
            let score = as_u64(value).ok_or_else(|| {
                RecordError::new(id_ref, format!("score is not an integer: {}", value))
            })?;
            if score > u64::from(MAX_SCORE) {
                return Err(RecordError::new(
                    id_ref,
                    format!("score {} outside 0..={}", score, MAX_SCORE),
                ));
            }
            score as u8
        }
    };

    let qualified = row
        .get("qualified")
        .and_then(as_bool)
        .unwrap_or(score >= QUALIFIED_THRESHOLD);

    let client = match json_object(row, "client_info") {
        Ok(Some(info)) => ClientInfo {
            name: text(&info, &["client", "name", "company"]),
            industry: text(&info, &["industry", "sector"]),
            contact: text(&info, &["contact", "contact_name"]),
        },
        Ok(None) => ClientInfo::default(),
        Err(reason) => {
            warn!("Meeting {}: ignoring client_info ({})", id, reason);
            ClientInfo::default()
        }
    };

    let mut record = MeetingRecord::new(id.clone(), date);
    record.title = text(row, &["title", "meeting_title", "calendar_event_title"]);
    record.owner = text(row, &["owner", "creator_name"]);
    record.desk = text(row, &["desk"]);
    record.notes_url = text(row, &["notes_url", "granola_link", "meeting_link"]);
    record.client = client;
    record.qualified = qualified;
    record.score = score;

    for kind in FieldKind::ALL {
        match json_object(row, kind.column()) {
            Ok(Some(obj)) => *record.field_mut(kind) = scoring_field(&obj),
            Ok(None) => {}
            Err(reason) => warn!("Meeting {}: ignoring {} field ({})", id, kind, reason),
        }
    }

    Ok(record)
}

fn scoring_field(obj: &Row) -> ScoringField {
    let evidence = match obj.get("evidence") {
        Some(Value::Array(items)) => {
            let parts: Vec<String> = items.iter().filter_map(scalar_text).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Some(value) => scalar_text(value),
        None => None,
    }
    .or_else(|| text(obj, &["reasoning"]));

    let services = match obj.get("services") {
        Some(Value::Array(items)) => items.iter().filter_map(scalar_text).collect(),
        Some(value) => scalar_text(value).into_iter().collect(),
        None => Vec::new(),
    };

    ScoringField {
        qualified: obj.get("qualified").and_then(as_bool).unwrap_or(false),
        summary: text(obj, &["summary"]),
        evidence,
        services,
    }
}

fn first<'a>(row: &'a Row, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .find(|value| !value.is_null())
}

/// First non-blank value among `keys`, as text.
fn text(row: &Row, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| row.get(*key))
        .find_map(scalar_text)
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_u64().map(|n| n != 0),
        _ => None,
    }
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// A JSON column, either as an object or as serialized JSON text.
fn json_object(row: &Row, key: &str) -> Result<Option<Row>, String> {
    let mut value = match row.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value.clone(),
    };

    // TO_JSON_STRING over a STRING column yields JSON-in-a-string; unwrap twice at most.
    for _ in 0..2 {
        match value {
            Value::Object(obj) => return Ok(Some(obj)),
            Value::String(ref s) if s.trim().is_empty() || s.trim() == "null" => return Ok(None),
            Value::String(s) => {
                value = serde_json::from_str(&s).map_err(|e| format!("invalid JSON: {}", e))?;
            }
            Value::Null => return Ok(None),
            other => return Err(format!("expected an object, got {}", other)),
        }
    }

    match value {
        Value::Object(obj) => Ok(Some(obj)),
        Value::Null => Ok(None),
        other => Err(format!("expected an object, got {}", other)),
    }
}
