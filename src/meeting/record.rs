use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Score at or above which a meeting counts as qualified when the store
/// does not carry an explicit flag.
pub const QUALIFIED_THRESHOLD: u8 = 3;

/// Highest possible qualification score (one point per scoring field).
pub const MAX_SCORE: u8 = 5;

/// The five scoring fields every meeting is assessed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldKind {
    Now,
    Next,
    Measure,
    Blocker,
    Fit,
}

impl FieldKind {
    /// Scan order used everywhere fields are iterated.
    pub const ALL: [FieldKind; 5] = [
        FieldKind::Now,
        FieldKind::Next,
        FieldKind::Measure,
        FieldKind::Blocker,
        FieldKind::Fit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Now => "NOW",
            Self::Next => "NEXT",
            Self::Measure => "MEASURE",
            Self::Blocker => "BLOCKER",
            Self::Fit => "FIT",
        }
    }

    /// Column name in the evidence table.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Now => "now",
            Self::Next => "next",
            Self::Measure => "measure",
            Self::Blocker => "blocker",
            Self::Fit => "fit",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: Option<String>,
    pub industry: Option<String>,
    pub contact: Option<String>,
}

/// One scoring field: whether the criterion was met, plus the quote backing it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringField {
    pub qualified: bool,
    pub summary: Option<String>,
    pub evidence: Option<String>,
    /// Service lines the criterion points at; only FIT carries these.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
}

impl ScoringField {
    /// Evidence text, or `None` when absent or blank.
    pub fn evidence_text(&self) -> Option<&str> {
        self.evidence
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub id: String,
    pub date: NaiveDate,
    pub title: Option<String>,
    /// Meeting host.
    pub owner: Option<String>,
    pub desk: Option<String>,
    pub client: ClientInfo,
    pub now: ScoringField,
    pub next: ScoringField,
    pub measure: ScoringField,
    pub blocker: ScoringField,
    pub fit: ScoringField,
    /// Link to the full meeting notes.
    pub notes_url: Option<String>,
    pub qualified: bool,
    /// Qualification score, 0..=5.
    pub score: u8,
}

impl MeetingRecord {
    pub fn field(&self, kind: FieldKind) -> &ScoringField {
        match kind {
            FieldKind::Now => &self.now,
            FieldKind::Next => &self.next,
            FieldKind::Measure => &self.measure,
            FieldKind::Blocker => &self.blocker,
            FieldKind::Fit => &self.fit,
        }
    }

    pub fn field_mut(&mut self, kind: FieldKind) -> &mut ScoringField {
        match kind {
            FieldKind::Now => &mut self.now,
            FieldKind::Next => &mut self.next,
            FieldKind::Measure => &mut self.measure,
            FieldKind::Blocker => &mut self.blocker,
            FieldKind::Fit => &mut self.fit,
        }
    }

    /// Fields in scan order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldKind, &ScoringField)> {
        FieldKind::ALL.into_iter().map(move |kind| (kind, self.field(kind)))
    }

    pub fn client_name(&self) -> &str {
        self.client
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or("Unknown Client")
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Untitled meeting")
    }

    pub fn display_owner(&self) -> &str {
        self.owner.as_deref().unwrap_or("Unassigned")
    }

    /// A blank record for building fixtures.
    pub fn new(id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            id: id.into(),
            date,
            title: None,
            owner: None,
            desk: None,
            client: ClientInfo::default(),
            now: ScoringField::default(),
            next: ScoringField::default(),
            measure: ScoringField::default(),
            blocker: ScoringField::default(),
            fit: ScoringField::default(),
            notes_url: None,
            qualified: false,
            score: 0,
        }
    }

    pub fn with_client(mut self, name: impl Into<String>) -> Self {
        self.client.name = Some(name.into());
        self
    }

    pub fn with_score(mut self, score: u8, qualified: bool) -> Self {
        self.score = score.min(MAX_SCORE);
        self.qualified = qualified;
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_evidence(mut self, kind: FieldKind, qualified: bool, evidence: &str) -> Self {
        let field = self.field_mut(kind);
        field.qualified = qualified;
        field.evidence = Some(evidence.to_string());
        self
    }
}
