//! Meeting evidence model.
//!
//! A [`MeetingRecord`] is one scored meeting as fetched from the evidence
//! store. Records are immutable once fetched and owned by a single
//! report-generation run.

mod record;
mod window;

pub use record::{
    ClientInfo, FieldKind, MeetingRecord, ScoringField, MAX_SCORE, QUALIFIED_THRESHOLD,
};
pub use window::DateWindow;
