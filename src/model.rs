use std::fmt;

use serde::{Deserialize, Serialize};
use time::format_description::BorrowedFormatItem;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

// Capture timestamps double as payload directory names, so they carry no
// sub-second part and no characters that are unsafe in file names.
pub const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]-[hour]-[minute]-[second]");
pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] =
    time::macros::format_description!("[year]-[month]-[day]");

time::serde::format_description!(
    timestamp_format,
    PrimitiveDateTime,
    "[year]-[month]-[day]-[hour]-[minute]-[second]"
);
time::serde::format_description!(date_format, Date, "[year]-[month]-[day]");

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RevisionId(pub u64);

impl RevisionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded snapshot of a document: the metadata row plus, when loaded,
/// the full-content payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Revision {
    pub id: RevisionId,
    pub document_key: String,
    #[serde(with = "timestamp_format")]
    pub captured_at: PrimitiveDateTime,
    #[serde(with = "date_format")]
    pub scheduled_date: Date,
    pub completions_done: u32,
    #[serde(default)]
    pub hidden: bool,

    // Payloads live in per-revision files, never in the metadata table.
    #[serde(skip)]
    pub payload: Option<RevisionPayload>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RevisionPayload {
    pub content: String,
    /// 0-based indices of lines in `content` that are new or modified
    /// relative to the prior revision.
    pub changelist: Vec<usize>,
}

/// Input to [`crate::store::RevisionStore::create_revision`]. The store
/// assigns the id; new revisions always start unhidden with zero completions.
#[derive(Clone, Debug)]
pub struct NewRevision {
    pub document_key: String,
    pub captured_at: PrimitiveDateTime,
    pub scheduled_date: Date,
    pub content: String,
    pub changelist: Vec<usize>,
}

pub fn format_timestamp(timestamp: PrimitiveDateTime) -> Result<String, time::error::Format> {
    timestamp.format(TIMESTAMP_FORMAT)
}

pub fn format_date(date: Date) -> Result<String, time::error::Format> {
    date.format(DATE_FORMAT)
}

/// Current UTC time truncated to whole seconds, so an in-memory capture
/// timestamp always matches its persisted form.
pub fn now_timestamp() -> PrimitiveDateTime {
    let now = OffsetDateTime::now_utc();
    let time = now.time().replace_nanosecond(0).unwrap_or(now.time());
    PrimitiveDateTime::new(now.date(), time)
}

pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips_through_fixed_format() {
        let ts = now_timestamp();
        let formatted = format_timestamp(ts).unwrap();
        let parsed = PrimitiveDateTime::parse(&formatted, TIMESTAMP_FORMAT).unwrap();
        assert_eq!(parsed, ts);
    }

    #[test]
    fn capture_timestamps_have_no_subsecond_part() {
        assert_eq!(now_timestamp().nanosecond(), 0);
    }
}
