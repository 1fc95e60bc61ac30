//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! precision so that lexical order in SQL equals chronological order. Session
//! dates are stored in their `DD/MM/YYYY` wire form.

use std::str::FromStr;

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use rollcall_core::{
  date::SessionDate,
  record::{AttendanceRecord, AttendanceStatus},
  subject::Subject,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// The timestamp for the next write: now, or one microsecond past the
/// latest stored stamp if the clock has not moved beyond it.
pub fn next_stamp(latest: Option<&str>) -> DateTime<Utc> {
  let now = Utc::now().trunc_subsecs(6);
  match latest.and_then(|s| decode_dt(s).ok()) {
    Some(last) if now <= last => last + Duration::microseconds(1),
    _ => now,
  }
}

// ─── AttendanceStatus ────────────────────────────────────────────────────────

pub fn encode_status(s: AttendanceStatus) -> &'static str {
  match s {
    AttendanceStatus::Present => "Present",
  }
}

pub fn decode_status(s: &str) -> Result<AttendanceStatus> {
  AttendanceStatus::from_str(s).map_err(|_| Error::UnknownStatus(s.to_owned()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list shared by every attendance `SELECT`.
pub const RECORD_COLUMNS: &str = "student_uid, student_name, subject_id, \
  subject_name, session_date, recorded_at, status";

/// Raw strings read directly from an `attendance` row.
pub struct RawRecord {
  pub student_uid:  String,
  pub student_name: String,
  pub subject_id:   String,
  pub subject_name: String,
  pub session_date: String,
  pub recorded_at:  String,
  pub status:       String,
}

impl RawRecord {
  /// Map a row selected with [`RECORD_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_uid:  row.get(0)?,
      student_name: row.get(1)?,
      subject_id:   row.get(2)?,
      subject_name: row.get(3)?,
      session_date: row.get(4)?,
      recorded_at:  row.get(5)?,
      status:       row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<AttendanceRecord> {
    Ok(AttendanceRecord {
      student_uid:          self.student_uid,
      student_display_name: self.student_name,
      subject_id:           self.subject_id,
      subject_name:         self.subject_name,
      session_date:         SessionDate::parse(&self.session_date)?,
      recorded_at:          decode_dt(&self.recorded_at)?,
      status:               decode_status(&self.status)?,
    })
  }
}

/// Raw values read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id: String,
  pub name:       String,
  pub department: String,
  pub year:       i64,
}

impl RawSubject {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id: row.get(0)?,
      name:       row.get(1)?,
      department: row.get(2)?,
      year:       row.get(3)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      id:         self.subject_id,
      name:       self.name,
      department: self.department,
      year:       u8::try_from(self.year)
        .map_err(|_| Error::YearOutOfRange(self.year))?,
    })
  }
}
