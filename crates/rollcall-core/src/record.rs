//! Attendance records, one per student per subject per day.
//!
//! Records are immutable. The composite key is the only idempotency
//! mechanism: a store holds at most one record per key, and a second write
//! for the same key is reported rather than applied.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{date::SessionDate, descriptor::SessionDescriptor};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Outcome stored on a record. Only presence is modelled.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
)]
pub enum AttendanceStatus {
  #[default]
  Present,
}

// ─── Composite key ───────────────────────────────────────────────────────────

/// `<subject_id>-<DD-MM-YYYY>-<student_uid>`, e.g. `S_id-03-03-2025-u123`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(String);

impl CompositeKey {
  pub fn new(subject_id: &str, date: SessionDate, student_uid: &str) -> Self {
    Self(format!("{subject_id}-{}-{student_uid}", date.key_segment()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CompositeKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Student identity ────────────────────────────────────────────────────────

/// An already-authenticated student, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudentIdentity {
  pub uid:          String,
  pub display_name: String,
}

impl StudentIdentity {
  pub fn new(uid: impl Into<String>, display_name: impl Into<String>) -> Self {
    Self {
      uid:          uid.into(),
      display_name: display_name.into(),
    }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
  pub student_uid:          String,
  pub student_display_name: String,
  pub subject_id:           String,
  pub subject_name:         String,
  pub session_date:         SessionDate,
  /// Store-assigned; strictly increasing across writes to one store.
  pub recorded_at:          DateTime<Utc>,
  pub status:               AttendanceStatus,
}

impl AttendanceRecord {
  pub fn key(&self) -> CompositeKey {
    CompositeKey::new(&self.subject_id, self.session_date, &self.student_uid)
  }
}

// ─── NewAttendance ───────────────────────────────────────────────────────────

/// Input to [`crate::store::AttendanceLedger::insert_if_absent`].
/// `recorded_at` and `status` are set by the store.
#[derive(Debug, Clone)]
pub struct NewAttendance {
  pub student:      StudentIdentity,
  pub subject_id:   String,
  pub subject_name: String,
  pub session_date: SessionDate,
}

impl NewAttendance {
  /// Attendance for `student` against the session a scanned descriptor names.
  pub fn from_descriptor(
    descriptor: &SessionDescriptor,
    student: StudentIdentity,
  ) -> Self {
    Self {
      student,
      subject_id: descriptor.subject_id.clone(),
      subject_name: descriptor.subject_name.clone(),
      session_date: descriptor.session_date,
    }
  }

  pub fn key(&self) -> CompositeKey {
    CompositeKey::new(&self.subject_id, self.session_date, &self.student.uid)
  }
}

// ─── Insert outcome ──────────────────────────────────────────────────────────

/// Result of a conditional create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertOutcome {
  /// No record existed for the key; this one was written.
  Created(AttendanceRecord),
  /// A record already existed and was left untouched.
  AlreadyPresent(AttendanceRecord),
}

impl InsertOutcome {
  pub fn record(&self) -> &AttendanceRecord {
    match self {
      Self::Created(r) | Self::AlreadyPresent(r) => r,
    }
  }

  pub fn is_created(&self) -> bool { matches!(self, Self::Created(_)) }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr;

  use super::*;

  #[test]
  fn composite_key_hyphenates_the_date() {
    let key = CompositeKey::new(
      "S_id",
      SessionDate::from_dmy(3, 3, 2025).unwrap(),
      "u123",
    );
    assert_eq!(key.as_str(), "S_id-03-03-2025-u123");
  }

  #[test]
  fn new_attendance_and_record_agree_on_key() {
    let date = SessionDate::from_dmy(3, 3, 2025).unwrap();
    let input = NewAttendance {
      student:      StudentIdentity::new("u123", "Asha"),
      subject_id:   "S_id".into(),
      subject_name: "Data Structures".into(),
      session_date: date,
    };
    let record = AttendanceRecord {
      student_uid:          "u123".into(),
      student_display_name: "Asha".into(),
      subject_id:           "S_id".into(),
      subject_name:         "Data Structures".into(),
      session_date:         date,
      recorded_at:          Utc::now(),
      status:               AttendanceStatus::Present,
    };
    assert_eq!(input.key(), record.key());
  }

  #[test]
  fn status_round_trips_through_its_name() {
    assert_eq!(AttendanceStatus::Present.to_string(), "Present");
    assert_eq!(
      AttendanceStatus::from_str("Present").unwrap(),
      AttendanceStatus::Present
    );
    assert!(AttendanceStatus::from_str("Absent").is_err());
  }
}
