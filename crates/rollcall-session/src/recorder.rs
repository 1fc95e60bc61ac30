//! The attendance recorder turns one scanned payload into at most one
//! attendance record.
//!
//! 1. Decode the payload (verifying its signature when a key is configured).
//! 2. Reject it unless its session date is the recorder's own current day.
//! 3. Conditionally create the record at its composite key.
//!
//! [`Scanner`] layers the camera arming rules on top: local validation
//! failures re-arm immediately, everything that reached the ledger leaves the
//! scanner disarmed until the student asks to scan again.

use std::sync::Arc;

use rollcall_core::{
  codec::{self, DecodeError, PayloadKey},
  date::SessionDate,
  descriptor::SessionDescriptor,
  record::{AttendanceRecord, InsertOutcome, NewAttendance, StudentIdentity},
  store::AttendanceLedger,
};
use thiserror::Error;

use crate::{Clock, SystemClock};

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ScanError {
  #[error("invalid payload: {0}")]
  Decode(#[from] DecodeError),

  #[error("session date {payload_date} does not match today ({today})")]
  ExpiredSession {
    payload_date: SessionDate,
    today:        SessionDate,
  },

  #[error("attendance already recorded for {}", .0.key())]
  DuplicateAttendance(Box<AttendanceRecord>),

  #[error("ledger unavailable: {0}")]
  LedgerUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("scanner is disarmed")]
  ScannerDisarmed,
}

impl ScanError {
  /// Whether the scanner should immediately listen for another code.
  pub fn rearms(&self) -> bool {
    matches!(self, Self::Decode(_) | Self::ExpiredSession { .. })
  }

  /// Text shown to the student.
  pub fn user_message(&self) -> String {
    match self {
      Self::Decode(_) => "Invalid QR code. Please scan the code on screen.".to_owned(),
      Self::ExpiredSession { .. } => {
        "This QR code has expired. Please scan the current code.".to_owned()
      }
      Self::DuplicateAttendance(existing) => format!(
        "Attendance already marked for {} today.",
        display_subject(existing)
      ),
      Self::LedgerUnavailable(_) => {
        "Could not record attendance. Please try again.".to_owned()
      }
      Self::ScannerDisarmed => "Scanner is paused. Start a new scan first.".to_owned(),
    }
  }
}

fn display_subject(record: &AttendanceRecord) -> &str {
  if record.subject_name.is_empty() {
    &record.subject_id
  } else {
    &record.subject_name
  }
}

// ─── Recorder ────────────────────────────────────────────────────────────────

/// A successfully committed scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanAccepted {
  pub record:  AttendanceRecord,
  /// Text shown to the student.
  pub message: String,
}

pub struct AttendanceRecorder<L, C = SystemClock> {
  ledger:      Arc<L>,
  clock:       Arc<C>,
  signing_key: Option<PayloadKey>,
}

impl<L: AttendanceLedger> AttendanceRecorder<L, SystemClock> {
  pub fn new(ledger: Arc<L>) -> Self { Self::with_clock(ledger, Arc::new(SystemClock)) }
}

impl<L: AttendanceLedger, C: Clock> AttendanceRecorder<L, C> {
  pub fn with_clock(ledger: Arc<L>, clock: Arc<C>) -> Self {
    Self {
      ledger,
      clock,
      signing_key: None,
    }
  }

  /// Require payloads signed with `key`. `None` accepts unsigned payloads.
  pub fn with_signing_key(mut self, key: Option<PayloadKey>) -> Self {
    self.signing_key = key;
    self
  }

  /// Local checks only: decode and date freshness. Never touches the ledger.
  pub fn validate(&self, raw: &str) -> Result<SessionDescriptor, ScanError> {
    let descriptor = match &self.signing_key {
      Some(key) => codec::decode_verified(raw, key)?,
      None => codec::decode(raw)?,
    };

    let today = self.clock.today();
    if descriptor.session_date != today {
      return Err(ScanError::ExpiredSession {
        payload_date: descriptor.session_date,
        today,
      });
    }
    Ok(descriptor)
  }

  /// Validate `raw` and commit attendance for `student`.
  pub async fn record(
    &self,
    raw: &str,
    student: &StudentIdentity,
  ) -> Result<ScanAccepted, ScanError> {
    let descriptor = match self.validate(raw) {
      Ok(d) => d,
      Err(e) => {
        tracing::debug!(student_uid = %student.uid, error = %e, "scan rejected");
        return Err(e);
      }
    };

    let input = NewAttendance::from_descriptor(&descriptor, student.clone());
    let key = input.key();

    match self.ledger.insert_if_absent(input).await {
      Ok(InsertOutcome::Created(record)) => {
        tracing::info!(%key, "attendance marked");
        let message = format!("Attendance marked for {}.", display_subject(&record));
        Ok(ScanAccepted { record, message })
      }
      Ok(InsertOutcome::AlreadyPresent(existing)) => {
        tracing::info!(%key, "duplicate attendance scan");
        Err(ScanError::DuplicateAttendance(Box::new(existing)))
      }
      Err(e) => {
        tracing::warn!(%key, error = %e, "ledger write failed");
        Err(ScanError::LedgerUnavailable(Box::new(e)))
      }
    }
  }
}

// ─── Scanner ─────────────────────────────────────────────────────────────────

/// One student's scanning session.
///
/// Starts armed. Decode and expiry failures re-arm at once; a success, a
/// duplicate or a ledger failure leaves the scanner disarmed until
/// [`Scanner::rearm`].
pub struct Scanner<L, C = SystemClock> {
  recorder: Arc<AttendanceRecorder<L, C>>,
  student:  StudentIdentity,
  armed:    bool,
}

impl<L: AttendanceLedger, C: Clock> Scanner<L, C> {
  pub fn new(recorder: Arc<AttendanceRecorder<L, C>>, student: StudentIdentity) -> Self {
    Self {
      recorder,
      student,
      armed: true,
    }
  }

  pub fn is_armed(&self) -> bool { self.armed }

  pub fn rearm(&mut self) { self.armed = true; }

  /// Handle one decoded camera frame.
  pub async fn submit(&mut self, raw: &str) -> Result<ScanAccepted, ScanError> {
    if !self.armed {
      return Err(ScanError::ScannerDisarmed);
    }
    self.armed = false;

    let result = self.recorder.record(raw, &self.student).await;
    if let Err(e) = &result
      && e.rearms()
    {
      self.armed = true;
    }
    result
  }
}
