//! The session descriptor: the rotating payload shown as a QR code.
//!
//! A descriptor is never persisted. The issuer rebuilds it on every rotation
//! tick with a fresh `issued_at_epoch_ms`; every other field stays pinned to
//! the selected subject and the day the presentation started.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{date::SessionDate, subject::Subject};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDescriptor {
  pub subject_id:         String,
  /// Denormalised display label for the scanning side.
  pub subject_name:       String,
  pub session_date:       SessionDate,
  pub issued_at_epoch_ms: i64,
  pub department_scope:   String,
  /// Literal marker carried for the scanning side; not a security property.
  pub valid:              bool,
}

impl SessionDescriptor {
  /// Stamp a descriptor for `subject` issued at `issued_at`.
  pub fn issue(
    subject: &Subject,
    department_scope: &str,
    session_date: SessionDate,
    issued_at: DateTime<Utc>,
  ) -> Self {
    Self {
      subject_id: subject.id.clone(),
      subject_name: subject.name.clone(),
      session_date,
      issued_at_epoch_ms: issued_at.timestamp_millis(),
      department_scope: department_scope.to_owned(),
      valid: true,
    }
  }

  /// The same descriptor re-stamped at a later instant.
  pub fn rotated(&self, issued_at: DateTime<Utc>) -> Self {
    Self {
      issued_at_epoch_ms: issued_at.timestamp_millis(),
      ..self.clone()
    }
  }
}
