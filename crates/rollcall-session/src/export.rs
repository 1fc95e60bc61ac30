//! Flat attendance reports for download.
//!
//! Every record of a subject, across all days, becomes one `Name, ID, Date,
//! Time` row. Times are rendered in the host's local timezone.

use chrono::{Local, TimeZone};
use rollcall_core::{record::AttendanceRecord, store::AttendanceLedger, subject::Subject};
use serde::Serialize;

use crate::{Error, Result};

pub const CSV_HEADER: &str = "Name,ID,Date,Time";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
  pub name: String,
  pub id:   String,
  pub date: String,
  pub time: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceReport {
  pub file_name: String,
  pub rows:      Vec<ExportRow>,
}

impl AttendanceReport {
  /// Flatten `records` (ledger order) with times rendered in `tz`.
  pub fn from_records<Tz: TimeZone>(
    subject: &Subject,
    records: &[AttendanceRecord],
    tz: &Tz,
  ) -> Self
  where
    Tz::Offset: std::fmt::Display,
  {
    let rows = records
      .iter()
      .map(|r| ExportRow {
        name: r.student_display_name.clone(),
        id:   r.student_uid.clone(),
        date: r.session_date.to_string(),
        time: r
          .recorded_at
          .with_timezone(tz)
          .format("%H:%M:%S")
          .to_string(),
      })
      .collect();

    Self {
      file_name: file_name_for(subject),
      rows,
    }
  }

  pub fn to_csv(&self) -> String {
    let mut csv = String::from(CSV_HEADER);
    csv.push('\n');
    for row in &self.rows {
      csv.push_str(&format!(
        "{},{},{},{}\n",
        esc(&row.name),
        esc(&row.id),
        esc(&row.date),
        esc(&row.time)
      ));
    }
    csv
  }
}

/// Build the report for every record of `subject`.
pub async fn export_subject<L: AttendanceLedger>(
  ledger: &L,
  subject: &Subject,
) -> Result<AttendanceReport> {
  let records = ledger
    .records_for_subject(&subject.id)
    .await
    .map_err(Error::ledger)?;

  tracing::info!(subject_id = %subject.id, rows = records.len(), "exporting attendance");
  Ok(AttendanceReport::from_records(subject, &records, &Local))
}

fn esc(s: &str) -> String {
  if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
    format!("\"{}\"", s.replace('"', "\"\""))
  } else {
    s.to_string()
  }
}

/// `<subject name>.csv` with path and header-hostile characters removed.
fn file_name_for(subject: &Subject) -> String {
  let cleaned: String = subject
    .name
    .chars()
    .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.'))
    .collect();
  let stem = cleaned.trim().trim_matches('.');
  if stem.is_empty() {
    format!("{}.csv", subject.id)
  } else {
    format!("{stem}.csv")
  }
}
