//! Storage traits and supporting types.
//!
//! Backends (e.g. `rollcall-store-sqlite`) implement both traits. The issuer,
//! recorder and roster depend on these abstractions, not on any concrete
//! backend.

use std::future::Future;

use tokio::sync::broadcast;

use crate::{
  date::SessionDate,
  record::{AttendanceRecord, CompositeKey, InsertOutcome, NewAttendance},
  subject::{NewSubject, Subject},
};

// ─── Ledger ──────────────────────────────────────────────────────────────────

/// The durable attendance ledger.
///
/// Records are append-only. The only write is a conditional create keyed on
/// the record's [`CompositeKey`], which must be atomic: two concurrent
/// inserts for the same key yield exactly one `Created`.
pub trait AttendanceLedger: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Point lookup by composite key.
  fn get_record<'a>(
    &'a self,
    key: &'a CompositeKey,
  ) -> impl Future<Output = Result<Option<AttendanceRecord>, Self::Error>> + Send + 'a;

  /// Create the record unless one already exists for its key. The
  /// `recorded_at` timestamp is set by the store.
  fn insert_if_absent(
    &self,
    input: NewAttendance,
  ) -> impl Future<Output = Result<InsertOutcome, Self::Error>> + Send + '_;

  /// All records for one subject on one day, newest first.
  fn records_for_session<'a>(
    &'a self,
    subject_id: &'a str,
    date: SessionDate,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + 'a;

  /// All records for one subject across every day, newest first.
  fn records_for_subject<'a>(
    &'a self,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Vec<AttendanceRecord>, Self::Error>> + Send + 'a;

  /// Change feed of newly created records, in commit order for this store.
  fn subscribe(&self) -> broadcast::Receiver<AttendanceRecord>;
}

// ─── Subject directory ───────────────────────────────────────────────────────

/// Read access to the college's subject list.
pub trait SubjectDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Subjects taught in `department` to students in `year`, ordered by name.
  fn subjects_for<'a>(
    &'a self,
    department: &'a str,
    year: u8,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + 'a;

  /// Retrieve a subject by id. Returns `None` if not found.
  fn get_subject<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + 'a;

  /// Persist a subject unless its id is taken. Returns `None` when a subject
  /// with that id already exists; the existing row is left untouched. Used
  /// for seeding; the directory is otherwise owned by the wider college
  /// system.
  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;
}
