//! [`SqliteStore`], the SQLite implementation of [`AttendanceLedger`] and
//! [`SubjectDirectory`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tokio::sync::broadcast;

use rollcall_core::{
  date::SessionDate,
  record::{
    AttendanceRecord, AttendanceStatus, CompositeKey, InsertOutcome, NewAttendance,
  },
  store::{AttendanceLedger, SubjectDirectory},
  subject::{NewSubject, Subject},
};

use crate::{
  encode::{encode_dt, encode_status, next_stamp, RawRecord, RawSubject, RECORD_COLUMNS},
  schema::SCHEMA,
  Result,
};

/// Buffered change-feed events per subscriber before it starts lagging.
const FEED_CAPACITY: usize = 256;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Rollcall store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and the change feed are
/// reference-counted, so clones share one ledger.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
  feed: broadcast::Sender<AttendanceRecord>,
}

/// What the conditional insert found, before decoding.
enum Inserted {
  Created(AttendanceRecord),
  Existing(RawRecord),
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::with_connection(conn).await
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::with_connection(conn).await
  }

  async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let (feed, _) = broadcast::channel(FEED_CAPACITY);
    let store = Self { conn, feed };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn query_records(
    &self,
    where_clause: &'static str,
    params: Vec<String>,
  ) -> Result<Vec<AttendanceRecord>> {
    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {RECORD_COLUMNS} FROM attendance
           WHERE {where_clause}
           ORDER BY recorded_at DESC, rowid DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}

// ─── AttendanceLedger impl ───────────────────────────────────────────────────

impl AttendanceLedger for SqliteStore {
  type Error = crate::Error;

  async fn get_record(&self, key: &CompositeKey) -> Result<Option<AttendanceRecord>> {
    let key_str = key.as_str().to_owned();

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE record_key = ?1"),
            rusqlite::params![key_str],
            RawRecord::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn insert_if_absent(&self, input: NewAttendance) -> Result<InsertOutcome> {
    let key_str = input.key().as_str().to_owned();
    let feed    = self.feed.clone();

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let latest: Option<String> = tx.query_row(
          "SELECT MAX(recorded_at) FROM attendance",
          [],
          |r| r.get(0),
        )?;
        let recorded_at = next_stamp(latest.as_deref());

        // A single conditional create: the primary key decides, not a prior read.
        let changed = tx.execute(
          "INSERT INTO attendance (
             record_key, student_uid, student_name, subject_id,
             subject_name, session_date, recorded_at, status
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
           ON CONFLICT(record_key) DO NOTHING",
          rusqlite::params![
            key_str,
            input.student.uid,
            input.student.display_name,
            input.subject_id,
            input.subject_name,
            input.session_date.to_string(),
            encode_dt(recorded_at),
            encode_status(AttendanceStatus::Present),
          ],
        )?;

        if changed == 0 {
          let existing = tx.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM attendance WHERE record_key = ?1"),
            rusqlite::params![key_str],
            RawRecord::from_row,
          )?;
          tx.commit()?;
          return Ok(Inserted::Existing(existing));
        }

        tx.commit()?;

        let record = AttendanceRecord {
          student_uid:          input.student.uid,
          student_display_name: input.student.display_name,
          subject_id:           input.subject_id,
          subject_name:         input.subject_name,
          session_date:         input.session_date,
          recorded_at,
          status:               AttendanceStatus::Present,
        };
        // Published from the connection thread so subscribers observe commit
        // order. No subscribers is not an error.
        let _ = feed.send(record.clone());
        Ok(Inserted::Created(record))
      })
      .await?;

    match inserted {
      Inserted::Created(record) => {
        tracing::debug!(key = %record.key(), "attendance recorded");
        Ok(InsertOutcome::Created(record))
      }
      Inserted::Existing(raw) => Ok(InsertOutcome::AlreadyPresent(raw.into_record()?)),
    }
  }

  async fn records_for_session(
    &self,
    subject_id: &str,
    date:       SessionDate,
  ) -> Result<Vec<AttendanceRecord>> {
    self
      .query_records(
        "subject_id = ?1 AND session_date = ?2",
        vec![subject_id.to_owned(), date.to_string()],
      )
      .await
  }

  async fn records_for_subject(&self, subject_id: &str) -> Result<Vec<AttendanceRecord>> {
    self
      .query_records("subject_id = ?1", vec![subject_id.to_owned()])
      .await
  }

  fn subscribe(&self) -> broadcast::Receiver<AttendanceRecord> { self.feed.subscribe() }
}

// ─── SubjectDirectory impl ───────────────────────────────────────────────────

impl SubjectDirectory for SqliteStore {
  type Error = crate::Error;

  async fn subjects_for(&self, department: &str, year: u8) -> Result<Vec<Subject>> {
    let department = department.to_owned();

    let raws: Vec<RawSubject> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT subject_id, name, department, year FROM subjects
           WHERE department = ?1 AND year = ?2
           ORDER BY name, subject_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![department, year], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn get_subject(&self, id: &str) -> Result<Option<Subject>> {
    let id = id.to_owned();

    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT subject_id, name, department, year FROM subjects WHERE subject_id = ?1",
            rusqlite::params![id],
            RawSubject::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn add_subject(&self, input: NewSubject) -> Result<Option<Subject>> {
    let subject = Subject::from(input);
    let row     = subject.clone();

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO subjects (subject_id, name, department, year) VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(subject_id) DO NOTHING",
          rusqlite::params![row.id, row.name, row.department, row.year],
        )?)
      })
      .await?;

    if changed == 0 {
      tracing::debug!(subject_id = %subject.id, "subject id already taken");
      return Ok(None);
    }
    Ok(Some(subject))
  }
}
