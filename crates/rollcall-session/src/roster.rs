//! A live, read-only roster of one subject on one day.
//!
//! [`LiveRoster::open`] subscribes to the ledger's change feed *before*
//! loading the snapshot so no record committed in between is missed; records
//! that show up in both are deduplicated by composite key. A background pump
//! folds feed events into a watch channel. If the pump falls behind the feed
//! it reloads the whole snapshot instead of guessing what it lost.

use std::sync::Arc;

use rollcall_core::{date::SessionDate, record::AttendanceRecord, store::AttendanceLedger};
use tokio::{
  sync::{broadcast, watch},
  task::JoinHandle,
};

use crate::{Error, Result};

pub struct LiveRoster {
  subject_id: String,
  date:       SessionDate,
  rx:         watch::Receiver<Vec<AttendanceRecord>>,
  pump:       JoinHandle<()>,
}

impl LiveRoster {
  pub async fn open<L: AttendanceLedger + 'static>(
    ledger: Arc<L>,
    subject_id: impl Into<String>,
    date: SessionDate,
  ) -> Result<Self> {
    let subject_id = subject_id.into();

    let feed = ledger.subscribe();
    let initial = ledger
      .records_for_session(&subject_id, date)
      .await
      .map_err(Error::ledger)?;

    let (tx, rx) = watch::channel(initial);
    let pump = tokio::spawn(follow_feed(ledger, subject_id.clone(), date, feed, tx));

    tracing::debug!(%subject_id, %date, "live roster opened");
    Ok(Self {
      subject_id,
      date,
      rx,
      pump,
    })
  }

  pub fn subject_id(&self) -> &str { &self.subject_id }

  pub fn date(&self) -> SessionDate { self.date }

  /// The current roster, newest first.
  pub fn snapshot(&self) -> Vec<AttendanceRecord> { self.rx.borrow().clone() }

  /// Wait for the roster to change. Returns `false` once the pump has ended.
  pub async fn changed(&mut self) -> bool { self.rx.changed().await.is_ok() }

  /// An independent receiver over the same roster.
  pub fn watch(&self) -> watch::Receiver<Vec<AttendanceRecord>> { self.rx.clone() }

  /// Stop following the ledger.
  pub fn close(self) {}
}

impl Drop for LiveRoster {
  fn drop(&mut self) {
    self.pump.abort();
    tracing::debug!(subject_id = %self.subject_id, date = %self.date, "live roster closed");
  }
}

async fn follow_feed<L: AttendanceLedger>(
  ledger: Arc<L>,
  subject_id: String,
  date: SessionDate,
  mut feed: broadcast::Receiver<AttendanceRecord>,
  tx: watch::Sender<Vec<AttendanceRecord>>,
) {
  loop {
    match feed.recv().await {
      Ok(record) => {
        if record.subject_id != subject_id || record.session_date != date {
          continue;
        }
        tx.send_if_modified(|rows| merge(rows, record));
      }
      Err(broadcast::error::RecvError::Lagged(missed)) => {
        tracing::warn!(%subject_id, %date, missed, "roster feed lagged, reloading");
        match ledger.records_for_session(&subject_id, date).await {
          Ok(rows) => {
            tx.send_replace(rows);
          }
          Err(e) => tracing::error!(%subject_id, %date, error = %e, "roster reload failed"),
        }
      }
      Err(broadcast::error::RecvError::Closed) => break,
    }
  }
}

/// Insert `record` keeping newest-first order. `false` if its key is known.
fn merge(rows: &mut Vec<AttendanceRecord>, record: AttendanceRecord) -> bool {
  let key = record.key();
  if rows.iter().any(|r| r.key() == key) {
    return false;
  }
  let at = rows
    .iter()
    .position(|r| r.recorded_at < record.recorded_at)
    .unwrap_or(rows.len());
  rows.insert(at, record);
  true
}
