//! The session issuer drives the rotating QR display for one subject.
//!
//! ```text
//! Idle ──select_subject──▶ Selecting ──start_presenting──▶ Presenting
//!  ▲                          │  ▲                              │
//!  └──clear_subject/year──────┘  └─────────stop_presenting──────┘
//! ```
//!
//! The department is fixed when the issuer is built; the operator picks a
//! class year (which loads the subject picker) and a subject. While
//! presenting, a descriptor is issued immediately and then re-issued on every
//! rotation tick with a fresh `issued_at_epoch_ms`; subject and date stay
//! pinned to what was selected when the presentation started. The issuer
//! never writes to the ledger.

use std::{sync::Arc, time::Duration};

use rollcall_core::{
  codec::{self, PayloadKey},
  descriptor::SessionDescriptor,
  store::SubjectDirectory,
  subject::Subject,
};
use serde::Serialize;
use tokio::{
  sync::watch,
  task::JoinHandle,
  time::{Instant, MissedTickBehavior},
};
use uuid::Uuid;

use crate::{Clock, Error, Result, SystemClock};

/// Rotation period of the reference deployment.
pub const DEFAULT_ROTATION_INTERVAL: Duration = Duration::from_millis(3000);

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct IssuerConfig {
  /// Department the operator works in; scopes the subject picker and is
  /// stamped into every descriptor.
  pub department:        String,
  pub rotation_interval: Duration,
  /// When set, payloads carry an HMAC signature.
  pub signing_key:       Option<PayloadKey>,
}

impl IssuerConfig {
  pub fn new(department: impl Into<String>) -> Self {
    Self {
      department:        department.into(),
      rotation_interval: DEFAULT_ROTATION_INTERVAL,
      signing_key:       None,
    }
  }
}

// ─── Presentation ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerPhase {
  Idle,
  Selecting,
  Presenting,
}

/// The payload currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Presentation {
  /// Identifies one start..stop run.
  pub presentation_id: Uuid,
  /// 0 for the payload issued on entry, then +1 per tick.
  pub rotation:        u64,
  pub descriptor:      SessionDescriptor,
  /// The encoded descriptor; this is what goes into the QR code.
  pub payload:         String,
  /// The pinned session date is no longer today; scanners will reject this
  /// payload until the presentation is restarted.
  pub session_expired: bool,
}

fn encode_payload(descriptor: &SessionDescriptor, key: Option<&PayloadKey>) -> String {
  match key {
    Some(key) => codec::encode_signed(descriptor, key),
    None => codec::encode(descriptor),
  }
}

// ─── Rotation task ───────────────────────────────────────────────────────────

/// Owns the periodic re-issue task. Dropping it cancels the task.
struct RotationTask {
  presentation_id: Uuid,
  handle:          JoinHandle<()>,
}

impl RotationTask {
  fn spawn<C: Clock>(
    first: Presentation,
    period: Duration,
    clock: Arc<C>,
    key: Option<PayloadKey>,
    tx: Arc<watch::Sender<Option<Presentation>>>,
  ) -> Self {
    let presentation_id = first.presentation_id;

    let handle = tokio::spawn(async move {
      let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
      ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
      let mut current = first;

      loop {
        ticker.tick().await;

        let descriptor = current.descriptor.rotated(clock.now());
        let session_expired = clock.today() != descriptor.session_date;
        if session_expired && !current.session_expired {
          tracing::warn!(
            %presentation_id,
            session_date = %descriptor.session_date,
            today = %clock.today(),
            "session date has passed; restart the presentation to accept scans"
          );
        }
        current = Presentation {
          presentation_id,
          rotation: current.rotation + 1,
          payload: encode_payload(&descriptor, key.as_ref()),
          descriptor,
          session_expired,
        };

        // Only overwrite our own presentation: after a stop (or a restart)
        // a late tick from this task must not resurrect a stale payload.
        let next = current.clone();
        let still_ours = tx.send_if_modified(|slot| match slot {
          Some(p) if p.presentation_id == presentation_id => {
            *slot = Some(next);
            true
          }
          _ => false,
        });
        if !still_ours {
          break;
        }
        tracing::debug!(
          %presentation_id,
          rotation = current.rotation,
          "rotated session payload"
        );
      }
    });

    Self { presentation_id, handle }
  }
}

impl Drop for RotationTask {
  fn drop(&mut self) { self.handle.abort(); }
}

// ─── Issuer ──────────────────────────────────────────────────────────────────

pub struct SessionIssuer<D, C = SystemClock> {
  directory: Arc<D>,
  clock:     Arc<C>,
  config:    IssuerConfig,
  year:      Option<u8>,
  subjects:  Vec<Subject>,
  selected:  Option<Subject>,
  rotation:  Option<RotationTask>,
  tx:        Arc<watch::Sender<Option<Presentation>>>,
}

impl<D: SubjectDirectory> SessionIssuer<D, SystemClock> {
  pub fn new(directory: Arc<D>, config: IssuerConfig) -> Self {
    Self::with_clock(directory, Arc::new(SystemClock), config)
  }
}

impl<D: SubjectDirectory, C: Clock> SessionIssuer<D, C> {
  pub fn with_clock(directory: Arc<D>, clock: Arc<C>, config: IssuerConfig) -> Self {
    let (tx, _) = watch::channel(None);
    Self {
      directory,
      clock,
      config,
      year: None,
      subjects: Vec::new(),
      selected: None,
      rotation: None,
      tx: Arc::new(tx),
    }
  }

  pub fn config(&self) -> &IssuerConfig { &self.config }

  pub fn phase(&self) -> IssuerPhase {
    if self.rotation.is_some() {
      IssuerPhase::Presenting
    } else if self.selected.is_some() {
      IssuerPhase::Selecting
    } else {
      IssuerPhase::Idle
    }
  }

  pub fn year(&self) -> Option<u8> { self.year }

  /// The subject picker for the loaded year.
  pub fn subjects(&self) -> &[Subject] { &self.subjects }

  pub fn selected(&self) -> Option<&Subject> { self.selected.as_ref() }

  // ── Picker ──────────────────────────────────────────────────────────────

  async fn fetch_subjects(&self, year: u8) -> Result<Vec<Subject>> {
    if self.rotation.is_some() {
      return Err(Error::Presenting);
    }
    self
      .directory
      .subjects_for(&self.config.department, year)
      .await
      .map_err(Error::directory)
  }

  /// Load the subject picker for `year` within the configured department.
  ///
  /// A previously selected subject survives only if it is still offered.
  pub async fn load_subjects(&mut self, year: u8) -> Result<&[Subject]> {
    let subjects = self.fetch_subjects(year).await?;

    if let Some(sel) = &self.selected
      && !subjects.iter().any(|s| s.id == sel.id)
    {
      self.selected = None;
    }
    self.year = Some(year);
    self.subjects = subjects;
    tracing::debug!(
      department = %self.config.department,
      year,
      count = self.subjects.len(),
      "loaded subject picker"
    );
    Ok(&self.subjects)
  }

  /// Choose a subject from the loaded picker; moves to `Selecting`.
  pub fn select_subject(&mut self, subject_id: &str) -> Result<&Subject> {
    if self.rotation.is_some() {
      return Err(Error::Presenting);
    }
    if self.year.is_none() {
      return Err(Error::NoYearSelected);
    }
    let subject = self
      .subjects
      .iter()
      .find(|s| s.id == subject_id)
      .cloned()
      .ok_or_else(|| Error::UnknownSubject(subject_id.to_owned()))?;
    Ok(self.selected.insert(subject))
  }

  /// Load `year` and pick `subject_id` from it in one step. On error the
  /// picker and the current selection are left as they were.
  pub async fn select(&mut self, year: u8, subject_id: &str) -> Result<&Subject> {
    let subjects = self.fetch_subjects(year).await?;
    let subject = subjects
      .iter()
      .find(|s| s.id == subject_id)
      .cloned()
      .ok_or_else(|| Error::UnknownSubject(subject_id.to_owned()))?;

    self.year = Some(year);
    self.subjects = subjects;
    tracing::debug!(year, subject_id, "subject selected");
    Ok(self.selected.insert(subject))
  }

  /// Drop the subject choice; stops any presentation and returns to `Idle`.
  pub fn clear_subject(&mut self) {
    self.stop_presenting();
    self.selected = None;
  }

  /// Drop the year and its picker; stops any presentation and returns to
  /// `Idle`.
  pub fn clear_year(&mut self) {
    self.clear_subject();
    self.year = None;
    self.subjects.clear();
  }

  // ── Presentation ────────────────────────────────────────────────────────

  /// Enter `Presenting`: issue the first payload now and start rotating.
  pub fn start_presenting(&mut self) -> Result<Presentation> {
    if self.rotation.is_some() {
      return Err(Error::AlreadyPresenting);
    }
    let subject = self.selected.as_ref().ok_or(Error::NoSubjectSelected)?;

    let descriptor = SessionDescriptor::issue(
      subject,
      &self.config.department,
      self.clock.today(),
      self.clock.now(),
    );
    let first = Presentation {
      presentation_id: Uuid::new_v4(),
      rotation:        0,
      payload:         encode_payload(&descriptor, self.config.signing_key.as_ref()),
      descriptor,
      session_expired: false,
    };
    self.tx.send_replace(Some(first.clone()));

    self.rotation = Some(RotationTask::spawn(
      first.clone(),
      self.config.rotation_interval,
      Arc::clone(&self.clock),
      self.config.signing_key.clone(),
      Arc::clone(&self.tx),
    ));

    tracing::info!(
      presentation_id = %first.presentation_id,
      subject_id = %first.descriptor.subject_id,
      session_date = %first.descriptor.session_date,
      "presenting attendance session"
    );
    Ok(first)
  }

  /// Close the presentation, cancel the timer, and return to `Selecting`.
  /// Returns `false` if nothing was being presented.
  pub fn stop_presenting(&mut self) -> bool {
    let Some(task) = self.rotation.take() else {
      return false;
    };
    let presentation_id = task.presentation_id;
    drop(task);
    self.tx.send_replace(None);
    tracing::info!(%presentation_id, "attendance session closed");
    true
  }

  /// The payload currently on screen, if presenting.
  pub fn current(&self) -> Option<Presentation> { self.tx.borrow().clone() }

  /// Watch the on-screen payload. `None` while not presenting.
  pub fn subscribe(&self) -> watch::Receiver<Option<Presentation>> { self.tx.subscribe() }
}

impl<D, C> Drop for SessionIssuer<D, C> {
  fn drop(&mut self) {
    // RotationTask aborts on drop; clear the slot so watchers see the end.
    if self.rotation.take().is_some() {
      self.tx.send_replace(None);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use chrono::{DateTime, TimeZone, Utc};
  use rollcall_core::{codec, date::SessionDate, subject::NewSubject};
  use rollcall_store_sqlite::SqliteStore;

  use super::*;
  use crate::ManualClock;

  /// Wall clock that advances with tokio's (pausable) clock.
  struct TokioClock {
    wall:  DateTime<Utc>,
    start: Instant,
  }

  impl TokioClock {
    fn new(wall: DateTime<Utc>) -> Self {
      Self {
        wall,
        start: Instant::now(),
      }
    }
  }

  impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
      let elapsed = chrono::Duration::from_std(self.start.elapsed()).unwrap_or_default();
      self.wall + elapsed
    }

    fn today(&self) -> SessionDate { SessionDate::new(self.now().date_naive()) }
  }

  fn morning() -> DateTime<Utc> { Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap() }

  async fn directory() -> Arc<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    store
      .add_subject(NewSubject::new("S_id", "Data Structures", "CSE", 2))
      .await
      .unwrap();
    store
      .add_subject(NewSubject::new("algo", "Algorithms", "CSE", 2))
      .await
      .unwrap();
    store
      .add_subject(NewSubject::new("circ", "Circuits", "EEE", 2))
      .await
      .unwrap();
    Arc::new(store)
  }

  async fn issuer<C: Clock>(clock: C) -> SessionIssuer<SqliteStore, C> {
    SessionIssuer::with_clock(directory().await, Arc::new(clock), IssuerConfig::new("CSE"))
  }

  #[tokio::test]
  async fn picker_is_scoped_to_the_configured_department() {
    let mut issuer = issuer(ManualClock::new(morning())).await;
    assert_eq!(issuer.phase(), IssuerPhase::Idle);

    let subjects = issuer.load_subjects(2).await.unwrap();
    let ids: Vec<_> = subjects.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, ["algo", "S_id"]);

    assert!(matches!(
      issuer.select_subject("circ"),
      Err(Error::UnknownSubject(_))
    ));
    assert_eq!(issuer.phase(), IssuerPhase::Idle);
  }

  #[tokio::test]
  async fn selecting_and_clearing_moves_between_idle_and_selecting() {
    let mut issuer = issuer(ManualClock::new(morning())).await;
    assert!(matches!(issuer.select_subject("S_id"), Err(Error::NoYearSelected)));

    issuer.load_subjects(2).await.unwrap();
    issuer.select_subject("S_id").unwrap();
    assert_eq!(issuer.phase(), IssuerPhase::Selecting);

    issuer.clear_subject();
    assert_eq!(issuer.phase(), IssuerPhase::Idle);

    issuer.select_subject("S_id").unwrap();
    issuer.clear_year();
    assert_eq!(issuer.phase(), IssuerPhase::Idle);
    assert!(issuer.subjects().is_empty());
  }

  #[tokio::test]
  async fn select_picks_year_and_subject_together() {
    let mut issuer = issuer(ManualClock::new(morning())).await;
    let subject = issuer.select(2, "S_id").await.unwrap();
    assert_eq!(subject.name, "Data Structures");
    assert_eq!(issuer.phase(), IssuerPhase::Selecting);
    assert_eq!(issuer.year(), Some(2));
    assert_eq!(issuer.subjects().len(), 2);
  }

  #[tokio::test]
  async fn failed_select_keeps_the_prior_selection() {
    let mut issuer = issuer(ManualClock::new(morning())).await;
    issuer.select(2, "S_id").await.unwrap();

    assert!(matches!(
      issuer.select(3, "S_id").await,
      Err(Error::UnknownSubject(_))
    ));
    assert!(matches!(
      issuer.select(2, "circ").await,
      Err(Error::UnknownSubject(_))
    ));

    assert_eq!(issuer.phase(), IssuerPhase::Selecting);
    assert_eq!(issuer.year(), Some(2));
    assert_eq!(issuer.selected().map(|s| s.id.as_str()), Some("S_id"));
    assert_eq!(issuer.subjects().len(), 2);
    issuer.start_presenting().unwrap();
    assert!(matches!(issuer.select(2, "algo").await, Err(Error::Presenting)));
  }

  #[tokio::test]
  async fn start_requires_a_subject() {
    let mut issuer = issuer(ManualClock::new(morning())).await;
    assert!(matches!(issuer.start_presenting(), Err(Error::NoSubjectSelected)));
  }

  #[tokio::test]
  async fn first_payload_is_issued_on_entry() {
    let mut issuer = issuer(ManualClock::new(morning())).await;
    issuer.load_subjects(2).await.unwrap();
    issuer.select_subject("S_id").unwrap();

    let first = issuer.start_presenting().unwrap();
    assert_eq!(issuer.phase(), IssuerPhase::Presenting);
    assert_eq!(first.rotation, 0);
    assert_eq!(issuer.current(), Some(first.clone()));

    let d = codec::decode(&first.payload).unwrap();
    assert_eq!(d, first.descriptor);
    assert_eq!(d.subject_id, "S_id");
    assert_eq!(d.subject_name, "Data Structures");
    assert_eq!(d.session_date.to_string(), "03/03/2025");
    assert_eq!(d.department_scope, "CSE");
    assert_eq!(d.issued_at_epoch_ms, morning().timestamp_millis());
    assert!(d.valid);

    assert!(matches!(issuer.start_presenting(), Err(Error::AlreadyPresenting)));
    assert!(matches!(issuer.load_subjects(2).await, Err(Error::Presenting)));
  }

  #[tokio::test(start_paused = true)]
  async fn each_rotation_reissues_with_a_fresh_timestamp() {
    let mut issuer = issuer(TokioClock::new(morning())).await;
    issuer.load_subjects(2).await.unwrap();
    issuer.select_subject("S_id").unwrap();

    let mut rx = issuer.subscribe();
    let first = issuer.start_presenting().unwrap();
    rx.borrow_and_update();

    const N: u64 = 5;
    let mut stamps = HashSet::new();
    for expected in 1..=N {
      rx.changed().await.unwrap();
      let p = rx.borrow_and_update().clone().unwrap();
      assert_eq!(p.rotation, expected);
      assert_eq!(p.presentation_id, first.presentation_id);
      assert_eq!(p.descriptor.subject_id, first.descriptor.subject_id);
      assert_eq!(p.descriptor.session_date, first.descriptor.session_date);
      assert_eq!(
        p.descriptor.issued_at_epoch_ms - first.descriptor.issued_at_epoch_ms,
        (expected * 3000) as i64
      );
      stamps.insert(p.descriptor.issued_at_epoch_ms);
    }
    assert_eq!(stamps.len(), N as usize);
  }

  #[tokio::test(start_paused = true)]
  async fn date_stays_pinned_across_midnight() {
    let late = Utc.with_ymd_and_hms(2025, 3, 3, 23, 59, 58).unwrap();
    let mut issuer = issuer(TokioClock::new(late)).await;
    issuer.load_subjects(2).await.unwrap();
    issuer.select_subject("S_id").unwrap();

    let mut rx = issuer.subscribe();
    let first = issuer.start_presenting().unwrap();
    assert!(!first.session_expired);
    rx.borrow_and_update();

    rx.changed().await.unwrap();
    let p = rx.borrow_and_update().clone().unwrap();
    assert_eq!(p.descriptor.session_date.to_string(), "03/03/2025");
    assert!(p.session_expired);

    issuer.stop_presenting();
    let restarted = issuer.start_presenting().unwrap();
    assert_eq!(restarted.descriptor.session_date.to_string(), "04/03/2025");
    assert!(!restarted.session_expired);
  }

  #[tokio::test(start_paused = true)]
  async fn stop_cancels_rotation_and_returns_to_selecting() {
    let mut issuer = issuer(TokioClock::new(morning())).await;
    issuer.load_subjects(2).await.unwrap();
    issuer.select_subject("S_id").unwrap();
    let mut rx = issuer.subscribe();
    issuer.start_presenting().unwrap();

    assert!(issuer.stop_presenting());
    assert_eq!(issuer.phase(), IssuerPhase::Selecting);
    assert_eq!(issuer.current(), None);
    assert!(!issuer.stop_presenting());

    rx.borrow_and_update();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!rx.has_changed().unwrap());
    assert_eq!(*rx.borrow(), None);
  }

  #[tokio::test(start_paused = true)]
  async fn restart_gets_a_new_presentation_id() {
    let mut issuer = issuer(TokioClock::new(morning())).await;
    issuer.load_subjects(2).await.unwrap();
    issuer.select_subject("S_id").unwrap();

    let a = issuer.start_presenting().unwrap();
    issuer.stop_presenting();
    let b = issuer.start_presenting().unwrap();
    assert_ne!(a.presentation_id, b.presentation_id);

    tokio::time::sleep(Duration::from_millis(3500)).await;
    let now = issuer.current().unwrap();
    assert_eq!(now.presentation_id, b.presentation_id);
    assert_eq!(now.rotation, 1);
  }

  #[tokio::test]
  async fn dropping_the_issuer_ends_the_presentation() {
    let mut issuer = issuer(ManualClock::new(morning())).await;
    issuer.load_subjects(2).await.unwrap();
    issuer.select_subject("S_id").unwrap();
    let rx = issuer.subscribe();
    issuer.start_presenting().unwrap();

    drop(issuer);
    assert_eq!(*rx.borrow(), None);
  }

  #[tokio::test]
  async fn signed_presentations_verify_with_the_issuer_key() {
    let key = PayloadKey::new("campus-secret").unwrap();
    let mut config = IssuerConfig::new("CSE");
    config.signing_key = Some(key.clone());
    let mut issuer = SessionIssuer::with_clock(
      directory().await,
      Arc::new(ManualClock::new(morning())),
      config,
    );
    issuer.load_subjects(2).await.unwrap();
    issuer.select_subject("S_id").unwrap();

    let first = issuer.start_presenting().unwrap();
    assert_eq!(
      codec::decode_verified(&first.payload, &key).unwrap(),
      first.descriptor
    );
  }
}
