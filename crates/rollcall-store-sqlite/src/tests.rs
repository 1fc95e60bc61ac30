//! Integration tests for `SqliteStore` against an in-memory database.

use std::sync::Arc;

use rollcall_core::{
  date::SessionDate,
  record::{AttendanceStatus, CompositeKey, InsertOutcome, NewAttendance, StudentIdentity},
  store::{AttendanceLedger, SubjectDirectory},
  subject::NewSubject,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn march_3rd() -> SessionDate { SessionDate::from_dmy(3, 3, 2025).unwrap() }

fn attendance(subject_id: &str, date: SessionDate, uid: &str) -> NewAttendance {
  NewAttendance {
    student:      StudentIdentity::new(uid, format!("Student {uid}")),
    subject_id:   subject_id.into(),
    subject_name: "Data Structures".into(),
    session_date: date,
  }
}

// ─── Subjects ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_subject() {
  let s = store().await;

  let subject = s
    .add_subject(NewSubject::new("S_id", "Data Structures", "CSE", 2))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(subject.name, "Data Structures");

  let fetched = s.get_subject("S_id").await.unwrap().unwrap();
  assert_eq!(fetched, subject);
}

#[tokio::test]
async fn get_subject_missing_returns_none() {
  let s = store().await;
  assert!(s.get_subject("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn subjects_for_filters_by_department_and_year() {
  let s = store().await;
  s.add_subject(NewSubject::new("ds", "Data Structures", "CSE", 2)).await.unwrap();
  s.add_subject(NewSubject::new("algo", "Algorithms", "CSE", 2)).await.unwrap();
  s.add_subject(NewSubject::new("os", "Operating Systems", "CSE", 3)).await.unwrap();
  s.add_subject(NewSubject::new("circ", "Circuits", "EEE", 2)).await.unwrap();

  let picked = s.subjects_for("CSE", 2).await.unwrap();
  let names: Vec<_> = picked.iter().map(|s| s.name.as_str()).collect();
  assert_eq!(names, ["Algorithms", "Data Structures"]);

  assert!(s.subjects_for("MECH", 2).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_subject_id_is_refused_without_overwriting() {
  let s = store().await;
  s.add_subject(NewSubject::new("ds", "Data Structures", "CSE", 2)).await.unwrap();
  assert!(
    s.add_subject(NewSubject::new("ds", "Other", "CSE", 2))
      .await
      .unwrap()
      .is_none()
  );
  assert_eq!(s.get_subject("ds").await.unwrap().unwrap().name, "Data Structures");
}

#[tokio::test]
async fn concurrent_adds_for_same_subject_id_create_exactly_once() {
  let s = Arc::new(store().await);

  let mut handles = Vec::new();
  for i in 0..16 {
    let s = Arc::clone(&s);
    handles.push(tokio::spawn(async move {
      s.add_subject(NewSubject::new("ds", format!("Data Structures {i}"), "CSE", 2))
        .await
        .unwrap()
    }));
  }

  let mut created = 0;
  for h in handles {
    if h.await.unwrap().is_some() {
      created += 1;
    }
  }
  assert_eq!(created, 1);
  assert_eq!(s.subjects_for("CSE", 2).await.unwrap().len(), 1);
}

// ─── Conditional create ──────────────────────────────────────────────────────

#[tokio::test]
async fn first_insert_creates_a_present_record() {
  let s = store().await;

  let outcome = s
    .insert_if_absent(attendance("S_id", march_3rd(), "u123"))
    .await
    .unwrap();
  let InsertOutcome::Created(record) = outcome else {
    panic!("expected Created, got {outcome:?}");
  };
  assert_eq!(record.status, AttendanceStatus::Present);
  assert_eq!(record.key().as_str(), "S_id-03-03-2025-u123");

  let fetched = s.get_record(&record.key()).await.unwrap().unwrap();
  assert_eq!(fetched, record);
}

#[tokio::test]
async fn second_insert_for_same_key_is_already_present() {
  let s = store().await;

  let first = s
    .insert_if_absent(attendance("S_id", march_3rd(), "u123"))
    .await
    .unwrap();
  let second = s
    .insert_if_absent(attendance("S_id", march_3rd(), "u123"))
    .await
    .unwrap();

  assert!(first.is_created());
  assert_eq!(second, InsertOutcome::AlreadyPresent(first.record().clone()));
  assert_eq!(
    s.records_for_session("S_id", march_3rd()).await.unwrap().len(),
    1
  );
}

#[tokio::test]
async fn concurrent_inserts_for_same_key_create_exactly_once() {
  let s = Arc::new(store().await);

  let mut handles = Vec::new();
  for _ in 0..16 {
    let s = Arc::clone(&s);
    handles.push(tokio::spawn(async move {
      s.insert_if_absent(attendance("S_id", march_3rd(), "u123"))
        .await
        .unwrap()
    }));
  }

  let mut created = 0;
  for h in handles {
    if h.await.unwrap().is_created() {
      created += 1;
    }
  }
  assert_eq!(created, 1);
  assert_eq!(
    s.records_for_session("S_id", march_3rd()).await.unwrap().len(),
    1
  );
}

#[tokio::test]
async fn get_record_missing_returns_none() {
  let s = store().await;
  let key = CompositeKey::new("S_id", march_3rd(), "ghost");
  assert!(s.get_record(&key).await.unwrap().is_none());
}

// ─── Queries ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn records_for_session_are_scoped_and_newest_first() {
  let s = store().await;
  let other_day = SessionDate::from_dmy(4, 3, 2025).unwrap();

  for uid in ["a", "b", "c"] {
    s.insert_if_absent(attendance("S_id", march_3rd(), uid)).await.unwrap();
  }
  s.insert_if_absent(attendance("S_id", other_day, "a")).await.unwrap();
  s.insert_if_absent(attendance("other", march_3rd(), "a")).await.unwrap();

  let roster = s.records_for_session("S_id", march_3rd()).await.unwrap();
  let uids: Vec<_> = roster.iter().map(|r| r.student_uid.as_str()).collect();
  assert_eq!(uids, ["c", "b", "a"]);
  assert!(roster.windows(2).all(|w| w[0].recorded_at > w[1].recorded_at));
}

#[tokio::test]
async fn records_for_subject_spans_every_day() {
  let s = store().await;
  let other_day = SessionDate::from_dmy(4, 3, 2025).unwrap();

  s.insert_if_absent(attendance("S_id", march_3rd(), "a")).await.unwrap();
  s.insert_if_absent(attendance("S_id", other_day, "a")).await.unwrap();
  s.insert_if_absent(attendance("other", march_3rd(), "a")).await.unwrap();

  let all = s.records_for_subject("S_id").await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].session_date, other_day);
}

#[tokio::test]
async fn recorded_at_is_strictly_increasing() {
  let s = store().await;
  let mut stamps = Vec::new();
  for i in 0..20 {
    let outcome = s
      .insert_if_absent(attendance("S_id", march_3rd(), &format!("u{i}")))
      .await
      .unwrap();
    stamps.push(outcome.record().recorded_at);
  }
  assert!(stamps.windows(2).all(|w| w[0] < w[1]));
}

// ─── Change feed ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn subscribers_see_created_records_only() {
  let s = store().await;
  let mut rx = s.subscribe();

  s.insert_if_absent(attendance("S_id", march_3rd(), "a")).await.unwrap();
  s.insert_if_absent(attendance("S_id", march_3rd(), "a")).await.unwrap();
  s.insert_if_absent(attendance("S_id", march_3rd(), "b")).await.unwrap();

  assert_eq!(rx.recv().await.unwrap().student_uid, "a");
  assert_eq!(rx.recv().await.unwrap().student_uid, "b");
  assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn clones_share_one_feed() {
  let s = store().await;
  let clone = s.clone();
  let mut rx = s.subscribe();

  clone
    .insert_if_absent(attendance("S_id", march_3rd(), "a"))
    .await
    .unwrap();
  assert_eq!(rx.recv().await.unwrap().student_uid, "a");
}

#[tokio::test]
async fn reopening_a_file_store_keeps_records() {
  let dir = std::env::temp_dir().join(format!(
    "rollcall-store-test-{}-{}",
    std::process::id(),
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
  ));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("ledger.db");

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.insert_if_absent(attendance("S_id", march_3rd(), "a")).await.unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  let again = s
    .insert_if_absent(attendance("S_id", march_3rd(), "a"))
    .await
    .unwrap();
  assert!(!again.is_created());

  drop(s);
  let _ = std::fs::remove_dir_all(&dir);
}
