//! SQL schema for the Rollcall SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id  TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    department  TEXT NOT NULL,
    year        INTEGER NOT NULL
);

-- Attendance is strictly append-only.
-- record_key is <subject_id>-<DD-MM-YYYY>-<student_uid>; the primary key
-- constraint is what makes a second scan a no-op.
CREATE TABLE IF NOT EXISTS attendance (
    record_key    TEXT PRIMARY KEY,
    student_uid   TEXT NOT NULL,
    student_name  TEXT NOT NULL,
    subject_id    TEXT NOT NULL,
    subject_name  TEXT NOT NULL,
    session_date  TEXT NOT NULL,   -- DD/MM/YYYY
    recorded_at   TEXT NOT NULL,   -- RFC 3339 UTC, microseconds; store-assigned
    status        TEXT NOT NULL DEFAULT 'Present'
);

CREATE INDEX IF NOT EXISTS subjects_scope_idx      ON subjects(department, year);
CREATE INDEX IF NOT EXISTS attendance_session_idx  ON attendance(subject_id, session_date);
CREATE INDEX IF NOT EXISTS attendance_recorded_idx ON attendance(recorded_at);

PRAGMA user_version = 1;
";
