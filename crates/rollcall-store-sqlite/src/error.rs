//! Error type for `rollcall-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] rollcall_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown attendance status: {0:?}")]
  UnknownStatus(String),

  #[error("year out of range: {0}")]
  YearOutOfRange(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
