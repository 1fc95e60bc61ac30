//! Error types for `rollcall-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid session date {0:?}: expected DD/MM/YYYY")]
  InvalidSessionDate(String),

  #[error("payload signing key must not be empty")]
  EmptySigningKey,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
