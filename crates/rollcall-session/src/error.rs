//! Error type for `rollcall-session`.
//!
//! Scan failures have their own taxonomy in [`crate::recorder::ScanError`];
//! this type covers the issuer, roster and export paths.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject directory error: {0}")]
  Directory(#[source] BoxError),

  #[error("ledger error: {0}")]
  Ledger(#[source] BoxError),

  #[error("no class year has been loaded")]
  NoYearSelected,

  #[error("subject {0:?} is not offered for the loaded year")]
  UnknownSubject(String),

  #[error("no subject is selected")]
  NoSubjectSelected,

  #[error("a presentation is already running")]
  AlreadyPresenting,

  #[error("the subject picker cannot change while presenting")]
  Presenting,

  #[error("qr rendering failed: {0}")]
  Qr(String),
}

impl Error {
  pub(crate) fn directory<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Directory(Box::new(e))
  }

  pub(crate) fn ledger<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Ledger(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
