//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use rollcall_core::codec::DecodeError;
use rollcall_session::recorder::ScanError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("internal error: {0}")]
  Internal(String),

  #[error(transparent)]
  Scan(#[from] ScanError),
}

impl ApiError {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Self::Store(Box::new(e))
  }
}

impl From<rollcall_session::Error> for ApiError {
  fn from(e: rollcall_session::Error) -> Self {
    use rollcall_session::Error as E;
    match e {
      E::Directory(inner) | E::Ledger(inner) => Self::Store(inner),
      E::UnknownSubject(_) => Self::NotFound(e.to_string()),
      E::NoYearSelected | E::NoSubjectSelected | E::AlreadyPresenting | E::Presenting => {
        Self::Conflict(e.to_string())
      }
      E::Qr(_) => Self::Internal(e.to_string()),
    }
  }
}

/// Stable machine-readable tag for a scan rejection.
fn scan_reason(e: &ScanError) -> &'static str {
  match e {
    ScanError::Decode(DecodeError::MalformedPayload(_)) => "malformed_payload",
    ScanError::Decode(DecodeError::MissingRequiredField(_)) => "missing_required_field",
    ScanError::Decode(DecodeError::InvalidSignature) => "invalid_signature",
    ScanError::ExpiredSession { .. } => "expired_session",
    ScanError::DuplicateAttendance(_) => "duplicate_attendance",
    ScanError::LedgerUnavailable(_) => "ledger_unavailable",
    ScanError::ScannerDisarmed => "scanner_disarmed",
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store error");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
      ApiError::Internal(m) => {
        tracing::error!(error = %m, "internal error");
        (StatusCode::INTERNAL_SERVER_ERROR, m.clone())
      }
      ApiError::Scan(e) => {
        let status = match e {
          ScanError::Decode(_) => StatusCode::BAD_REQUEST,
          ScanError::ExpiredSession { .. } => StatusCode::UNPROCESSABLE_ENTITY,
          ScanError::DuplicateAttendance(_) | ScanError::ScannerDisarmed => StatusCode::CONFLICT,
          ScanError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = json!({
          "error":  e.user_message(),
          "reason": scan_reason(e),
          "rearm":  e.rearms(),
        });
        return (status, Json(body)).into_response();
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
