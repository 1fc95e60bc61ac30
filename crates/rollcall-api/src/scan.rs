//! Handler for `POST /scan`.
//!
//! Body: `{"payload":"<scanned text>","student_uid":"u123","student_name":"Asha Rao"}`.
//!
//! | Status | Meaning |
//! |--------|---------|
//! | 201 | Attendance recorded |
//! | 400 | Payload unreadable, incomplete, or badly signed |
//! | 409 | Already recorded for this subject today |
//! | 422 | Payload is for another day |
//! | 503 | Ledger unavailable; nothing was written |
//!
//! Arming is a client concern over HTTP: every rejection body carries
//! `rearm`, telling the scanner whether to resume at once.

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use rollcall_core::record::{AttendanceRecord, StudentIdentity};
use rollcall_session::Clock;
use serde::{Deserialize, Serialize};

use crate::{AppState, Backend, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ScanBody {
  pub payload:      String,
  pub student_uid:  String,
  pub student_name: String,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
  pub record:  AttendanceRecord,
  pub message: String,
}

/// `POST /scan`
pub async fn submit<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
  Json(body): Json<ScanBody>,
) -> Result<impl IntoResponse, ApiError> {
  if body.student_uid.trim().is_empty() {
    return Err(ApiError::BadRequest("student_uid is required".into()));
  }
  let student = StudentIdentity::new(body.student_uid, body.student_name);

  let accepted = state.recorder.record(&body.payload, &student).await?;
  Ok((
    StatusCode::CREATED,
    Json(ScanResponse {
      record:  accepted.record,
      message: accepted.message,
    }),
  ))
}
