//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects?year=2` | Optional `&department=`; defaults to the issuer's department |
//! | `POST` | `/subjects` | Body: `{"id":"ds","name":"Data Structures","department":"CSE","year":2}` |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use rollcall_core::{
  store::SubjectDirectory,
  subject::{NewSubject, Subject},
};
use rollcall_session::Clock;
use serde::Deserialize;

use crate::{AppState, Backend, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub department: Option<String>,
  pub year:       u8,
}

/// `GET /subjects?year=<year>[&department=<dept>]`
pub async fn list<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Subject>>, ApiError> {
  let department = params
    .department
    .unwrap_or_else(|| state.department.to_string());
  let subjects = state
    .store
    .subjects_for(&department, params.year)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(subjects))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /subjects`
pub async fn create<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
  Json(body): Json<NewSubject>,
) -> Result<impl IntoResponse, ApiError> {
  if body.id.trim().is_empty() || body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("subject id and name are required".into()));
  }
  let id = body.id.clone();
  let subject = state
    .store
    .add_subject(body)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::Conflict(format!("subject {id} already exists")))?;
  tracing::info!(subject_id = %subject.id, "subject added");
  Ok((StatusCode::CREATED, Json(subject)))
}
