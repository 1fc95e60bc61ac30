//! Handler for `GET /export?subject_id=<id>`: every record of one subject as a
//! CSV attachment named after the subject.

use axum::{
  extract::{Query, State},
  http::{HeaderMap, HeaderValue, header},
  response::IntoResponse,
};
use rollcall_core::store::SubjectDirectory;
use rollcall_session::{Clock, export::export_subject};
use serde::Deserialize;

use crate::{AppState, Backend, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ExportParams {
  pub subject_id: String,
}

/// `GET /export`
pub async fn csv<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
  Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, ApiError> {
  let subject = state
    .store
    .get_subject(&params.subject_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {} not found", params.subject_id)))?;

  let report = export_subject(state.store.as_ref(), &subject).await?;

  let mut headers = HeaderMap::new();
  headers.insert(
    header::CONTENT_TYPE,
    HeaderValue::from_static("text/csv; charset=utf-8"),
  );
  headers.insert(
    header::CONTENT_DISPOSITION,
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", report.file_name))
      .unwrap_or(HeaderValue::from_static("attachment")),
  );

  Ok((headers, report.to_csv()))
}

#[cfg(test)]
mod tests {
  use axum::http::{StatusCode, header};
  use rollcall_core::{
    date::SessionDate,
    record::{NewAttendance, StudentIdentity},
    store::AttendanceLedger,
  };

  use crate::test_support::{body_text, make_state, send};

  #[tokio::test]
  async fn exports_every_day_as_csv() {
    let state = make_state().await;
    for day in [3, 4] {
      state
        .store
        .insert_if_absent(NewAttendance {
          student:      StudentIdentity::new("u123", "Asha Rao"),
          subject_id:   "S_id".into(),
          subject_name: "Data Structures".into(),
          session_date: SessionDate::from_dmy(day, 3, 2025).unwrap(),
        })
        .await
        .unwrap();
    }

    let resp = send(&state, "GET", "/export?subject_id=S_id", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
      resp.headers()[header::CONTENT_DISPOSITION],
      "attachment; filename=\"Data Structures.csv\""
    );

    let csv = body_text(resp).await;
    let lines: Vec<_> = csv.lines().collect();
    assert_eq!(lines[0], "Name,ID,Date,Time");
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("Asha Rao,u123,04/03/2025,"));
    assert!(lines[2].starts_with("Asha Rao,u123,03/03/2025,"));
  }

  #[tokio::test]
  async fn unknown_subject_is_not_found() {
    let state = make_state().await;
    let resp = send(&state, "GET", "/export?subject_id=nope", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
