//! Handlers for the `/issuer` endpoints, which drive the presentation screen.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/issuer` | Phase, year, selected subject, current presentation |
//! | `POST` | `/issuer/select` | Body: `{"year":2,"subject_id":"ds"}` |
//! | `POST` | `/issuer/clear` | Back to idle; stops any presentation |
//! | `POST` | `/issuer/start` | 409 if already presenting or nothing selected |
//! | `POST` | `/issuer/stop` | Back to selecting |
//! | `GET`  | `/issuer/current` | 404 when not presenting |
//! | `GET`  | `/issuer/qr.svg` | Current payload as an SVG QR code |

use axum::{
  Json,
  extract::State,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use rollcall_core::subject::Subject;
use rollcall_session::{
  Clock,
  issuer::{IssuerPhase, Presentation, SessionIssuer},
  qr,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, Backend, error::ApiError};

#[derive(Debug, Serialize)]
pub struct IssuerStatus {
  pub phase:        IssuerPhase,
  pub department:   String,
  pub year:         Option<u8>,
  pub subject:      Option<Subject>,
  pub presentation: Option<Presentation>,
}

impl IssuerStatus {
  fn of<S: Backend, C: Clock>(issuer: &SessionIssuer<S, C>) -> Self {
    Self {
      phase:        issuer.phase(),
      department:   issuer.config().department.clone(),
      year:         issuer.year(),
      subject:      issuer.selected().cloned(),
      presentation: issuer.current(),
    }
  }
}

/// `GET /issuer`
pub async fn status<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
) -> Json<IssuerStatus> {
  let issuer = state.issuer.lock().await;
  Json(IssuerStatus::of(&issuer))
}

#[derive(Debug, Deserialize)]
pub struct SelectBody {
  pub year:       u8,
  pub subject_id: String,
}

/// `POST /issuer/select`
pub async fn select<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
  Json(body): Json<SelectBody>,
) -> Result<Json<IssuerStatus>, ApiError> {
  let mut issuer = state.issuer.lock().await;
  issuer.select(body.year, &body.subject_id).await?;
  Ok(Json(IssuerStatus::of(&issuer)))
}

/// `POST /issuer/clear`
pub async fn clear<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
) -> Json<IssuerStatus> {
  let mut issuer = state.issuer.lock().await;
  issuer.clear_year();
  Json(IssuerStatus::of(&issuer))
}

/// `POST /issuer/start`
pub async fn start<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
) -> Result<impl IntoResponse, ApiError> {
  let presentation = state.issuer.lock().await.start_presenting()?;
  Ok((StatusCode::CREATED, Json(presentation)))
}

/// `POST /issuer/stop`
pub async fn stop<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
) -> Result<Json<IssuerStatus>, ApiError> {
  let mut issuer = state.issuer.lock().await;
  if !issuer.stop_presenting() {
    return Err(ApiError::Conflict("not presenting".into()));
  }
  Ok(Json(IssuerStatus::of(&issuer)))
}

async fn current_presentation<S: Backend, C: Clock>(
  state: &AppState<S, C>,
) -> Result<Presentation, ApiError> {
  state
    .issuer
    .lock()
    .await
    .current()
    .ok_or_else(|| ApiError::NotFound("not presenting".into()))
}

/// `GET /issuer/current`
pub async fn current<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
) -> Result<Json<Presentation>, ApiError> {
  Ok(Json(current_presentation(&state).await?))
}

/// `GET /issuer/qr.svg`
pub async fn qr_svg<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
) -> Result<Response, ApiError> {
  let presentation = current_presentation(&state).await?;
  let svg = qr::render_svg(&presentation.payload, state.qr_module_px)?;

  let mut resp = svg.into_response();
  let headers = resp.headers_mut();
  headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/svg+xml"));
  headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
  Ok(resp)
}
