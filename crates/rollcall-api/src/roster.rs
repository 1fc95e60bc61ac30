//! Handlers for `/roster` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/roster?subject_id=ds[&date=DD/MM/YYYY]` | Snapshot, newest first; date defaults to today |
//! | `GET`  | `/roster/live?subject_id=ds[&date=DD/MM/YYYY]` | Server-sent `roster` events, one per change |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  response::sse::{Event, KeepAlive, Sse},
};
use futures::{Stream, stream};
use rollcall_core::{
  date::SessionDate,
  record::AttendanceRecord,
  store::AttendanceLedger,
};
use rollcall_session::{Clock, roster::LiveRoster};
use serde::Deserialize;

use crate::{AppState, Backend, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RosterParams {
  pub subject_id: String,
  pub date:       Option<SessionDate>,
}

/// `GET /roster`
pub async fn snapshot<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
  Query(params): Query<RosterParams>,
) -> Result<Json<Vec<AttendanceRecord>>, ApiError> {
  let date = params.date.unwrap_or_else(|| state.clock.today());
  let records = state
    .store
    .records_for_session(&params.subject_id, date)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}

/// `GET /roster/live`
///
/// The first event carries the current snapshot; each later event carries
/// the whole roster after a change. Closing the connection closes the roster.
pub async fn live<S: Backend, C: Clock>(
  State(state): State<AppState<S, C>>,
  Query(params): Query<RosterParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
  let date = params.date.unwrap_or_else(|| state.clock.today());
  let roster = LiveRoster::open(Arc::clone(&state.store), params.subject_id, date).await?;

  let events = stream::unfold((roster, true), |(mut roster, first)| async move {
    if !first && !roster.changed().await {
      return None;
    }
    let event = Event::default().event("roster").json_data(roster.snapshot());
    Some((event, (roster, false)))
  });

  Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
