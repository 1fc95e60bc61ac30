//! JSON REST API for Rollcall.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`AttendanceLedger`] and [`SubjectDirectory`]. Auth, TLS, and transport
//! concerns are the caller's responsibility; student identity is taken from
//! the request body as already authenticated.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", rollcall_api::api_router(state))
//! ```

pub mod error;
pub mod export;
pub mod issuer;
pub mod roster;
pub mod scan;
pub mod subjects;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use rollcall_core::store::{AttendanceLedger, SubjectDirectory};
use rollcall_session::{
  Clock, SystemClock,
  issuer::{IssuerConfig, SessionIssuer},
  qr::DEFAULT_MODULE_PX,
  recorder::AttendanceRecorder,
};
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// A store that serves both the subject directory and the ledger.
pub trait Backend: AttendanceLedger + SubjectDirectory + 'static {}

impl<T> Backend for T where T: AttendanceLedger + SubjectDirectory + 'static {}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
///
/// One issuer per process: the API drives a single presentation screen.
pub struct AppState<S, C = SystemClock> {
  pub store:        Arc<S>,
  pub clock:        Arc<C>,
  pub issuer:       Arc<Mutex<SessionIssuer<S, C>>>,
  pub recorder:     Arc<AttendanceRecorder<S, C>>,
  pub department:   Arc<str>,
  pub qr_module_px: u32,
}

impl<S, C> Clone for AppState<S, C> {
  fn clone(&self) -> Self {
    Self {
      store:        Arc::clone(&self.store),
      clock:        Arc::clone(&self.clock),
      issuer:       Arc::clone(&self.issuer),
      recorder:     Arc::clone(&self.recorder),
      department:   Arc::clone(&self.department),
      qr_module_px: self.qr_module_px,
    }
  }
}

impl<S: Backend> AppState<S, SystemClock> {
  pub fn new(store: Arc<S>, config: IssuerConfig) -> Self {
    Self::with_clock(store, Arc::new(SystemClock), config)
  }
}

impl<S: Backend, C: Clock> AppState<S, C> {
  pub fn with_clock(store: Arc<S>, clock: Arc<C>, config: IssuerConfig) -> Self {
    let department: Arc<str> = Arc::from(config.department.as_str());
    let recorder = AttendanceRecorder::with_clock(Arc::clone(&store), Arc::clone(&clock))
      .with_signing_key(config.signing_key.clone());
    let issuer = SessionIssuer::with_clock(Arc::clone(&store), Arc::clone(&clock), config);

    Self {
      store,
      clock,
      issuer: Arc::new(Mutex::new(issuer)),
      recorder: Arc::new(recorder),
      department,
      qr_module_px: DEFAULT_MODULE_PX,
    }
  }

  pub fn with_qr_module_px(mut self, px: u32) -> Self {
    self.qr_module_px = px;
    self
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, C>(state: AppState<S, C>) -> Router<()>
where
  S: Backend,
  C: Clock,
{
  Router::new()
    // Subjects
    .route("/subjects", get(subjects::list::<S, C>).post(subjects::create::<S, C>))
    // Issuer
    .route("/issuer", get(issuer::status::<S, C>))
    .route("/issuer/select", post(issuer::select::<S, C>))
    .route("/issuer/clear", post(issuer::clear::<S, C>))
    .route("/issuer/start", post(issuer::start::<S, C>))
    .route("/issuer/stop", post(issuer::stop::<S, C>))
    .route("/issuer/current", get(issuer::current::<S, C>))
    .route("/issuer/qr.svg", get(issuer::qr_svg::<S, C>))
    // Scanning
    .route("/scan", post(scan::submit::<S, C>))
    // Roster and export
    .route("/roster", get(roster::snapshot::<S, C>))
    .route("/roster/live", get(roster::live::<S, C>))
    .route("/export", get(export::csv::<S, C>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}
