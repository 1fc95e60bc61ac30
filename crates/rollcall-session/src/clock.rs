//! Wall-clock access for the issuer and recorder.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Local, Utc};
use rollcall_core::date::SessionDate;

pub trait Clock: Send + Sync + 'static {
  fn now(&self) -> DateTime<Utc>;

  /// The calendar day attendance is taken for.
  fn today(&self) -> SessionDate;
}

/// The host clock; days follow the host's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }

  fn today(&self) -> SessionDate { SessionDate::new(Local::now().date_naive()) }
}

/// A clock that only moves when told to. Days follow UTC.
#[derive(Debug, Clone)]
pub struct ManualClock {
  now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
  pub fn new(now: DateTime<Utc>) -> Self {
    Self {
      now: Arc::new(Mutex::new(now)),
    }
  }

  pub fn set(&self, now: DateTime<Utc>) {
    *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
  }

  pub fn advance(&self, by: Duration) {
    let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
    *now += by;
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> { *self.now.lock().unwrap_or_else(|e| e.into_inner()) }

  fn today(&self) -> SessionDate { SessionDate::new(self.now().date_naive()) }
}
