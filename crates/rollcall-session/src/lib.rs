//! Attendance session workflows on top of the `rollcall-core` traits.
//!
//! - [`issuer`]: the admin side; presents a rotating QR payload.
//! - [`recorder`]: the student side; validates a scan and commits attendance.
//! - [`roster`]: a live, read-only view of one session's check-ins.
//! - [`export`]: flattens a subject's records into a CSV report.
//! - [`qr`]: renders payloads as SVG QR codes.

pub mod clock;
pub mod error;
pub mod export;
pub mod issuer;
pub mod qr;
pub mod recorder;
pub mod roster;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
