//! Core types and trait definitions for Rollcall attendance sessions.
//!
//! This crate is free of HTTP and database dependencies. It defines the
//! rotating session descriptor, its QR payload codec, the attendance record
//! model, and the storage traits that backends implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod codec;
pub mod date;
pub mod descriptor;
pub mod error;
pub mod record;
pub mod store;
pub mod subject;

pub use error::{Error, Result};
