//! Shared vocabulary for the spectest engine.
//!
//! This crate owns the two pieces every other layer leans on:
//!
//! - [`Fault`]: the explicit recoverable/fatal split applied once at every fallible boundary.
//! - [`Try`]: the fallible-computation wrapper used to turn thrown errors into structured outcomes without ever
//!   swallowing a fatal error.
//!
//! It has no runtime dependencies beyond `thiserror`, so user test code can depend on it without pulling in the
//! async engine.

#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod attempt;
pub mod fault;

pub use attempt::Try;
pub use fault::{BoxError, FatalError, Fault, PanicError, SharedError, fatal, panic_message};
