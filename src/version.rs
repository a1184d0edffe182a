//! spectest version information.
//!
//! The value is taken from Cargo metadata (`CARGO_PKG_VERSION`) at compile time. Prefer this constant over
//! repeating `env!("CARGO_PKG_VERSION")` so the CLI and any embedding host agree on the same value.

/// The spectest version string (for example, `0.1.0-alpha.1`).
pub const SPECTEST_VERSION: &str = env!("CARGO_PKG_VERSION");
