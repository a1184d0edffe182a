#![forbid(unsafe_code)]
//! spectest: a nested-spec test execution engine
//!
//! Specs declare a tree of containers and leaf tests. The engine instantiates specs according to their isolation
//! mode, runs every leaf through interception chains of extensions, enforces timeouts and lifecycle hooks, and
//! reports results through listeners. The fault taxonomy and the `Try` result classifier live in the
//! `spectest_core` crate and are re-exported here.
//!
//! ## Panic Policy
//!
//! This codebase follows explicit error handling:
//!
//! - **Production code**: Use `Result` or `Option` with `?` / `ok_or` / `map_err`. The `cli` and `engine` modules
//!   enforce `#![deny(clippy::unwrap_used)]`.
//!
//! - **Test code**: `.unwrap()` and `.expect()` are acceptable in tests.
//!
//! - **User code**: Test bodies and hooks may panic (assertion macros do). The engine catches those panics at the
//!   boundary and records them as failures; only a [`FatalError`] aborts a run.

pub mod cli;
pub mod engine;
pub mod version;

pub use spectest_core::{BoxError, FatalError, Fault, PanicError, SharedError, Try, fatal};

pub use engine::{
    Engine, EngineConfig, EngineContext, EngineError, EngineListener, ExtensionRegistry, IsolationMode, SpecBuilder,
    SpecDescriptor, SpecId, SpecRegistry, SpecResults, SpecRunner, TestCase, TestConfig, TestContext, TestPath,
    TestResult, run_single_test,
};
