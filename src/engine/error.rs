//! Engine error taxonomy.
//!
//! These are the *recoverable* errors the engine itself raises. They travel inside
//! [`Fault::Recoverable`](spectest_core::Fault) and end up in a `TestResult::Failure` or a spec-level
//! `Try::Failure`. Fatal errors never use this type; see [`spectest_core::FatalError`].

use std::time::Duration;

use spectest_core::SharedError;
use thiserror::Error;

use super::spec::SpecId;
use super::test_case::TestPath;

/// Message used when flat execution is asked to handle nesting.
pub const FLAT_MODE_NESTING_UNSUPPORTED: &str = "Nested tests are not supported in flat execution mode because the \
     host runner only awaits top-level tests. Declare tests at the top level of the spec.";

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("Execution of test took longer than {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("test `{0}` was cancelled before it completed")]
    Cancelled(TestPath),

    #[error("failed to instantiate spec `{spec}`: {source}")]
    Instantiation { spec: SpecId, source: SharedError },

    #[error("no factory registered for spec `{0}`")]
    UnknownSpec(SpecId),

    #[error("test `{path}` is not declared by a fresh instance of spec `{spec}`")]
    MissingTest { spec: SpecId, path: TestPath },

    #[error("duplicate test name `{name}` under `{parent}`")]
    DuplicateTest { parent: String, name: String },

    #[error("{0}")]
    Usage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
