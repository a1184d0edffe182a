//! Context handed to a running test body.

use tokio_util::sync::CancellationToken;

use super::error::{EngineError, FLAT_MODE_NESTING_UNSUPPORTED};
use super::test_case::TestCase;

/// How the engine is driving the current test.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Part of a full spec run; the tree is declared up front by the spec factory.
    Nested,
    /// A single top-level test driven by a host that awaits one level of completion only.
    Flat,
}

#[derive(Clone, Debug)]
pub struct TestContext {
    test: TestCase,
    cancel: CancellationToken,
    mode: ExecutionMode,
}

impl TestContext {
    pub(crate) fn new(test: TestCase, cancel: CancellationToken, mode: ExecutionMode) -> Self {
        TestContext { test, cancel, mode }
    }

    pub fn test_case(&self) -> &TestCase {
        &self.test
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Token cancelled when the test is cancelled by its host. Long-running bodies may select on it.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Attempt to register a child test while the body is running.
    ///
    /// Tests are declared up front through the spec builder, so runtime registration is a usage error in every
    /// mode; in flat mode the message explains that the host cannot await nested tests at all.
    pub fn register_nested(&self, name: &str) -> Result<(), EngineError> {
        let message = match self.mode {
            ExecutionMode::Flat => FLAT_MODE_NESTING_UNSUPPORTED.to_string(),
            ExecutionMode::Nested => format!(
                "cannot register `{name}` from inside `{}`: declare nested tests with `context` on the spec builder",
                self.test.path()
            ),
        };
        tracing::debug!(test = %self.test.path(), child = name, mode = ?self.mode, "rejected runtime registration");
        Err(EngineError::Usage(message))
    }
}
