//! Flat single-test execution for hosts that await one level of completion only.
//!
//! [`run_single_test`] spawns the test (through its extension chain) onto the current tokio runtime and returns
//! a [`TestHandle`]: the task plus the cancellation token wired into the running body.

use std::sync::Arc;
use std::time::Duration;

use spectest_core::{FatalError, Fault};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::context::EngineContext;
use super::error::EngineError;
use super::executor::run_intercepted;
use super::extension::TestOutcome;
use super::result::TestResult;
use super::test_case::{TestCase, TestPath};
use super::test_context::ExecutionMode;

/// Start one leaf test in flat mode.
///
/// Must be called from within a tokio runtime. Containers are rejected: flat hosts cannot await nested tests.
pub fn run_single_test(context: Arc<EngineContext>, test: TestCase) -> Result<TestHandle, EngineError> {
    if test.is_container() {
        return Err(EngineError::Usage(format!(
            "`{}` is a container; flat execution only runs leaf tests",
            test.path()
        )));
    }
    let path = test.path().clone();
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tracing::debug!(test = %path, "spawning flat test");
    let task = tokio::spawn(async move { run_intercepted(&context, test, token, ExecutionMode::Flat).await });
    Ok(TestHandle { path, cancel, task })
}

/// A flat test in flight.
#[derive(Debug)]
pub struct TestHandle {
    path: TestPath,
    cancel: CancellationToken,
    task: JoinHandle<TestOutcome>,
}

impl TestHandle {
    pub fn path(&self) -> &TestPath {
        &self.path
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel the running body. The test completes with a cancellation failure; after hooks still run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the test to complete.
    pub async fn wait(self) -> Result<TestResult, FatalError> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(join) if join.is_panic() => Fault::from_panic(join.into_panic())
                .into_recoverable()
                .map(|err| TestResult::from_shared(err, Duration::ZERO)),
            Err(_) => Ok(TestResult::failure(EngineError::Cancelled(self.path), Duration::ZERO)),
        }
    }
}
