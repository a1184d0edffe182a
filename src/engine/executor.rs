//! Single-test execution.
//!
//! [`TestExecutor::execute`] takes one leaf from `NotStarted` to a [`TestResult`]:
//!
//! ```text
//! NotStarted -> Inactive -> Ignored
//! NotStarted -> Running -> {Succeeded | Failed | TimedOut | Cancelled} -> after hooks -> Completed
//! ```
//!
//! Hook and body errors (returned or panicked) are classified locally and never escape; a fatal fault skips
//! the after hooks and is returned as `Err`.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use spectest_core::{BoxError, Fault, SharedError};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::context::EngineContext;
use super::error::EngineError;
use super::extension::{TestOutcome, run_chain};
use super::result::TestResult;
use super::test_case::TestCase;
use super::test_context::{ExecutionMode, TestContext};

/// Run `start` and the future it returns, converting a panic in either into a [`Fault`].
pub(crate) async fn catch_fault<T, Fut>(start: impl FnOnce() -> Fut) -> Result<T, Fault>
where
    Fut: Future<Output = T>,
{
    let fut = match std::panic::catch_unwind(AssertUnwindSafe(start)) {
        Ok(fut) => fut,
        Err(payload) => return Err(Fault::from_panic(payload)),
    };
    AssertUnwindSafe(fut).catch_unwind().await.map_err(Fault::from_panic)
}

/// Run user code returning `Result<(), BoxError>`, classifying both errors and panics.
async fn guarded<Fut>(start: impl FnOnce() -> Fut) -> Result<(), Fault>
where
    Fut: Future<Output = Result<(), BoxError>>,
{
    catch_fault(start).await?.map_err(Fault::classify)
}

pub struct TestExecutor<'c> {
    context: &'c EngineContext,
}

impl<'c> TestExecutor<'c> {
    pub fn new(context: &'c EngineContext) -> Self {
        TestExecutor { context }
    }

    /// Execute one leaf test with its hooks.
    #[tracing::instrument(skip_all, fields(test = %test.path(), mode = ?mode))]
    pub async fn execute(&self, test: TestCase, cancel: CancellationToken, mode: ExecutionMode) -> TestOutcome {
        if !test.is_active() {
            debug!("inactive; ignored");
            return Ok(TestResult::Ignored);
        }
        let Some(body) = test.body().cloned() else {
            let err = EngineError::Usage(format!("`{}` is a container and cannot be executed directly", test.path()));
            return Ok(TestResult::failure(err, Duration::ZERO));
        };

        let started = Instant::now();
        let timeout = test.resolved_timeout(self.context.config().default_timeout);

        let mut outcome = Ok(());
        for hook in &test.hooks().before_test {
            outcome = guarded(|| hook(test.clone())).await;
            if outcome.is_err() {
                break;
            }
        }

        if outcome.is_ok() {
            let ctx = TestContext::new(test.clone(), cancel.clone(), mode);
            outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Fault::recoverable(EngineError::Cancelled(test.path().clone()))),
                finished = tokio::time::timeout(timeout, guarded(|| body(ctx))) => match finished {
                    Ok(result) => result,
                    Err(_) => Err(Fault::recoverable(EngineError::Timeout(timeout))),
                },
            };
        }

        let mut result = match outcome {
            Ok(()) => TestResult::success(started.elapsed()),
            Err(Fault::Recoverable(err)) => TestResult::from_shared(err, started.elapsed()),
            Err(Fault::Fatal(fatal)) => {
                warn!(error = %fatal, "fatal error; aborting run");
                return Err(fatal);
            }
        };

        for hook in &test.hooks().after_test {
            match guarded(|| hook(test.clone(), result.clone())).await {
                Ok(()) => {}
                Err(Fault::Fatal(fatal)) => return Err(fatal),
                Err(Fault::Recoverable(err)) => result = Self::merge_after_error(result, err, started),
            }
        }

        debug!(status = result.status().as_str(), elapsed_ms = result.duration().as_millis() as u64, "finished");
        Ok(result)
    }

    fn merge_after_error(result: TestResult, err: SharedError, started: Instant) -> TestResult {
        if result.is_success() {
            return TestResult::from_shared(err, started.elapsed());
        }
        warn!(error = %err, "after-test hook failed on an already failed test");
        result
    }
}

/// Run `test` through its resolved extension chain around [`TestExecutor::execute`].
///
/// A recoverable panic escaping an extension fails the test; a fatal one is returned as `Err`.
pub(crate) async fn run_intercepted(
    context: &EngineContext,
    test: TestCase,
    cancel: CancellationToken,
    mode: ExecutionMode,
) -> TestOutcome {
    let extensions = context.test_extensions_for(&test);
    let executor = TestExecutor::new(context);
    let chain = catch_fault(|| {
        run_chain(&extensions, test, |target| {
            executor.execute(target, cancel, mode).boxed()
        })
    });
    match chain.await {
        Ok(outcome) => outcome,
        Err(fault) => fault
            .into_recoverable()
            .map(|err| TestResult::from_shared(err, Duration::ZERO)),
    }
}
