//! Isolation-mode spec runner.
//!
//! Decides how many spec instances a run needs and which leaves each instance serves:
//!
//! | mode               | instances                 | scope of one instance        |
//! |--------------------|---------------------------|------------------------------|
//! | `SharedInstance`   | 1                         | every leaf                   |
//! | `FreshPerTest`     | one per top-level test    | the leaves under that test   |
//! | `FreshPerLeaf`     | one per leaf              | that leaf                    |
//!
//! The first instance enumerates the tree and also serves the first scope. Each scope runs through the spec
//! extension chain; its leaves then run sequentially, in declaration order, through the test-case chain. When a
//! spec extension continues with a different descriptor, that scope's leaves resolve their spec timeout and
//! spec-wide test extensions from it.

use std::sync::Arc;

use futures::FutureExt;
use spectest_core::{FatalError, Fault, SharedError, Try};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::context::EngineContext;
use super::error::EngineError;
use super::executor::{catch_fault, run_intercepted};
use super::extension::{SpecOutcome, run_chain};
use super::instantiate::SpecInstantiator;
use super::listener::EngineListener;
use super::result::{SpecResults, TestResult};
use super::spec::{IsolationMode, SpecDescriptor, SpecInstance};
use super::test_case::{TestCase, TestPath};
use super::test_context::ExecutionMode;

pub struct SpecRunner<'r> {
    context: &'r EngineContext,
    instantiator: &'r dyn SpecInstantiator,
    listener: &'r dyn EngineListener,
}

impl<'r> SpecRunner<'r> {
    pub fn new(
        context: &'r EngineContext,
        instantiator: &'r dyn SpecInstantiator,
        listener: &'r dyn EngineListener,
    ) -> Self {
        SpecRunner {
            context,
            instantiator,
            listener,
        }
    }

    /// Run every leaf of `spec` according to its isolation mode.
    ///
    /// Returns `Try::Failure` when an instance could not be built or a spec extension failed; scopes that did
    /// run still reported their results to the listener. Fatal errors abort the run as `Err`.
    #[tracing::instrument(skip_all, fields(spec = %spec.id(), isolation = %spec.isolation()))]
    pub async fn run_spec(&self, spec: &Arc<SpecDescriptor>) -> Result<Try<SpecResults>, FatalError> {
        self.listener.spec_started(spec);
        let first = match self.instantiate(spec)? {
            Try::Success(instance) => instance,
            Try::Failure(err) => {
                self.listener.spec_finished(spec, &SpecResults::new());
                return Ok(Try::Failure(err));
            }
        };

        let mut results = SpecResults::new();
        let mut first_error: Option<SharedError> = None;

        match spec.isolation() {
            IsolationMode::SharedInstance => {
                let leaves = first.leaves();
                if let Some(err) = self.run_scope(spec, leaves, &mut results).await? {
                    first_error.get_or_insert(err);
                }
            }
            IsolationMode::FreshPerTest => {
                let groups: Vec<TestPath> = first.roots().iter().map(|r| r.path().clone()).collect();
                self.run_fresh_scopes(spec, first, groups, &mut results, &mut first_error)
                    .await?;
            }
            IsolationMode::FreshPerLeaf => {
                let leaves: Vec<TestPath> = first.leaves().iter().map(|l| l.path().clone()).collect();
                self.run_fresh_scopes(spec, first, leaves, &mut results, &mut first_error)
                    .await?;
            }
        }

        let summary = results.summary();
        info!(
            passed = summary.passed,
            failed = summary.failed,
            ignored = summary.ignored,
            "spec finished"
        );
        self.listener.spec_finished(spec, &results);
        Ok(match first_error {
            Some(err) => Try::Failure(err),
            None => Try::Success(results),
        })
    }

    /// One instance per scope path; `first` serves the first scope.
    async fn run_fresh_scopes(
        &self,
        spec: &Arc<SpecDescriptor>,
        first: SpecInstance,
        scopes: Vec<TestPath>,
        results: &mut SpecResults,
        first_error: &mut Option<SharedError>,
    ) -> Result<(), FatalError> {
        let mut spare = Some(first);
        for path in scopes {
            let instance = match spare.take() {
                Some(instance) => instance,
                None => match self.instantiate(spec)? {
                    Try::Success(instance) => instance,
                    Try::Failure(err) => {
                        warn!(scope = %path, "skipping scope; instantiation failed");
                        first_error.get_or_insert(err);
                        continue;
                    }
                },
            };
            let Some(scope) = instance.find(&path) else {
                warn!(scope = %path, "skipping scope; fresh instance does not declare it");
                let err: SharedError = Arc::new(EngineError::MissingTest {
                    spec: spec.id().clone(),
                    path,
                });
                first_error.get_or_insert(err);
                continue;
            };
            debug!(scope = %path, "running scope on a fresh instance");
            if let Some(err) = self.run_scope(spec, scope.leaves(), results).await? {
                first_error.get_or_insert(err);
            }
        }
        Ok(())
    }

    fn instantiate(&self, spec: &Arc<SpecDescriptor>) -> Result<Try<SpecInstance>, FatalError> {
        let built = self.instantiator.construct(spec)?;
        match &built {
            Try::Success(_) => self.listener.spec_instantiated(spec),
            Try::Failure(err) => {
                warn!(error = %err, "spec instantiation failed");
                self.listener.spec_instantiation_error(spec, err);
            }
        }
        Ok(built)
    }

    /// Run one scope's leaves behind the spec extension chain.
    ///
    /// `Ok(Some(err))` means a spec extension failed recoverably; results recorded before the failure are kept.
    async fn run_scope(
        &self,
        spec: &Arc<SpecDescriptor>,
        leaves: Vec<TestCase>,
        results: &mut SpecResults,
    ) -> Result<Option<SharedError>, FatalError> {
        let extensions = self.context.spec_extensions_for(spec);
        let outcome = catch_fault(|| {
            run_chain(&extensions, Arc::clone(spec), move |target| {
                self.run_leaves(target, leaves, results).boxed()
            })
        })
        .await;

        match outcome.and_then(|inner| inner) {
            Ok(()) => Ok(None),
            Err(Fault::Fatal(fatal)) => Err(fatal),
            Err(Fault::Recoverable(err)) => {
                warn!(error = %err, "spec extension failed");
                Ok(Some(err))
            }
        }
    }

    async fn run_leaves(
        &self,
        spec: Arc<SpecDescriptor>,
        leaves: Vec<TestCase>,
        results: &mut SpecResults,
    ) -> SpecOutcome {
        for leaf in leaves {
            let leaf = if Arc::ptr_eq(&spec, leaf.spec()) {
                leaf
            } else {
                leaf.with_spec(Arc::clone(&spec))
            };
            let result = self.run_test(&leaf).await?;
            results.insert(leaf.path().clone(), result);
        }
        Ok(())
    }

    async fn run_test(&self, test: &TestCase) -> Result<TestResult, FatalError> {
        self.listener.test_started(test);
        let result = run_intercepted(self.context, test.clone(), CancellationToken::new(), ExecutionMode::Nested).await?;
        self.listener.test_finished(test, &result);
        Ok(result)
    }
}
