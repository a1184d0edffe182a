//! The spec execution engine.
//!
//! ## Pipeline
//!
//! ```text
//! SpecRegistry ──construct──▶ SpecInstance(s) ──scope──▶ spec extension chain
//!                                                         │
//!                                                         ▼ per leaf, in declaration order
//!                                      test extension chain ──▶ TestExecutor ──▶ TestResult
//! ```
//!
//! - [`spec`] / [`test_case`]: the declared tree and its identity ([`TestPath`]).
//! - [`instantiate`]: explicit spec registry; one factory call per instance.
//! - [`runner`]: isolation modes, scope selection, result collection.
//! - [`extension`]: the generic interception chain used at both levels.
//! - [`executor`]: hooks, timeout, classification for one leaf.
//! - [`flat`]: single-test execution with a cancellable handle.
//!
//! Errors split into recoverable ones, which become results, and fatal ones ([`FatalError`]), which every layer
//! returns as `Err` without wrapping.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod builtin;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod extension;
pub mod flat;
pub mod instantiate;
pub mod listener;
pub mod result;
pub mod runner;
pub mod spec;
pub mod test_case;
pub mod test_context;

use std::sync::Arc;

use spectest_core::{FatalError, Try};

pub use builtin::{EnabledIf, NameFilter, SkipSpecIf, TagFilter, TimeoutOverride};
pub use config::{DEFAULT_TIMEOUT, EngineConfig, TIMEOUT_ENV, resolve_timeout};
pub use context::{EngineContext, ExtensionRegistry};
pub use error::EngineError;
pub use executor::TestExecutor;
pub use extension::{Interceptor, Proceed, SpecExtension, SpecOutcome, TestCaseExtension, TestOutcome, run_chain};
pub use flat::{TestHandle, run_single_test};
pub use instantiate::{SpecFactory, SpecInstantiator, SpecRegistry};
pub use listener::{CompositeListener, EngineEvent, EngineListener, NoopListener, RecordingListener};
pub use result::{SpecResults, Summary, TestResult, TestStatus};
pub use runner::SpecRunner;
pub use spec::{ContainerBuilder, IsolationMode, SpecBuilder, SpecDescriptor, SpecId, SpecInstance};
pub use test_case::{TestCase, TestConfig, TestPath, TestType};
pub use test_context::{ExecutionMode, TestContext};

/// Registry, context and listener bundled for callers that run specs by id.
#[derive(Clone)]
pub struct Engine {
    context: Arc<EngineContext>,
    registry: Arc<SpecRegistry>,
    listener: Arc<dyn EngineListener>,
}

impl Engine {
    pub fn new(context: EngineContext, registry: SpecRegistry) -> Self {
        Engine {
            context: Arc::new(context),
            registry: Arc::new(registry),
            listener: Arc::new(NoopListener),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn EngineListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.context
    }

    pub fn registry(&self) -> &SpecRegistry {
        &self.registry
    }

    fn runner(&self) -> SpecRunner<'_> {
        SpecRunner::new(&self.context, self.registry.as_ref(), self.listener.as_ref())
    }

    /// Run one registered spec. An unknown id is reported like any other instantiation failure.
    pub async fn run_spec(&self, id: &SpecId) -> Result<Try<SpecResults>, FatalError> {
        let spec = match self.registry.get(id) {
            Some(spec) => Arc::clone(spec),
            None => Arc::new(SpecDescriptor::new(id.clone())),
        };
        self.runner().run_spec(&spec).await
    }

    /// Run every registered spec sequentially, in registration order.
    pub async fn run_all(&self) -> Result<Vec<(SpecId, Try<SpecResults>)>, FatalError> {
        let mut out = Vec::with_capacity(self.registry.len());
        for spec in self.registry.descriptors() {
            let outcome = self.runner().run_spec(spec).await?;
            out.push((spec.id().clone(), outcome));
        }
        Ok(out)
    }

    /// Start one leaf test in flat mode; see [`run_single_test`].
    pub fn run_single_test(&self, test: TestCase) -> Result<TestHandle, EngineError> {
        flat::run_single_test(Arc::clone(&self.context), test)
    }
}
