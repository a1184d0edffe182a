//! Spec construction.
//!
//! Specs are registered explicitly: discovery hands the engine a [`SpecRegistry`] mapping each spec id to its
//! descriptor and a factory that declares the test tree on a fresh [`SpecBuilder`]. Every call to the factory
//! produces an independent instance with its own captured state.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use indexmap::IndexMap;
use spectest_core::{BoxError, FatalError, Fault, Try};

use super::error::EngineError;
use super::spec::{SpecBuilder, SpecDescriptor, SpecId, SpecInstance};

/// Declares the tests (and hooks) of one spec instance.
pub type SpecFactory = Arc<dyn Fn(&mut SpecBuilder) -> Result<(), BoxError> + Send + Sync>;

/// Builds spec instances on demand.
pub trait SpecInstantiator: Send + Sync {
    /// Construct a fresh instance. Recoverable failures come back as `Try::Failure`, fatal ones as `Err`.
    fn construct(&self, spec: &Arc<SpecDescriptor>) -> Result<Try<SpecInstance>, FatalError>;
}

#[derive(Clone)]
struct Registration {
    descriptor: Arc<SpecDescriptor>,
    factory: SpecFactory,
}

/// Specs known to the engine, in registration order.
#[derive(Clone, Default)]
pub struct SpecRegistry {
    specs: IndexMap<SpecId, Registration>,
}

impl SpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spec. A later registration with the same id replaces the earlier one.
    pub fn register<F>(&mut self, descriptor: SpecDescriptor, factory: F) -> Arc<SpecDescriptor>
    where
        F: Fn(&mut SpecBuilder) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let descriptor = Arc::new(descriptor);
        let registration = Registration {
            descriptor: Arc::clone(&descriptor),
            factory: Arc::new(factory),
        };
        if self.specs.insert(descriptor.id().clone(), registration).is_some() {
            tracing::warn!(spec = %descriptor.id(), "spec registered twice; keeping the latest factory");
        }
        descriptor
    }

    pub fn get(&self, id: &SpecId) -> Option<&Arc<SpecDescriptor>> {
        self.specs.get(id).map(|r| &r.descriptor)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &Arc<SpecDescriptor>> {
        self.specs.values().map(|r| &r.descriptor)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

impl SpecInstantiator for SpecRegistry {
    fn construct(&self, spec: &Arc<SpecDescriptor>) -> Result<Try<SpecInstance>, FatalError> {
        let Some(registration) = self.specs.get(spec.id()) else {
            return Ok(Try::failure(EngineError::UnknownSpec(spec.id().clone())));
        };
        let factory = Arc::clone(&registration.factory);
        let built = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut builder = SpecBuilder::new();
            factory(&mut builder)?;
            builder.build(Arc::clone(spec)).map_err(BoxError::from)
        }));
        let fault = match built {
            Ok(Ok(instance)) => return Ok(Try::Success(instance)),
            Ok(Err(err)) => Fault::classify(err),
            Err(payload) => Fault::from_panic(payload),
        };
        let source = fault.into_recoverable()?;
        Ok(Try::failure(EngineError::Instantiation {
            spec: spec.id().clone(),
            source,
        }))
    }
}

impl fmt::Debug for SpecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.specs.keys()).finish()
    }
}
