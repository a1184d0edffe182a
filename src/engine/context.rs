//! Immutable process-wide engine context.
//!
//! Built once at startup and passed by reference into every run. Nothing in it is mutated after construction,
//! so runs read it without locking.

use std::sync::Arc;

use super::config::EngineConfig;
use super::extension::{SpecExtension, TestCaseExtension};
use super::spec::SpecDescriptor;
use super::test_case::TestCase;

/// Extensions registered for every spec, appended after the spec's own.
#[derive(Clone, Default)]
pub struct ExtensionRegistry {
    spec: Vec<Arc<SpecExtension>>,
    test: Vec<Arc<TestCaseExtension>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_spec_extension(mut self, extension: Arc<SpecExtension>) -> Self {
        self.spec.push(extension);
        self
    }

    pub fn with_test_extension(mut self, extension: Arc<TestCaseExtension>) -> Self {
        self.test.push(extension);
        self
    }

    pub fn spec_extensions(&self) -> &[Arc<SpecExtension>] {
        &self.spec
    }

    pub fn test_extensions(&self) -> &[Arc<TestCaseExtension>] {
        &self.test
    }
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("spec", &self.spec.iter().map(|e| e.name()).collect::<Vec<_>>())
            .field("test", &self.test.iter().map(|e| e.name()).collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Clone, Debug, Default)]
pub struct EngineContext {
    config: EngineConfig,
    extensions: ExtensionRegistry,
}

impl EngineContext {
    pub fn new(config: EngineConfig, extensions: ExtensionRegistry) -> Self {
        EngineContext { config, extensions }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn extensions(&self) -> &ExtensionRegistry {
        &self.extensions
    }

    /// The spec's own extensions in declaration order, then the process-wide ones.
    pub fn spec_extensions_for(&self, spec: &SpecDescriptor) -> Vec<Arc<SpecExtension>> {
        spec.extensions()
            .iter()
            .chain(self.extensions.spec_extensions())
            .cloned()
            .collect()
    }

    /// Spec-wide test extensions, then the test's own (outer containers first), then the process-wide ones.
    pub fn test_extensions_for(&self, test: &TestCase) -> Vec<Arc<TestCaseExtension>> {
        let mut out: Vec<Arc<TestCaseExtension>> = test.spec().test_extensions().to_vec();
        let mut lineage: Vec<TestCase> = test.ancestors().collect();
        lineage.reverse();
        for node in lineage.iter().chain(std::iter::once(test)) {
            out.extend(node.config().extensions.iter().cloned());
        }
        out.extend(self.extensions.test_extensions().iter().cloned());
        out
    }
}
