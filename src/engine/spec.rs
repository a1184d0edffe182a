//! Specs: descriptors, isolation modes, and the builder a spec factory fills in.
//!
//! A [`SpecDescriptor`] is the immutable, discovery-owned description of a spec (id, isolation mode, declared
//! extensions). A [`SpecInstance`] is one materialized test tree produced by running the spec's factory against a
//! fresh [`SpecBuilder`]; the isolation mode decides how many instances a run constructs.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use serde::Serialize;
use spectest_core::BoxError;

use super::error::EngineError;
use super::extension::{SpecExtension, TestCaseExtension};
use super::result::TestResult;
use super::test_case::{
    AfterTestHook, BeforeTestHook, FOCUS_PREFIX, Hooks, NodeKind, TestBody, TestCase, TestConfig, TestNode, TestPath,
    TestTree,
};
use super::test_context::TestContext;

// ============================================================================
// Identity and isolation
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SpecId(String);

impl SpecId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SpecId {
    fn from(id: &str) -> Self {
        SpecId(id.to_string())
    }
}

impl From<String> for SpecId {
    fn from(id: String) -> Self {
        SpecId(id)
    }
}

impl fmt::Display for SpecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How spec instances are shared between the test cases of one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IsolationMode {
    /// One instance for the whole tree.
    #[default]
    SharedInstance,
    /// One instance per top-level test (or group).
    FreshPerTest,
    /// One instance per leaf test.
    FreshPerLeaf,
}

impl IsolationMode {
    pub fn as_str(self) -> &'static str {
        match self {
            IsolationMode::SharedInstance => "shared",
            IsolationMode::FreshPerTest => "fresh-per-test",
            IsolationMode::FreshPerLeaf => "fresh-per-leaf",
        }
    }
}

impl fmt::Display for IsolationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IsolationMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" | "shared-instance" => Ok(IsolationMode::SharedInstance),
            "fresh-per-test" | "per-test" => Ok(IsolationMode::FreshPerTest),
            "fresh-per-leaf" | "per-leaf" => Ok(IsolationMode::FreshPerLeaf),
            other => Err(EngineError::Config(format!(
                "unknown isolation mode `{other}` (expected shared, fresh-per-test or fresh-per-leaf)"
            ))),
        }
    }
}

// ============================================================================
// Descriptor
// ============================================================================

/// Discovery-owned description of a spec. Read-only to the engine.
#[derive(Clone)]
pub struct SpecDescriptor {
    id: SpecId,
    isolation: IsolationMode,
    timeout: Option<Duration>,
    extensions: Vec<Arc<SpecExtension>>,
    test_extensions: Vec<Arc<TestCaseExtension>>,
}

impl SpecDescriptor {
    pub fn new(id: impl Into<SpecId>) -> Self {
        SpecDescriptor {
            id: id.into(),
            isolation: IsolationMode::default(),
            timeout: None,
            extensions: Vec::new(),
            test_extensions: Vec::new(),
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationMode) -> Self {
        self.isolation = isolation;
        self
    }

    /// Spec-level default timeout for its tests.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_extension(mut self, extension: Arc<SpecExtension>) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Test-case extension applied to every test of this spec.
    pub fn with_test_extension(mut self, extension: Arc<TestCaseExtension>) -> Self {
        self.test_extensions.push(extension);
        self
    }

    pub fn id(&self) -> &SpecId {
        &self.id
    }

    pub fn isolation(&self) -> IsolationMode {
        self.isolation
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn extensions(&self) -> &[Arc<SpecExtension>] {
        &self.extensions
    }

    pub fn test_extensions(&self) -> &[Arc<TestCaseExtension>] {
        &self.test_extensions
    }
}

impl fmt::Debug for SpecDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecDescriptor")
            .field("id", &self.id)
            .field("isolation", &self.isolation)
            .field("timeout", &self.timeout)
            .field("extensions", &self.extensions.len())
            .field("test_extensions", &self.test_extensions.len())
            .finish()
    }
}

// ============================================================================
// Builder
// ============================================================================

struct TestDecl {
    name: String,
    config: TestConfig,
    kind: DeclKind,
}

enum DeclKind {
    Container(Vec<TestDecl>),
    Test(TestBody),
}

fn boxed_body<F, Fut>(body: F) -> TestBody
where
    F: Fn(TestContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move |ctx| body(ctx).boxed())
}

/// Declarations inside a container (or at the top level of a spec).
#[derive(Default)]
pub struct ContainerBuilder {
    tests: Vec<TestDecl>,
}

impl ContainerBuilder {
    pub fn test<F, Fut>(&mut self, name: impl Into<String>, body: F) -> &mut Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.test_with(name, TestConfig::default(), body)
    }

    pub fn test_with<F, Fut>(&mut self, name: impl Into<String>, config: TestConfig, body: F) -> &mut Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.tests.push(TestDecl {
            name: name.into(),
            config,
            kind: DeclKind::Test(boxed_body(body)),
        });
        self
    }

    pub fn context(&mut self, name: impl Into<String>, define: impl FnOnce(&mut ContainerBuilder)) -> &mut Self {
        self.context_with(name, TestConfig::default(), define)
    }

    pub fn context_with(
        &mut self,
        name: impl Into<String>,
        config: TestConfig,
        define: impl FnOnce(&mut ContainerBuilder),
    ) -> &mut Self {
        let mut inner = ContainerBuilder::default();
        define(&mut inner);
        self.tests.push(TestDecl {
            name: name.into(),
            config,
            kind: DeclKind::Container(inner.tests),
        });
        self
    }
}

/// What a spec factory fills in: the test tree plus before/after hooks.
#[derive(Default)]
pub struct SpecBuilder {
    root: ContainerBuilder,
    hooks: Hooks,
}

impl SpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test<F, Fut>(&mut self, name: impl Into<String>, body: F) -> &mut Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.root.test(name, body);
        self
    }

    pub fn test_with<F, Fut>(&mut self, name: impl Into<String>, config: TestConfig, body: F) -> &mut Self
    where
        F: Fn(TestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.root.test_with(name, config, body);
        self
    }

    pub fn context(&mut self, name: impl Into<String>, define: impl FnOnce(&mut ContainerBuilder)) -> &mut Self {
        self.root.context(name, define);
        self
    }

    pub fn context_with(
        &mut self,
        name: impl Into<String>,
        config: TestConfig,
        define: impl FnOnce(&mut ContainerBuilder),
    ) -> &mut Self {
        self.root.context_with(name, config, define);
        self
    }

    /// Run before every active leaf, in registration order.
    pub fn before_test<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(TestCase) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let hook: BeforeTestHook = Arc::new(move |test| hook(test).boxed());
        self.hooks.before_test.push(hook);
        self
    }

    /// Run after every active leaf with its classified result, in registration order.
    pub fn after_test<F, Fut>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(TestCase, TestResult) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let hook: AfterTestHook = Arc::new(move |test, result| hook(test, result).boxed());
        self.hooks.after_test.push(hook);
        self
    }

    /// Materialize the declared tree for `spec`.
    pub fn build(self, spec: Arc<SpecDescriptor>) -> Result<SpecInstance, EngineError> {
        check_unique(spec.id().as_str(), &self.root.tests)?;
        let focus_mode = self.root.tests.iter().any(|t| t.name.starts_with(FOCUS_PREFIX));
        let hooks = Arc::new(self.hooks);
        let roots = self
            .root
            .tests
            .into_iter()
            .map(|decl| {
                let unfocused = focus_mode && !decl.name.starts_with(FOCUS_PREFIX);
                let path = TestPath::root(decl.name.clone());
                materialize(decl, path, Weak::new(), &spec, &hooks, unfocused)
            })
            .collect();
        let roots = TestTree::new(roots).root_cases();
        Ok(SpecInstance { spec, roots })
    }
}

fn check_unique(parent: &str, siblings: &[TestDecl]) -> Result<(), EngineError> {
    let mut seen = HashSet::new();
    for decl in siblings {
        if !seen.insert(decl.name.as_str()) {
            return Err(EngineError::DuplicateTest {
                parent: parent.to_string(),
                name: decl.name.clone(),
            });
        }
        if let DeclKind::Container(children) = &decl.kind {
            check_unique(&decl.name, children)?;
        }
    }
    Ok(())
}

fn materialize(
    decl: TestDecl,
    path: TestPath,
    parent: Weak<TestNode>,
    spec: &Arc<SpecDescriptor>,
    hooks: &Arc<Hooks>,
    unfocused: bool,
) -> Arc<TestNode> {
    Arc::new_cyclic(|me: &Weak<TestNode>| {
        let kind = match decl.kind {
            DeclKind::Test(body) => NodeKind::Test(body),
            DeclKind::Container(children) => NodeKind::Container(
                children
                    .into_iter()
                    .map(|child| {
                        let child_path = path.child(child.name.clone());
                        materialize(child, child_path, me.clone(), spec, hooks, unfocused)
                    })
                    .collect(),
            ),
        };
        TestNode {
            path,
            parent,
            kind,
            config: decl.config,
            spec: Arc::clone(spec),
            hooks: Arc::clone(hooks),
            unfocused,
        }
    })
}

// ============================================================================
// Instance
// ============================================================================

/// One materialized test tree. Nodes link weakly to their parents; every handle shares ownership of the roots.
pub struct SpecInstance {
    spec: Arc<SpecDescriptor>,
    roots: Vec<TestCase>,
}

impl SpecInstance {
    pub fn spec(&self) -> &Arc<SpecDescriptor> {
        &self.spec
    }

    /// Top-level tests and containers, in declaration order.
    pub fn roots(&self) -> &[TestCase] {
        &self.roots
    }

    /// Every leaf, depth-first in declaration order.
    pub fn leaves(&self) -> Vec<TestCase> {
        self.roots.iter().flat_map(TestCase::leaves).collect()
    }

    pub fn find(&self, path: &TestPath) -> Option<TestCase> {
        self.roots.iter().find_map(|root| root.find(path))
    }
}

impl fmt::Debug for SpecInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecInstance")
            .field("spec", self.spec.id())
            .field("roots", &self.roots)
            .finish()
    }
}
