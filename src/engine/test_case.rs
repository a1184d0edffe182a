//! Test-case tree model.
//!
//! A [`TestCase`] is a cheap handle onto one node of a spec instance's tree. Containers own their children and
//! every node keeps a weak link to its parent. Each handle also holds the tree's roots, so a handle keeps its
//! ancestry alive after the [`SpecInstance`] that built it is dropped.
//!
//! Identity across instances is the [`TestPath`]: the names from the root down to the node. Names are unique
//! among siblings, so a path pins one node in every instance built from the same factory.
//!
//! [`SpecInstance`]: super::spec::SpecInstance

use std::collections::BTreeSet;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use spectest_core::BoxError;

use super::config::resolve_timeout;
use super::extension::TestCaseExtension;
use super::result::TestResult;
use super::spec::SpecDescriptor;
use super::test_context::TestContext;

/// Name prefix that disables a test.
pub const DISABLED_PREFIX: char = '!';
/// Name prefix that focuses a top-level test; when any top-level test is focused, the others are inactive.
pub const FOCUS_PREFIX: &str = "f:";

/// Executable body of a leaf test.
pub type TestBody = Arc<dyn Fn(TestContext) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;
/// Hook run before every active leaf of the spec.
pub type BeforeTestHook = Arc<dyn Fn(TestCase) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;
/// Hook run after every active leaf of the spec, with the classified result.
pub type AfterTestHook = Arc<dyn Fn(TestCase, TestResult) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;
/// Extra activity predicate evaluated per test.
pub type ActivePredicate = Arc<dyn Fn(&TestCase) -> bool + Send + Sync>;

// ============================================================================
// Paths
// ============================================================================

/// Names from the root of the tree down to a test case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TestPath(Vec<String>);

impl TestPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TestPath(segments.into_iter().map(Into::into).collect())
    }

    pub fn root(name: impl Into<String>) -> Self {
        TestPath(vec![name.into()])
    }

    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.into());
        TestPath(segments)
    }

    /// Last segment; empty only for the (never constructed) empty path.
    pub fn name(&self) -> &str {
        self.0.last().map(String::as_str).unwrap_or("")
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_top_level(&self) -> bool {
        self.0.len() == 1
    }

    /// Whether `self` equals `other` or lies underneath it.
    pub fn starts_with(&self, other: &TestPath) -> bool {
        self.0.starts_with(&other.0)
    }
}

impl fmt::Display for TestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(" -- "))
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestType {
    Container,
    Test,
}

/// Per-test configuration as declared; inherited values are resolved on demand.
#[derive(Clone)]
pub struct TestConfig {
    pub enabled: bool,
    pub enabled_if: Option<ActivePredicate>,
    pub timeout: Option<Duration>,
    pub tags: BTreeSet<String>,
    pub extensions: Vec<Arc<TestCaseExtension>>,
}

impl Default for TestConfig {
    fn default() -> Self {
        TestConfig {
            enabled: true,
            enabled_if: None,
            timeout: None,
            tags: BTreeSet::new(),
            extensions: Vec::new(),
        }
    }
}

impl TestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn enabled_if(mut self, predicate: impl Fn(&TestCase) -> bool + Send + Sync + 'static) -> Self {
        self.enabled_if = Some(Arc::new(predicate));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn extension(mut self, extension: Arc<TestCaseExtension>) -> Self {
        self.extensions.push(extension);
        self
    }
}

impl fmt::Debug for TestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestConfig")
            .field("enabled", &self.enabled)
            .field("enabled_if", &self.enabled_if.is_some())
            .field("timeout", &self.timeout)
            .field("tags", &self.tags)
            .field("extensions", &self.extensions.len())
            .finish()
    }
}

/// Before/after hooks declared on a spec instance; shared by all of its leaves.
#[derive(Clone, Default)]
pub(crate) struct Hooks {
    pub(crate) before_test: Vec<BeforeTestHook>,
    pub(crate) after_test: Vec<AfterTestHook>,
}

// ============================================================================
// Tree nodes
// ============================================================================

#[derive(Clone)]
pub(crate) enum NodeKind {
    Container(Vec<Arc<TestNode>>),
    Test(TestBody),
}

#[derive(Clone)]
pub(crate) struct TestNode {
    pub(crate) path: TestPath,
    pub(crate) parent: Weak<TestNode>,
    pub(crate) kind: NodeKind,
    pub(crate) config: TestConfig,
    pub(crate) spec: Arc<SpecDescriptor>,
    pub(crate) hooks: Arc<Hooks>,
    /// Set when another top-level test is focused and this one is not.
    pub(crate) unfocused: bool,
}

/// Strong owner of one instance's top-level nodes.
pub(crate) struct TestTree {
    roots: Vec<Arc<TestNode>>,
}

impl TestTree {
    pub(crate) fn new(roots: Vec<Arc<TestNode>>) -> Arc<Self> {
        Arc::new(TestTree { roots })
    }

    /// Handles onto the top-level nodes, in declaration order.
    pub(crate) fn root_cases(self: &Arc<Self>) -> Vec<TestCase> {
        self.roots
            .iter()
            .map(|node| TestCase {
                node: Arc::clone(node),
                tree: Arc::clone(self),
            })
            .collect()
    }
}

/// Handle onto one node of a spec instance's test tree.
#[derive(Clone)]
pub struct TestCase {
    node: Arc<TestNode>,
    tree: Arc<TestTree>,
}

impl TestCase {
    /// Handle onto another node of the same tree.
    fn at(&self, node: Arc<TestNode>) -> TestCase {
        TestCase {
            node,
            tree: Arc::clone(&self.tree),
        }
    }

    pub fn name(&self) -> &str {
        self.node.path.name()
    }

    pub fn path(&self) -> &TestPath {
        &self.node.path
    }

    pub fn test_type(&self) -> TestType {
        match self.node.kind {
            NodeKind::Container(_) => TestType::Container,
            NodeKind::Test(_) => TestType::Test,
        }
    }

    pub fn is_container(&self) -> bool {
        self.test_type() == TestType::Container
    }

    pub fn is_leaf(&self) -> bool {
        self.test_type() == TestType::Test
    }

    pub fn config(&self) -> &TestConfig {
        &self.node.config
    }

    pub fn spec(&self) -> &Arc<SpecDescriptor> {
        &self.node.spec
    }

    /// The enclosing container; `None` for top-level tests.
    pub fn parent(&self) -> Option<TestCase> {
        self.node.parent.upgrade().map(|node| self.at(node))
    }

    /// Enclosing containers, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = TestCase> + use<> {
        std::iter::successors(self.parent(), TestCase::parent)
    }

    pub fn children(&self) -> Vec<TestCase> {
        match &self.node.kind {
            NodeKind::Container(children) => children.iter().map(|child| self.at(Arc::clone(child))).collect(),
            NodeKind::Test(_) => Vec::new(),
        }
    }

    /// Leaves at or below this node, in declaration order.
    pub fn leaves(&self) -> Vec<TestCase> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves(&self, out: &mut Vec<TestCase>) {
        match &self.node.kind {
            NodeKind::Test(_) => out.push(self.clone()),
            NodeKind::Container(children) => {
                for child in children {
                    self.at(Arc::clone(child)).collect_leaves(out);
                }
            }
        }
    }

    /// Find the node at `path` at or below this one.
    pub fn find(&self, path: &TestPath) -> Option<TestCase> {
        if self.path() == path {
            return Some(self.clone());
        }
        if !path.starts_with(self.path()) {
            return None;
        }
        self.children().into_iter().find_map(|child| child.find(path))
    }

    /// Whether this test should run.
    ///
    /// Every node from the root down must be enabled, not bang-disabled (`!name`), allowed by its `enabled_if`
    /// predicate and not excluded by focus.
    pub fn is_active(&self) -> bool {
        self.is_self_active() && self.ancestors().all(|a| a.is_self_active())
    }

    fn is_self_active(&self) -> bool {
        let config = &self.node.config;
        config.enabled
            && !self.name().starts_with(DISABLED_PREFIX)
            && !self.node.unfocused
            && config.enabled_if.as_ref().is_none_or(|predicate| predicate(self))
    }

    /// Whether this is a focused top-level test (`f:` prefix).
    pub fn is_focused(&self) -> bool {
        self.path().is_top_level() && self.name().starts_with(FOCUS_PREFIX)
    }

    /// Tags declared on this test and all of its containers.
    pub fn effective_tags(&self) -> BTreeSet<String> {
        let mut tags = self.node.config.tags.clone();
        for ancestor in self.ancestors() {
            tags.extend(ancestor.node.config.tags.iter().cloned());
        }
        tags
    }

    /// Timeout for this test given the engine default; see [`resolve_timeout`].
    pub fn resolved_timeout(&self, engine_default: Duration) -> Duration {
        resolve_timeout(
            self.node.config.timeout,
            self.ancestors().map(|a| a.node.config.timeout),
            self.node.spec.timeout(),
            engine_default,
        )
    }

    /// Copy of this test case with a different timeout override. Identity (path, parent, body) is unchanged.
    pub fn with_timeout(&self, timeout: Duration) -> TestCase {
        let mut node = (*self.node).clone();
        node.config.timeout = Some(timeout);
        self.at(Arc::new(node))
    }

    /// Copy of this test case that resolves its spec timeout and spec-wide extensions from `spec`.
    pub fn with_spec(&self, spec: Arc<SpecDescriptor>) -> TestCase {
        let mut node = (*self.node).clone();
        node.spec = spec;
        self.at(Arc::new(node))
    }

    pub(crate) fn body(&self) -> Option<&TestBody> {
        match &self.node.kind {
            NodeKind::Test(body) => Some(body),
            NodeKind::Container(_) => None,
        }
    }

    pub(crate) fn hooks(&self) -> &Hooks {
        &self.node.hooks
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("path", &self.node.path)
            .field("type", &self.test_type())
            .field("spec", self.node.spec.id())
            .finish()
    }
}
