//! Built-in extensions.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{self, BoxFuture};

use super::extension::{Interceptor, Proceed, SpecOutcome, TestOutcome};
use super::result::TestResult;
use super::spec::SpecDescriptor;
use super::test_case::TestCase;

fn ignored<'a>() -> BoxFuture<'a, TestOutcome> {
    future::ready(Ok(TestResult::Ignored)).boxed()
}

/// Ignores tests for which the predicate is false.
pub struct EnabledIf {
    predicate: Box<dyn Fn(&TestCase) -> bool + Send + Sync>,
}

impl EnabledIf {
    pub fn new(predicate: impl Fn(&TestCase) -> bool + Send + Sync + 'static) -> Self {
        EnabledIf {
            predicate: Box::new(predicate),
        }
    }
}

impl Interceptor<TestCase, TestOutcome> for EnabledIf {
    fn name(&self) -> &str {
        "enabled-if"
    }

    fn intercept<'a>(&'a self, test: TestCase, proceed: Proceed<'a, TestCase, TestOutcome>) -> BoxFuture<'a, TestOutcome> {
        if (self.predicate)(&test) {
            proceed.run(test)
        } else {
            tracing::debug!(test = %test.path(), "disabled by predicate");
            ignored()
        }
    }
}

/// Runs only tests whose effective tags match.
///
/// A test is excluded when it carries any excluded tag, or when include tags are set and it carries none of them.
#[derive(Clone, Debug, Default)]
pub struct TagFilter {
    include: BTreeSet<String>,
    exclude: BTreeSet<String>,
}

impl TagFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, tag: impl Into<String>) -> Self {
        self.include.insert(tag.into());
        self
    }

    pub fn exclude(mut self, tag: impl Into<String>) -> Self {
        self.exclude.insert(tag.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }

    pub fn allows(&self, tags: &BTreeSet<String>) -> bool {
        if !self.exclude.is_disjoint(tags) {
            return false;
        }
        self.include.is_empty() || !self.include.is_disjoint(tags)
    }
}

impl Interceptor<TestCase, TestOutcome> for TagFilter {
    fn name(&self) -> &str {
        "tag-filter"
    }

    fn intercept<'a>(&'a self, test: TestCase, proceed: Proceed<'a, TestCase, TestOutcome>) -> BoxFuture<'a, TestOutcome> {
        if self.allows(&test.effective_tags()) {
            proceed.run(test)
        } else {
            tracing::debug!(test = %test.path(), "excluded by tags");
            ignored()
        }
    }
}

/// Runs only tests whose full path contains the given text.
#[derive(Clone, Debug)]
pub struct NameFilter {
    pattern: String,
}

impl NameFilter {
    pub fn new(pattern: impl Into<String>) -> Self {
        NameFilter {
            pattern: pattern.into(),
        }
    }
}

impl Interceptor<TestCase, TestOutcome> for NameFilter {
    fn name(&self) -> &str {
        "name-filter"
    }

    fn intercept<'a>(&'a self, test: TestCase, proceed: Proceed<'a, TestCase, TestOutcome>) -> BoxFuture<'a, TestOutcome> {
        if test.path().to_string().contains(&self.pattern) {
            proceed.run(test)
        } else {
            ignored()
        }
    }
}

/// Continues with a copy of the test whose timeout is replaced.
#[derive(Clone, Copy, Debug)]
pub struct TimeoutOverride(pub Duration);

impl Interceptor<TestCase, TestOutcome> for TimeoutOverride {
    fn name(&self) -> &str {
        "timeout-override"
    }

    fn intercept<'a>(&'a self, test: TestCase, proceed: Proceed<'a, TestCase, TestOutcome>) -> BoxFuture<'a, TestOutcome> {
        proceed.run(test.with_timeout(self.0))
    }
}

/// Skips a whole isolation scope when the predicate holds. Skipped tests produce no results.
pub struct SkipSpecIf {
    predicate: Box<dyn Fn(&SpecDescriptor) -> bool + Send + Sync>,
}

impl SkipSpecIf {
    pub fn new(predicate: impl Fn(&SpecDescriptor) -> bool + Send + Sync + 'static) -> Self {
        SkipSpecIf {
            predicate: Box::new(predicate),
        }
    }
}

impl Interceptor<Arc<SpecDescriptor>, SpecOutcome> for SkipSpecIf {
    fn name(&self) -> &str {
        "skip-spec-if"
    }

    fn intercept<'a>(
        &'a self,
        spec: Arc<SpecDescriptor>,
        proceed: Proceed<'a, Arc<SpecDescriptor>, SpecOutcome>,
    ) -> BoxFuture<'a, SpecOutcome> {
        if (self.predicate)(&spec) {
            tracing::info!(spec = %spec.id(), "spec skipped by extension");
            future::ready(Ok(())).boxed()
        } else {
            proceed.run(spec)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn tag_filter_rules() {
        let filter = TagFilter::new().include("fast").exclude("flaky");
        assert!(filter.allows(&tags(&["fast"])));
        assert!(!filter.allows(&tags(&["fast", "flaky"])));
        assert!(!filter.allows(&tags(&["slow"])));
        assert!(!filter.allows(&tags(&[])));

        let open = TagFilter::new();
        assert!(open.is_empty());
        assert!(open.allows(&tags(&[])));
    }
}
