//! Test results and the per-spec results map.

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use indexmap::map::Iter;
use serde::Serialize;
use spectest_core::{BoxError, SharedError};

use super::test_case::TestPath;

/// Outcome of one leaf test. Created once, never mutated.
#[derive(Clone)]
pub enum TestResult {
    Success { duration: Duration },
    Failure { error: SharedError, duration: Duration },
    Ignored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Success,
    Failure,
    Ignored,
}

impl TestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Success => "success",
            TestStatus::Failure => "failure",
            TestStatus::Ignored => "ignored",
        }
    }
}

impl TestResult {
    pub fn success(duration: Duration) -> Self {
        TestResult::Success { duration }
    }

    pub fn failure(error: impl Into<BoxError>, duration: Duration) -> Self {
        TestResult::Failure {
            error: SharedError::from(error.into()),
            duration,
        }
    }

    pub fn from_shared(error: SharedError, duration: Duration) -> Self {
        TestResult::Failure { error, duration }
    }

    pub fn status(&self) -> TestStatus {
        match self {
            TestResult::Success { .. } => TestStatus::Success,
            TestResult::Failure { .. } => TestStatus::Failure,
            TestResult::Ignored => TestStatus::Ignored,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestResult::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TestResult::Failure { .. })
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, TestResult::Ignored)
    }

    /// Elapsed wall time; zero for ignored tests.
    pub fn duration(&self) -> Duration {
        match self {
            TestResult::Success { duration } | TestResult::Failure { duration, .. } => *duration,
            TestResult::Ignored => Duration::ZERO,
        }
    }

    pub fn error(&self) -> Option<&SharedError> {
        match self {
            TestResult::Failure { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Debug for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestResult::Success { duration } => f.debug_struct("Success").field("duration", duration).finish(),
            TestResult::Failure { error, duration } => f
                .debug_struct("Failure")
                .field("error", &error.to_string())
                .field("duration", duration)
                .finish(),
            TestResult::Ignored => f.write_str("Ignored"),
        }
    }
}

/// Results of one spec run, keyed by test path, in execution order.
#[derive(Clone, Debug, Default)]
pub struct SpecResults {
    results: IndexMap<TestPath, TestResult>,
}

impl SpecResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a result. Returns `false` (and keeps the first result) if the path already has one.
    pub fn insert(&mut self, path: TestPath, result: TestResult) -> bool {
        if self.results.contains_key(&path) {
            return false;
        }
        self.results.insert(path, result);
        true
    }

    pub fn get(&self, path: &TestPath) -> Option<&TestResult> {
        self.results.get(path)
    }

    pub fn iter(&self) -> Iter<'_, TestPath, TestResult> {
        self.results.iter()
    }

    pub fn paths(&self) -> impl Iterator<Item = &TestPath> {
        self.results.keys()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn extend(&mut self, other: SpecResults) {
        for (path, result) in other.results {
            self.insert(path, result);
        }
    }

    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for result in self.results.values() {
            match result.status() {
                TestStatus::Success => summary.passed += 1,
                TestStatus::Failure => summary.failed += 1,
                TestStatus::Ignored => summary.ignored += 1,
            }
            summary.duration += result.duration();
        }
        summary
    }
}

impl<'a> IntoIterator for &'a SpecResults {
    type Item = (&'a TestPath, &'a TestResult);
    type IntoIter = Iter<'a, TestPath, TestResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Counts for reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    pub ignored: usize,
    #[serde(serialize_with = "serialize_millis")]
    pub duration: Duration,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.ignored
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn merge(&mut self, other: Summary) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.ignored += other.ignored;
        self.duration += other.duration;
    }
}

pub(crate) fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}
