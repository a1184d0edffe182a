//! Engine listener: per-event notifications pushed while a spec runs.

use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use spectest_core::SharedError;

use super::result::{SpecResults, Summary, TestResult, TestStatus, serialize_millis};
use super::spec::{SpecDescriptor, SpecId};
use super::test_case::{TestCase, TestPath};

/// Receives engine events. All methods default to doing nothing.
pub trait EngineListener: Send + Sync {
    fn spec_started(&self, _spec: &SpecDescriptor) {}

    fn spec_instantiated(&self, _spec: &SpecDescriptor) {}

    fn spec_instantiation_error(&self, _spec: &SpecDescriptor, _error: &SharedError) {}

    fn test_started(&self, _test: &TestCase) {}

    fn test_finished(&self, _test: &TestCase, _result: &TestResult) {}

    fn spec_finished(&self, _spec: &SpecDescriptor, _results: &SpecResults) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopListener;

impl EngineListener for NoopListener {}

/// Serializable record of one listener call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    SpecStarted {
        spec: SpecId,
    },
    SpecInstantiated {
        spec: SpecId,
    },
    SpecInstantiationError {
        spec: SpecId,
        error: String,
    },
    TestStarted {
        spec: SpecId,
        path: TestPath,
    },
    TestFinished {
        spec: SpecId,
        path: TestPath,
        status: TestStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(serialize_with = "serialize_millis")]
        duration: Duration,
    },
    SpecFinished {
        spec: SpecId,
        summary: Summary,
    },
}

impl EngineEvent {
    pub fn test_finished(test: &TestCase, result: &TestResult) -> Self {
        EngineEvent::TestFinished {
            spec: test.spec().id().clone(),
            path: test.path().clone(),
            status: result.status(),
            error: result.error().map(|e| e.to_string()),
            duration: result.duration(),
        }
    }
}

/// Collects every event in order; used by tests and the JSON front-end.
#[derive(Debug, Default)]
pub struct RecordingListener {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<EngineEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn push(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}

impl EngineListener for RecordingListener {
    fn spec_started(&self, spec: &SpecDescriptor) {
        self.push(EngineEvent::SpecStarted { spec: spec.id().clone() });
    }

    fn spec_instantiated(&self, spec: &SpecDescriptor) {
        self.push(EngineEvent::SpecInstantiated { spec: spec.id().clone() });
    }

    fn spec_instantiation_error(&self, spec: &SpecDescriptor, error: &SharedError) {
        self.push(EngineEvent::SpecInstantiationError {
            spec: spec.id().clone(),
            error: error.to_string(),
        });
    }

    fn test_started(&self, test: &TestCase) {
        self.push(EngineEvent::TestStarted {
            spec: test.spec().id().clone(),
            path: test.path().clone(),
        });
    }

    fn test_finished(&self, test: &TestCase, result: &TestResult) {
        self.push(EngineEvent::test_finished(test, result));
    }

    fn spec_finished(&self, spec: &SpecDescriptor, results: &SpecResults) {
        self.push(EngineEvent::SpecFinished {
            spec: spec.id().clone(),
            summary: results.summary(),
        });
    }
}

/// Forwards every event to each inner listener in order.
#[derive(Default)]
pub struct CompositeListener {
    listeners: Vec<Box<dyn EngineListener>>,
}

impl CompositeListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, listener: impl EngineListener + 'static) -> Self {
        self.listeners.push(Box::new(listener));
        self
    }
}

impl EngineListener for CompositeListener {
    fn spec_started(&self, spec: &SpecDescriptor) {
        self.listeners.iter().for_each(|l| l.spec_started(spec));
    }

    fn spec_instantiated(&self, spec: &SpecDescriptor) {
        self.listeners.iter().for_each(|l| l.spec_instantiated(spec));
    }

    fn spec_instantiation_error(&self, spec: &SpecDescriptor, error: &SharedError) {
        self.listeners.iter().for_each(|l| l.spec_instantiation_error(spec, error));
    }

    fn test_started(&self, test: &TestCase) {
        self.listeners.iter().for_each(|l| l.test_started(test));
    }

    fn test_finished(&self, test: &TestCase, result: &TestResult) {
        self.listeners.iter().for_each(|l| l.test_finished(test, result));
    }

    fn spec_finished(&self, spec: &SpecDescriptor, results: &SpecResults) {
        self.listeners.iter().for_each(|l| l.spec_finished(spec, results));
    }
}
