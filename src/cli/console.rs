//! Listeners that print engine events for the demo front-end.
//!
//! `ConsoleListener` prints pytest-style progress (`.`, `F`, `s`) or one line per test in verbose mode, then a
//! failures section and a summary line per spec. `JsonListener` writes one JSON object per event.

use std::io::Write;

use parking_lot::Mutex;
use spectest_core::SharedError;

use crate::engine::{EngineEvent, EngineListener, SpecDescriptor, SpecResults, TestCase, TestResult};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

struct ConsoleState<W> {
    out: W,
    failures: Vec<(String, String)>,
    /// Whether a progress line is open and needs terminating.
    progress: bool,
}

pub struct ConsoleListener<W> {
    state: Mutex<ConsoleState<W>>,
    verbose: bool,
    color: bool,
}

impl<W: Write + Send> ConsoleListener<W> {
    pub fn new(out: W) -> Self {
        ConsoleListener {
            state: Mutex::new(ConsoleState {
                out,
                failures: Vec::new(),
                progress: false,
            }),
            verbose: false,
            color: true,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn into_inner(self) -> W {
        self.state.into_inner().out
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.color {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn status(&self, result: &TestResult) -> String {
        match (result, self.verbose) {
            (TestResult::Success { duration }, true) => {
                format!("{} ({}ms)", self.paint(GREEN, "PASSED"), duration.as_millis())
            }
            (TestResult::Success { .. }, false) => self.paint(GREEN, "."),
            (TestResult::Failure { duration, .. }, true) => {
                format!("{} ({}ms)", self.paint(RED, "FAILED"), duration.as_millis())
            }
            (TestResult::Failure { .. }, false) => self.paint(RED, "F"),
            (TestResult::Ignored, true) => self.paint(YELLOW, "IGNORED"),
            (TestResult::Ignored, false) => self.paint(YELLOW, "s"),
        }
    }
}

impl<W: Write + Send> EngineListener for ConsoleListener<W> {
    fn spec_started(&self, spec: &SpecDescriptor) {
        let mut state = self.state.lock();
        if self.verbose {
            let _ = writeln!(state.out, "{}", self.paint(BOLD, &format!("{} [{}]", spec.id(), spec.isolation())));
        } else {
            let _ = write!(state.out, "{} ", spec.id());
            state.progress = true;
        }
    }

    fn spec_instantiation_error(&self, spec: &SpecDescriptor, error: &SharedError) {
        let mut state = self.state.lock();
        if std::mem::take(&mut state.progress) {
            let _ = writeln!(state.out);
        }
        let _ = writeln!(state.out, "{} {}: {error}", self.paint(RED, "ERROR"), spec.id());
    }

    fn test_started(&self, test: &TestCase) {
        if self.verbose {
            let mut state = self.state.lock();
            let _ = write!(state.out, "  {} ... ", test.path());
        }
    }

    fn test_finished(&self, test: &TestCase, result: &TestResult) {
        let status = self.status(result);
        let mut state = self.state.lock();
        if self.verbose {
            let _ = writeln!(state.out, "{status}");
        } else {
            let _ = write!(state.out, "{status}");
        }
        if let Some(error) = result.error() {
            state.failures.push((test.path().to_string(), error.to_string()));
        }
    }

    fn spec_finished(&self, spec: &SpecDescriptor, results: &SpecResults) {
        let summary = results.summary();
        let mut state = self.state.lock();
        if std::mem::take(&mut state.progress) {
            let _ = writeln!(state.out);
        }

        let failures = std::mem::take(&mut state.failures);
        if !failures.is_empty() {
            let _ = writeln!(state.out, "{}", self.paint(RED, "------ FAILURES ------"));
            for (path, message) in failures {
                let _ = writeln!(state.out, "{} -- {path}", spec.id());
                let _ = writeln!(state.out, "    {message}");
            }
        }

        let mut parts = Vec::new();
        if summary.passed > 0 {
            parts.push(format!("{} passed", summary.passed));
        }
        if summary.failed > 0 {
            parts.push(format!("{} failed", summary.failed));
        }
        if summary.ignored > 0 {
            parts.push(format!("{} ignored", summary.ignored));
        }
        if parts.is_empty() {
            parts.push("no tests ran".to_string());
        }
        let line = format!(
            "====== {}: {} in {:.2}s ======",
            spec.id(),
            parts.join(", "),
            summary.duration.as_secs_f64()
        );
        let color = if summary.is_success() { GREEN } else { RED };
        let _ = writeln!(state.out, "{}", self.paint(color, &line));
    }
}

/// Writes every event as one line of JSON.
pub struct JsonListener<W> {
    out: Mutex<W>,
}

impl<W: Write + Send> JsonListener<W> {
    pub fn new(out: W) -> Self {
        JsonListener { out: Mutex::new(out) }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn emit(&self, event: &EngineEvent) {
        let mut out = self.out.lock();
        if let Err(err) = serde_json::to_writer(&mut *out, event) {
            tracing::warn!(error = %err, "failed to write event");
            return;
        }
        let _ = writeln!(out);
    }
}

impl<W: Write + Send> EngineListener for JsonListener<W> {
    fn spec_started(&self, spec: &SpecDescriptor) {
        self.emit(&EngineEvent::SpecStarted { spec: spec.id().clone() });
    }

    fn spec_instantiated(&self, spec: &SpecDescriptor) {
        self.emit(&EngineEvent::SpecInstantiated { spec: spec.id().clone() });
    }

    fn spec_instantiation_error(&self, spec: &SpecDescriptor, error: &SharedError) {
        self.emit(&EngineEvent::SpecInstantiationError {
            spec: spec.id().clone(),
            error: error.to_string(),
        });
    }

    fn test_started(&self, test: &TestCase) {
        self.emit(&EngineEvent::TestStarted {
            spec: test.spec().id().clone(),
            path: test.path().clone(),
        });
    }

    fn test_finished(&self, test: &TestCase, result: &TestResult) {
        self.emit(&EngineEvent::test_finished(test, result));
    }

    fn spec_finished(&self, spec: &SpecDescriptor, results: &SpecResults) {
        self.emit(&EngineEvent::SpecFinished {
            spec: spec.id().clone(),
            summary: results.summary(),
        });
    }
}
