//! End-to-end engine scenarios
//!
//! Each test registers a small spec, runs it through `SpecRunner`, and checks the results map together with the
//! listener's event stream.
//!
//! Run with: `cargo test --test engine_scenarios`

use std::future::Ready;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use spectest::engine::{
    EngineContext, EngineEvent, ExecutionMode, ExtensionRegistry, Interceptor, IsolationMode, Proceed,
    RecordingListener, SkipSpecIf, SpecBuilder, SpecDescriptor, SpecOutcome, SpecRegistry, SpecResults, SpecRunner,
    TestCase, TestCaseExtension, TestConfig, TestContext, TestOutcome, TestPath, TestResult, TestStatus,
    TimeoutOverride, run_single_test,
};
use spectest::{BoxError, EngineConfig, EngineError, FatalError, Try};

type Log = Arc<Mutex<Vec<String>>>;

fn push(log: &Log, entry: impl Into<String>) {
    log.lock().push(entry.into());
}

async fn run(
    registry: &SpecRegistry,
    spec: &Arc<SpecDescriptor>,
    context: &EngineContext,
) -> (Result<Try<SpecResults>, FatalError>, Vec<EngineEvent>) {
    let listener = RecordingListener::new();
    let outcome = SpecRunner::new(context, registry, &listener).run_spec(spec).await;
    (outcome, listener.take())
}

fn finished(events: &[EngineEvent]) -> Vec<(String, TestStatus)> {
    events
        .iter()
        .filter_map(|e| match e {
            EngineEvent::TestFinished { path, status, .. } => Some((path.to_string(), *status)),
            _ => None,
        })
        .collect()
}

fn success(outcome: Result<Try<SpecResults>, FatalError>) -> SpecResults {
    match outcome {
        Ok(Try::Success(results)) => results,
        Ok(Try::Failure(err)) => panic!("spec failed: {err}"),
        Err(fatal) => panic!("run aborted: {fatal}"),
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn inactive_tests_are_ignored_without_hooks() {
    let log = Log::default();
    let hooks = log.clone();
    let mut registry = SpecRegistry::new();
    let spec = registry.register(SpecDescriptor::new("inactive"), move |s| {
        let before = hooks.clone();
        s.before_test(move |t| {
            push(&before, format!("before {}", t.name()));
            async { Ok(()) }
        });
        let after = hooks.clone();
        s.after_test(move |t, _| {
            push(&after, format!("after {}", t.name()));
            async { Ok(()) }
        });
        s.test("!bang disabled", |_| async { Ok(()) });
        s.test_with("config disabled", TestConfig::new().disabled(), |_| async { Ok(()) });
        s.test_with("predicate disabled", TestConfig::new().enabled_if(|_| false), |_| async { Ok(()) });
        Ok(())
    });

    let (outcome, _) = run(&registry, &spec, &EngineContext::default()).await;
    let results = success(outcome);
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|(_, r)| r.is_ignored()));
    assert!(log.lock().is_empty());
}

#[tokio::test]
async fn before_body_after_run_in_order_per_leaf() {
    let log = Log::default();
    let shared = log.clone();
    let mut registry = SpecRegistry::new();
    let spec = registry.register(SpecDescriptor::new("ordered"), move |s| {
        let before = shared.clone();
        s.before_test(move |t| {
            push(&before, format!("before {}", t.name()));
            async { Ok(()) }
        });
        let after = shared.clone();
        s.after_test(move |t, r| {
            push(&after, format!("after {} {}", t.name(), r.status().as_str()));
            async { Ok(()) }
        });
        for name in ["one", "two"] {
            let body = shared.clone();
            s.test(name, move |ctx| {
                push(&body, format!("body {}", ctx.test_case().name()));
                async { Ok(()) }
            });
        }
        Ok(())
    });

    let (outcome, _) = run(&registry, &spec, &EngineContext::default()).await;
    success(outcome);
    assert_eq!(
        *log.lock(),
        [
            "before one",
            "body one",
            "after one success",
            "before two",
            "body two",
            "after two success"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_reports_the_limit_and_still_runs_after_hook() {
    let after_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&after_calls);
    let mut registry = SpecRegistry::new();
    let spec = registry.register(SpecDescriptor::new("slow"), move |s| {
        let counter = Arc::clone(&counter);
        s.after_test(move |_, result| {
            assert!(result.is_failure());
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });
        s.test_with("sleeper", TestConfig::new().timeout(Duration::from_millis(300)), |_| async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        });
        Ok(())
    });

    let (outcome, _) = run(&registry, &spec, &EngineContext::default()).await;
    let results = success(outcome);
    let result = results.get(&TestPath::root("sleeper")).unwrap();
    assert_eq!(
        result.error().unwrap().to_string(),
        "Execution of test took longer than 300ms"
    );
    assert_eq!(after_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn spec_timeout_applies_when_test_sets_none() {
    let mut registry = SpecRegistry::new();
    let spec = registry.register(
        SpecDescriptor::new("spec-timeout").with_timeout(Duration::from_millis(40)),
        |s| {
            s.test("waits", |_| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(())
            });
            Ok(())
        },
    );
    let context = EngineContext::new(
        EngineConfig::default().with_default_timeout(Duration::from_millis(10)),
        ExtensionRegistry::new(),
    );
    let (outcome, _) = run(&registry, &spec, &context).await;
    let results = success(outcome);
    assert_eq!(
        results.get(&TestPath::root("waits")).unwrap().error().unwrap().to_string(),
        "Execution of test took longer than 40ms"
    );
}

#[tokio::test]
async fn failing_test_does_not_stop_siblings() {
    let mut registry = SpecRegistry::new();
    let spec = registry.register(SpecDescriptor::new("siblings"), |s| {
        s.test("fails", |_| async {
            assert_eq!(1 + 1, 3, "arithmetic is broken");
            Ok(())
        });
        s.test("errors", |_| async { Err("connection refused".into()) });
        s.test("passes", |_| async { Ok(()) });
        Ok(())
    });

    let (outcome, events) = run(&registry, &spec, &EngineContext::default()).await;
    let summary = success(outcome).summary();
    assert_eq!((summary.passed, summary.failed), (1, 2));
    assert_eq!(
        finished(&events),
        [
            ("fails".to_string(), TestStatus::Failure),
            ("errors".to_string(), TestStatus::Failure),
            ("passes".to_string(), TestStatus::Success),
        ]
    );
}

// ============================================================================
// Isolation modes
// ============================================================================

/// A spec with two top-level groups and five leaves whose factory counts its calls.
fn counted_tree(registry: &mut SpecRegistry, mode: IsolationMode) -> (Arc<SpecDescriptor>, Arc<AtomicUsize>) {
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&constructed);
    let spec = registry.register(SpecDescriptor::new("tree").with_isolation(mode), move |s| {
        counter.fetch_add(1, Ordering::SeqCst);
        s.context("group a", |g| {
            g.test("a1", |_| async { Ok(()) });
            g.context("nested", |n| {
                n.test("a2", |_| async { Ok(()) });
                n.test("a3", |_| async { Ok(()) });
            });
        });
        s.context("group b", |g| {
            g.test("b1", |_| async { Ok(()) });
        });
        s.test("top", |_| async { Ok(()) });
        Ok(())
    });
    (spec, constructed)
}

#[tokio::test]
async fn instance_counts_follow_isolation_mode() {
    for (mode, expected) in [
        (IsolationMode::SharedInstance, 1),
        (IsolationMode::FreshPerTest, 3),
        (IsolationMode::FreshPerLeaf, 5),
    ] {
        let mut registry = SpecRegistry::new();
        let (spec, constructed) = counted_tree(&mut registry, mode);
        let (outcome, events) = run(&registry, &spec, &EngineContext::default()).await;
        let results = success(outcome);
        assert_eq!(constructed.load(Ordering::SeqCst), expected, "{mode}");
        assert_eq!(results.len(), 5, "{mode}");
        let instantiated = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::SpecInstantiated { .. }))
            .count();
        assert_eq!(instantiated, expected, "{mode}");
        let order: Vec<_> = results.paths().map(|p| p.to_string()).collect();
        assert_eq!(
            order,
            [
                "group a -- a1",
                "group a -- nested -- a2",
                "group a -- nested -- a3",
                "group b -- b1",
                "top"
            ],
            "{mode}"
        );
    }
}

#[tokio::test]
async fn shared_instance_counter_is_visible_across_tests() {
    let observed = Log::default();
    let sink = observed.clone();
    let mut registry = SpecRegistry::new();
    let spec = registry.register(SpecDescriptor::new("counter"), move |s| {
        let counter = Arc::new(AtomicUsize::new(0));
        let hook = Arc::clone(&counter);
        s.before_test(move |_| {
            hook.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });
        for name in ["a", "b", "c"] {
            let counter = Arc::clone(&counter);
            let sink = sink.clone();
            s.test(name, move |_| {
                push(&sink, format!("{name}={}", counter.load(Ordering::SeqCst)));
                async { Ok(()) }
            });
        }
        Ok(())
    });

    let (outcome, _) = run(&registry, &spec, &EngineContext::default()).await;
    success(outcome);
    assert_eq!(*observed.lock(), ["a=1", "b=2", "c=3"]);
}

#[tokio::test]
async fn fresh_per_leaf_isolates_state() {
    let observed = Log::default();
    let sink = observed.clone();
    let mut registry = SpecRegistry::new();
    let spec = registry.register(
        SpecDescriptor::new("isolated").with_isolation(IsolationMode::FreshPerLeaf),
        move |s| {
            let counter = Arc::new(AtomicUsize::new(0));
            for name in ["a", "b"] {
                let counter = Arc::clone(&counter);
                let sink = sink.clone();
                s.test(name, move |_| {
                    let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    push(&sink, format!("{name}={seen}"));
                    async { Ok(()) }
                });
            }
            Ok(())
        },
    );

    let (outcome, _) = run(&registry, &spec, &EngineContext::default()).await;
    success(outcome);
    assert_eq!(*observed.lock(), ["a=1", "b=1"]);
}

/// Test body that bumps `counter` and records the value it saw.
fn observe(
    name: &'static str,
    counter: &Arc<AtomicUsize>,
    sink: &Log,
) -> impl Fn(TestContext) -> Ready<Result<(), BoxError>> + Send + Sync + 'static {
    let counter = Arc::clone(counter);
    let sink = sink.clone();
    move |_| {
        let seen = counter.fetch_add(1, Ordering::SeqCst) + 1;
        push(&sink, format!("{name}={seen}"));
        std::future::ready(Ok(()))
    }
}

#[tokio::test]
async fn fresh_per_test_shares_state_within_a_group_only() {
    let observed = Log::default();
    let sink = observed.clone();
    let mut registry = SpecRegistry::new();
    let spec = registry.register(
        SpecDescriptor::new("grouped").with_isolation(IsolationMode::FreshPerTest),
        move |s| {
            let counter = Arc::new(AtomicUsize::new(0));
            s.context("group a", |g| {
                g.test("a1", observe("a1", &counter, &sink));
                g.context("nested", |n| {
                    n.test("a2", observe("a2", &counter, &sink));
                });
            });
            s.context("group b", |g| {
                g.test("b1", observe("b1", &counter, &sink));
            });
            Ok(())
        },
    );

    let (outcome, _) = run(&registry, &spec, &EngineContext::default()).await;
    success(outcome);
    assert_eq!(*observed.lock(), ["a1=1", "a2=2", "b1=1"]);
}

// ============================================================================
// Instantiation failures
// ============================================================================

#[tokio::test]
async fn instantiation_failure_fails_the_spec_with_one_notification() {
    let mut registry = SpecRegistry::new();
    let spec = registry.register(SpecDescriptor::new("broken"), |s| {
        s.test("never runs", |_| async { Ok(()) });
        Err("database unreachable".into())
    });

    let (outcome, events) = run(&registry, &spec, &EngineContext::default()).await;
    let err = match outcome {
        Ok(Try::Failure(err)) => err,
        other => panic!("expected failure, got {other:?}"),
    };
    assert_eq!(err.to_string(), "failed to instantiate spec `broken`: database unreachable");
    let source = std::error::Error::source(&*err).map(|s| s.to_string());
    assert_eq!(source.as_deref(), Some("database unreachable"));

    let notifications = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::SpecInstantiationError { .. }))
        .count();
    assert_eq!(notifications, 1);
    assert!(finished(&events).is_empty());
}

#[tokio::test]
async fn later_scope_failure_skips_only_that_scope() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut registry = SpecRegistry::new();
    let spec = registry.register(
        SpecDescriptor::new("flaky").with_isolation(IsolationMode::FreshPerTest),
        move |s| {
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err("second instance refused".into());
            }
            s.test("first", |_| async { Ok(()) });
            s.test("second", |_| async { Ok(()) });
            s.test("third", |_| async { Ok(()) });
            Ok(())
        },
    );

    let (outcome, events) = run(&registry, &spec, &EngineContext::default()).await;
    match outcome {
        Ok(Try::Failure(err)) => assert!(err.to_string().contains("second instance refused")),
        other => panic!("expected failure, got {other:?}"),
    }
    assert_eq!(
        finished(&events),
        [
            ("first".to_string(), TestStatus::Success),
            ("third".to_string(), TestStatus::Success),
        ]
    );
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn scope_missing_from_a_fresh_instance_fails_the_spec_quietly() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut registry = SpecRegistry::new();
    let spec = registry.register(
        SpecDescriptor::new("shifting").with_isolation(IsolationMode::FreshPerTest),
        move |s| {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            s.test("first", |_| async { Ok(()) });
            if call != 1 {
                s.test("second", |_| async { Ok(()) });
            }
            s.test("third", |_| async { Ok(()) });
            Ok(())
        },
    );

    let (outcome, events) = run(&registry, &spec, &EngineContext::default()).await;
    match outcome {
        Ok(Try::Failure(err)) => assert_eq!(
            err.to_string(),
            "test `second` is not declared by a fresh instance of spec `shifting`"
        ),
        other => panic!("expected failure, got {other:?}"),
    }
    let instantiated = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::SpecInstantiated { .. }))
        .count();
    assert_eq!(instantiated, 3);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, EngineEvent::SpecInstantiationError { .. }))
    );
    assert_eq!(
        finished(&events),
        [
            ("first".to_string(), TestStatus::Success),
            ("third".to_string(), TestStatus::Success),
        ]
    );
}

// ============================================================================
// Fatal errors
// ============================================================================

#[tokio::test]
async fn fatal_error_aborts_the_run() {
    let ran_after = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran_after);
    let mut registry = SpecRegistry::new();
    let spec = registry.register(SpecDescriptor::new("fatal"), move |s| {
        let counter = Arc::clone(&counter);
        s.after_test(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        });
        s.test("exhausts the stack", |_| async { Err(Box::new(FatalError::new("stack overflow")) as BoxError) });
        s.test("never reached", |_| async { Ok(()) });
        Ok(())
    });

    let (outcome, events) = run(&registry, &spec, &EngineContext::default()).await;
    assert_eq!(outcome.unwrap_err().message(), "stack overflow");
    assert_eq!(ran_after.load(Ordering::SeqCst), 0);
    assert!(finished(&events).is_empty());
}

// ============================================================================
// Extensions
// ============================================================================

struct Recorder {
    tag: &'static str,
    log: Log,
}

impl Interceptor<TestCase, TestOutcome> for Recorder {
    fn intercept<'a>(&'a self, test: TestCase, proceed: Proceed<'a, TestCase, TestOutcome>) -> BoxFuture<'a, TestOutcome> {
        async move {
            push(&self.log, format!("{} in", self.tag));
            let out = proceed.run(test).await;
            push(&self.log, format!("{} out", self.tag));
            out
        }
        .boxed()
    }
}

impl Interceptor<Arc<SpecDescriptor>, SpecOutcome> for Recorder {
    fn intercept<'a>(
        &'a self,
        spec: Arc<SpecDescriptor>,
        proceed: Proceed<'a, Arc<SpecDescriptor>, SpecOutcome>,
    ) -> BoxFuture<'a, SpecOutcome> {
        async move {
            push(&self.log, format!("{} spec in", self.tag));
            let out = proceed.run(spec).await;
            push(&self.log, format!("{} spec out", self.tag));
            out
        }
        .boxed()
    }
}

#[tokio::test]
async fn spec_then_test_extensions_nest_in_declaration_order() {
    let log = Log::default();
    let rec = |tag| Arc::new(Recorder { tag, log: log.clone() });

    let body_log = log.clone();
    let mut registry = SpecRegistry::new();
    let spec = registry.register(
        SpecDescriptor::new("chained")
            .with_extension(rec("s0"))
            .with_test_extension(rec("t0")),
        move |s| {
            let body_log = body_log.clone();
            s.test("only", move |_| {
                push(&body_log, "body");
                async { Ok(()) }
            });
            Ok(())
        },
    );
    let context = EngineContext::new(
        EngineConfig::default(),
        ExtensionRegistry::new()
            .with_spec_extension(rec("s1"))
            .with_test_extension(rec("t1")),
    );

    let (outcome, _) = run(&registry, &spec, &context).await;
    success(outcome);
    assert_eq!(
        *log.lock(),
        [
            "s0 spec in",
            "s1 spec in",
            "t0 in",
            "t1 in",
            "body",
            "t1 out",
            "t0 out",
            "s1 spec out",
            "s0 spec out"
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn timeout_override_extension_transforms_the_test() {
    let mut registry = SpecRegistry::new();
    let spec = registry.register(SpecDescriptor::new("override"), |s| {
        s.test_with(
            "would pass",
            TestConfig::new()
                .timeout(Duration::from_secs(5))
                .extension(Arc::new(TimeoutOverride(Duration::from_millis(20))) as Arc<TestCaseExtension>),
            |_| async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(())
            },
        );
        Ok(())
    });

    let (outcome, _) = run(&registry, &spec, &EngineContext::default()).await;
    let results = success(outcome);
    let result = results.get(&TestPath::root("would pass")).unwrap();
    assert_eq!(result.error().unwrap().to_string(), "Execution of test took longer than 20ms");
}

#[tokio::test]
async fn skip_spec_extension_short_circuits_the_scope() {
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    let mut registry = SpecRegistry::new();
    let spec = registry.register(
        SpecDescriptor::new("skipped").with_extension(Arc::new(SkipSpecIf::new(|spec| spec.id().as_str() == "skipped"))),
        move |s| {
            let counter = Arc::clone(&counter);
            s.test("body", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            });
            Ok(())
        },
    );

    let (outcome, events) = run(&registry, &spec, &EngineContext::default()).await;
    assert!(success(outcome).is_empty());
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert!(finished(&events).is_empty());
}

/// Continues with a copy of the spec carrying a tighter default timeout.
struct TightenSpecTimeout(Duration);

impl Interceptor<Arc<SpecDescriptor>, SpecOutcome> for TightenSpecTimeout {
    fn intercept<'a>(
        &'a self,
        spec: Arc<SpecDescriptor>,
        proceed: Proceed<'a, Arc<SpecDescriptor>, SpecOutcome>,
    ) -> BoxFuture<'a, SpecOutcome> {
        proceed.run(Arc::new((*spec).clone().with_timeout(self.0)))
    }
}

#[tokio::test(start_paused = true)]
async fn spec_extension_transforms_the_descriptor_seen_by_tests() {
    let mut registry = SpecRegistry::new();
    let spec = registry.register(
        SpecDescriptor::new("tightened").with_extension(Arc::new(TightenSpecTimeout(Duration::from_millis(10)))),
        |s| {
            s.test("sleeps", |_| async {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(())
            });
            Ok(())
        },
    );

    let (outcome, _) = run(&registry, &spec, &EngineContext::default()).await;
    let results = success(outcome);
    assert_eq!(
        results.get(&TestPath::root("sleeps")).unwrap().error().unwrap().to_string(),
        "Execution of test took longer than 10ms"
    );
}

struct FailingSpecExtension;

impl Interceptor<Arc<SpecDescriptor>, SpecOutcome> for FailingSpecExtension {
    fn intercept<'a>(
        &'a self,
        _spec: Arc<SpecDescriptor>,
        _proceed: Proceed<'a, Arc<SpecDescriptor>, SpecOutcome>,
    ) -> BoxFuture<'a, SpecOutcome> {
        panic!("extension misconfigured")
    }
}

#[tokio::test]
async fn panicking_spec_extension_fails_run_spec() {
    let mut registry = SpecRegistry::new();
    let spec = registry.register(
        SpecDescriptor::new("misconfigured").with_extension(Arc::new(FailingSpecExtension)),
        |s| {
            s.test("unreached", |_| async { Ok(()) });
            Ok(())
        },
    );

    let (outcome, events) = run(&registry, &spec, &EngineContext::default()).await;
    match outcome {
        Ok(Try::Failure(err)) => assert_eq!(err.to_string(), "extension misconfigured"),
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(finished(&events).is_empty());
}

// ============================================================================
// Flat mode
// ============================================================================

fn flat_instance(log: Log) -> spectest::engine::SpecInstance {
    let mut builder = SpecBuilder::new();
    let after = log.clone();
    builder.after_test(move |t, r| {
        push(&after, format!("after {} {}", t.name(), r.status().as_str()));
        async { Ok(()) }
    });
    builder.test("quick", |ctx| async move {
        assert_eq!(ctx.mode(), ExecutionMode::Flat);
        Ok(())
    });
    builder.test("nests", |ctx| async move {
        ctx.register_nested("child")?;
        Ok(())
    });
    builder.test("forever", |ctx| async move {
        ctx.cancellation().cancelled().await;
        std::future::pending::<Result<(), BoxError>>().await
    });
    builder.context("group", |g| {
        g.test("inner", |_| async { Ok(()) });
    });
    builder.context_with("off", TestConfig::new().disabled(), |g| {
        g.test("skipped", |_| async { Ok(()) });
    });
    builder.build(Arc::new(SpecDescriptor::new("flat"))).unwrap()
}

#[tokio::test]
async fn flat_mode_runs_a_single_leaf() {
    let log = Log::default();
    let instance = flat_instance(log.clone());
    let context = Arc::new(EngineContext::default());

    let handle = run_single_test(Arc::clone(&context), instance.roots()[0].clone()).unwrap();
    assert_eq!(handle.path(), &TestPath::root("quick"));
    assert!(handle.wait().await.unwrap().is_success());
    assert_eq!(*log.lock(), ["after quick success"]);
}

#[tokio::test]
async fn flat_mode_rejects_containers_and_nesting() {
    let instance = flat_instance(Log::default());
    let context = Arc::new(EngineContext::default());

    let group = instance.find(&TestPath::root("group")).unwrap();
    let err = run_single_test(Arc::clone(&context), group).unwrap_err();
    assert!(matches!(err, EngineError::Usage(_)));

    let nests = instance.find(&TestPath::root("nests")).unwrap();
    let result = run_single_test(context, nests).unwrap().wait().await.unwrap();
    let message = result.error().unwrap().to_string();
    assert!(message.starts_with("Nested tests are not supported in flat execution mode"), "{message}");
}

#[tokio::test]
async fn cancelling_a_flat_test_fails_it_and_runs_after_hook() {
    let log = Log::default();
    let instance = flat_instance(log.clone());
    let context = Arc::new(EngineContext::default());

    let forever = instance.find(&TestPath::root("forever")).unwrap();
    let handle = run_single_test(context, forever).unwrap();
    tokio::task::yield_now().await;
    handle.cancel();
    let result: TestResult = handle.wait().await.unwrap();
    assert_eq!(
        result.error().unwrap().to_string(),
        "test `forever` was cancelled before it completed"
    );
    assert_eq!(*log.lock(), ["after forever failure"]);
}

#[tokio::test]
async fn flat_handle_outlives_its_instance() {
    let log = Log::default();
    let instance = flat_instance(log.clone());
    let skipped = instance.find(&TestPath::new(["off", "skipped"])).unwrap();

    let handle = run_single_test(Arc::new(EngineContext::default()), skipped).unwrap();
    drop(instance);
    let result = handle.wait().await.unwrap();
    assert_eq!(result.status(), TestStatus::Ignored);
    assert!(log.lock().is_empty());
}
