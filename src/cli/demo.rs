//! Bundled demo specs for `spectest list` / `spectest run`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::engine::{IsolationMode, SpecBuilder, SpecDescriptor, SpecRegistry, TestConfig};

/// Tag carried by tests that only run with `--slow`.
pub const SLOW_TAG: &str = "slow";

/// Build the demo registry. `isolation` overrides every spec's own mode when set.
pub fn registry(isolation: Option<IsolationMode>) -> SpecRegistry {
    let with_mode = |descriptor: SpecDescriptor| match isolation {
        Some(mode) => descriptor.with_isolation(mode),
        None => descriptor,
    };

    let mut registry = SpecRegistry::new();
    registry.register(with_mode(SpecDescriptor::new("ssn")), ssn_spec);
    registry.register(with_mode(SpecDescriptor::new("counter")), counter_spec);
    registry.register(
        with_mode(SpecDescriptor::new("stack").with_isolation(IsolationMode::FreshPerLeaf)),
        stack_spec,
    );
    registry.register(
        with_mode(SpecDescriptor::new("timeouts").with_timeout(Duration::from_secs(5))),
        timeouts_spec,
    );
    registry
}

// ============================================================================
// ssn: flat list of validation tests
// ============================================================================

/// Validate a US social security number written as `AAA-GG-SSSS`.
pub fn validate_ssn(ssn: &str) -> Result<(), String> {
    let parts: Vec<&str> = ssn.split('-').collect();
    let [area, group, serial] = parts.as_slice() else {
        return Err(format!("`{ssn}` is not in AAA-GG-SSSS form"));
    };
    let well_formed = [(area, 3), (group, 2), (serial, 4)]
        .iter()
        .all(|(part, len)| part.len() == *len && part.chars().all(|c| c.is_ascii_digit()));
    if !well_formed {
        return Err(format!("`{ssn}` must contain only digits in AAA-GG-SSSS form"));
    }
    if *area == "000" || *area == "666" || area.starts_with('9') {
        return Err(format!("area number {area} is never assigned"));
    }
    if *group == "00" {
        return Err("group number 00 is never assigned".to_string());
    }
    if *serial == "0000" {
        return Err("serial number 0000 is never assigned".to_string());
    }
    Ok(())
}

fn ssn_spec(s: &mut SpecBuilder) -> Result<(), spectest_core::BoxError> {
    s.test("a well formed ssn is accepted", |_| async {
        assert_eq!(validate_ssn("123-45-6789"), Ok(()));
        Ok(())
    });
    s.test("letters are rejected", |_| async {
        assert!(validate_ssn("12a-45-6789").is_err());
        Ok(())
    });
    s.test("the wrong number of groups is rejected", |_| async {
        assert!(validate_ssn("123456789").is_err());
        assert!(validate_ssn("123-45-67-89").is_err());
        Ok(())
    });
    s.test("unassigned area numbers are rejected", |_| async {
        for area in ["000", "666", "900"] {
            assert!(validate_ssn(&format!("{area}-45-6789")).is_err(), "{area} accepted");
        }
        Ok(())
    });
    s.test("!itin numbers are handled", |_| async { Ok(()) });
    Ok(())
}

// ============================================================================
// counter: shared instance state across tests
// ============================================================================

fn counter_spec(s: &mut SpecBuilder) -> Result<(), spectest_core::BoxError> {
    let counter = Arc::new(AtomicUsize::new(0));

    let hook = Arc::clone(&counter);
    s.before_test(move |_| {
        hook.fetch_add(1, Ordering::SeqCst);
        async { Ok(()) }
    });

    for (name, expected) in [("a", 1), ("b", 2), ("c", 3)] {
        let counter = Arc::clone(&counter);
        s.test(name, move |_| {
            let seen = counter.load(Ordering::SeqCst);
            async move {
                assert_eq!(seen, expected, "counter is shared by the whole spec");
                Ok(())
            }
        });
    }
    Ok(())
}

// ============================================================================
// stack: nested behaviour spec, fresh instance per leaf
// ============================================================================

fn stack_spec(s: &mut SpecBuilder) -> Result<(), spectest_core::BoxError> {
    let stack: Arc<Mutex<Vec<i32>>> = Arc::default();

    s.context("a stack", |spec| {
        let empty = Arc::clone(&stack);
        spec.context("when empty", move |ctx| {
            let popped = Arc::clone(&empty);
            ctx.test("pop returns nothing", move |_| {
                let value = popped.lock().pop();
                async move {
                    assert_eq!(value, None);
                    Ok(())
                }
            });
            let pushed = Arc::clone(&empty);
            ctx.test("push makes it non-empty", move |_| {
                pushed.lock().push(1);
                let len = pushed.lock().len();
                async move {
                    assert_eq!(len, 1, "each leaf starts from an empty stack");
                    Ok(())
                }
            });
        });
        let full = Arc::clone(&stack);
        spec.context("after two pushes", move |ctx| {
            let lifo = Arc::clone(&full);
            ctx.test("pop returns the last element", move |_| {
                let mut stack = lifo.lock();
                stack.extend([1, 2]);
                let top = stack.pop();
                async move {
                    assert_eq!(top, Some(2));
                    Ok(())
                }
            });
            let size = Arc::clone(&full);
            ctx.test("len is two", move |_| {
                let mut stack = size.lock();
                stack.extend([1, 2]);
                let len = stack.len();
                async move {
                    assert_eq!(len, 2);
                    Ok(())
                }
            });
        });
    });
    Ok(())
}

// ============================================================================
// timeouts: per-test and container timeouts
// ============================================================================

fn timeouts_spec(s: &mut SpecBuilder) -> Result<(), spectest_core::BoxError> {
    s.test_with(
        "finishes well within the spec default",
        TestConfig::new(),
        |_| async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(())
        },
    );
    s.context_with(
        "slow io",
        TestConfig::new().tag(SLOW_TAG).timeout(Duration::from_millis(50)),
        |ctx| {
            ctx.test("exceeds the container timeout", |_| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            });
            ctx.test_with(
                "own timeout wins over the container",
                TestConfig::new().timeout(Duration::from_millis(500)),
                |_| async {
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(())
                },
            );
        },
    );
    Ok(())
}
