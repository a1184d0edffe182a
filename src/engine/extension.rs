//! Interception chains.
//!
//! An extension wraps the execution of a target (a spec scope or a single test case). Extensions run
//! outermost-first: extension `0` sees the target first and the result last. Each one receives a [`Proceed`]
//! continuation and either
//!
//! - calls [`Proceed::run`] with the target (unchanged or transformed) to continue down the chain,
//! - calls [`Proceed::terminal`] to skip the remaining extensions and go straight to the terminal action, or
//! - returns its own result without touching `proceed`, short-circuiting everything beneath it.
//!
//! `Proceed` is consumed by value, so it can be invoked at most once. The chain is driven by a cursor over the
//! remaining extensions rather than by pre-built nested closures, so building it allocates nothing per
//! extension.

use std::sync::Arc;

use futures::future::BoxFuture;
use spectest_core::{FatalError, Fault};

use super::result::TestResult;
use super::spec::SpecDescriptor;
use super::test_case::TestCase;

/// Result of intercepting a spec scope. A recoverable fault fails the whole `run_spec` call.
pub type SpecOutcome = Result<(), Fault>;
/// Result of intercepting a test case. Recoverable problems are expressed inside the [`TestResult`].
pub type TestOutcome = Result<TestResult, FatalError>;

/// Intercepts spec-level execution of one isolation scope.
pub type SpecExtension = dyn Interceptor<Arc<SpecDescriptor>, SpecOutcome>;
/// Intercepts the execution of one leaf test.
pub type TestCaseExtension = dyn Interceptor<TestCase, TestOutcome>;

pub trait Interceptor<T, R>: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    fn intercept<'a>(&'a self, target: T, proceed: Proceed<'a, T, R>) -> BoxFuture<'a, R>;
}

type Terminal<'a, T, R> = Box<dyn FnOnce(T) -> BoxFuture<'a, R> + Send + 'a>;

/// The rest of the chain beneath the current extension.
pub struct Proceed<'a, T, R> {
    remaining: &'a [Arc<dyn Interceptor<T, R>>],
    terminal: Terminal<'a, T, R>,
}

impl<'a, T, R> Proceed<'a, T, R>
where
    T: Send + 'a,
    R: Send + 'a,
{
    /// Continue with the next extension, or the terminal action when none are left.
    pub fn run(self, target: T) -> BoxFuture<'a, R> {
        match self.remaining.split_first() {
            None => (self.terminal)(target),
            Some((head, tail)) => {
                tracing::trace!(extension = head.name(), remaining = tail.len(), "intercepting");
                head.intercept(
                    target,
                    Proceed {
                        remaining: tail,
                        terminal: self.terminal,
                    },
                )
            }
        }
    }

    /// Skip every remaining extension and invoke the terminal action directly.
    pub fn terminal(self, target: T) -> BoxFuture<'a, R> {
        (self.terminal)(target)
    }

    /// Number of extensions still to run beneath the caller.
    pub fn remaining(&self) -> usize {
        self.remaining.len()
    }
}

/// Run `target` through `extensions` (index 0 outermost) around `terminal`.
///
/// Panics raised synchronously by an extension propagate to the caller; callers classify them at the chain's
/// entry point.
pub fn run_chain<'a, T, R>(
    extensions: &'a [Arc<dyn Interceptor<T, R>>],
    target: T,
    terminal: impl FnOnce(T) -> BoxFuture<'a, R> + Send + 'a,
) -> BoxFuture<'a, R>
where
    T: Send + 'a,
    R: Send + 'a,
{
    Proceed {
        remaining: extensions,
        terminal: Box::new(terminal),
    }
    .run(target)
}
