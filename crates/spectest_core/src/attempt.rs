//! `Try<T>`: a fallible computation that never swallows a fatal error.
//!
//! Constructors run user code and classify what comes back through [`Fault`]. Recoverable failures are kept as
//! [`Try::Failure`]; fatal ones are handed back to the caller as `Err(FatalError)` so they can be propagated with
//! `?` instead of being wrapped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::fault::{BoxError, FatalError, Fault, SharedError};

/// Success carrying a value, or failure carrying the causing error.
#[derive(Debug, Clone)]
pub enum Try<T> {
    Success(T),
    Failure(SharedError),
}

impl<T> Try<T> {
    /// Run `f`, catching both returned errors and panics.
    ///
    /// Returns `Err` only for fatal faults; everything else becomes `Ok(Try::Failure(..))`.
    pub fn of<F>(f: F) -> Result<Self, FatalError>
    where
        F: FnOnce() -> Result<T, BoxError>,
    {
        match panic::catch_unwind(AssertUnwindSafe(f)) {
            Ok(Ok(value)) => Ok(Try::Success(value)),
            Ok(Err(err)) => Try::from_fault(Fault::classify(err)),
            Err(payload) => Try::from_fault(Fault::from_panic(payload)),
        }
    }

    /// Lift an already-classified outcome.
    pub fn from_result(result: Result<T, Fault>) -> Result<Self, FatalError> {
        match result {
            Ok(value) => Ok(Try::Success(value)),
            Err(fault) => Try::from_fault(fault),
        }
    }

    /// A recoverable fault becomes a failure; a fatal one is returned as `Err`.
    pub fn from_fault(fault: Fault) -> Result<Self, FatalError> {
        fault.into_recoverable().map(Try::Failure)
    }

    pub fn success(value: T) -> Self {
        Try::Success(value)
    }

    pub fn failure(err: impl Into<BoxError>) -> Self {
        Try::Failure(Arc::from(err.into()))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Try::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Try::Failure(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Try<U> {
        match self {
            Try::Success(value) => Try::Success(f(value)),
            Try::Failure(err) => Try::Failure(err),
        }
    }

    /// Chain a dependent computation; the first failure short-circuits.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> Try<U>) -> Try<U> {
        match self {
            Try::Success(value) => f(value),
            Try::Failure(err) => Try::Failure(err),
        }
    }

    /// Collapse both variants into one value.
    pub fn fold<R>(self, if_failure: impl FnOnce(SharedError) -> R, if_success: impl FnOnce(T) -> R) -> R {
        match self {
            Try::Success(value) => if_success(value),
            Try::Failure(err) => if_failure(err),
        }
    }

    pub fn on_success(self, f: impl FnOnce(&T)) -> Self {
        if let Try::Success(value) = &self {
            f(value);
        }
        self
    }

    pub fn on_failure(self, f: impl FnOnce(&SharedError)) -> Self {
        if let Try::Failure(err) = &self {
            f(err);
        }
        self
    }

    /// Turn a failure into a plain value.
    pub fn recover(self, f: impl FnOnce(SharedError) -> T) -> T {
        self.fold(f, |value| value)
    }

    pub fn as_ref(&self) -> Try<&T> {
        match self {
            Try::Success(value) => Try::Success(value),
            Try::Failure(err) => Try::Failure(Arc::clone(err)),
        }
    }

    pub fn ok(self) -> Option<T> {
        self.fold(|_| None, Some)
    }

    pub fn error(&self) -> Option<&SharedError> {
        match self {
            Try::Success(_) => None,
            Try::Failure(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<T, SharedError> {
        self.fold(Err, Ok)
    }
}
