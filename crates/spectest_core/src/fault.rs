//! Fault taxonomy: recoverable errors versus fatal ones.
//!
//! User code fails in one of two ways: it returns an error, or it panics (assertion helpers panic). Both are
//! classified exactly once into a [`Fault`] at the boundary where the engine regains control:
//!
//! - [`Fault::Recoverable`] becomes a test failure (or a spec-level `Try::Failure`) and the run continues.
//! - [`Fault::Fatal`] is propagated unwrapped through every layer and aborts the run.
//!
//! A fault is fatal only when its error (or panic payload) is a [`FatalError`].

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Owned, type-erased error as returned by test bodies and hooks.
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Shared, type-erased error stored inside results (results are cloned into listeners and maps).
pub type SharedError = Arc<dyn Error + Send + Sync + 'static>;

/// An error signalling that the process or runtime itself is compromised.
///
/// Never wrapped into a test result; it aborts the current run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("fatal error: {message}")]
pub struct FatalError {
    message: String,
}

impl FatalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A panic captured from user code, carrying the rendered panic message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PanicError {
    message: String,
}

impl PanicError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build from a raw panic payload (`String` and `&'static str` payloads keep their text).
    pub fn from_payload(payload: &(dyn Any + Send)) -> Self {
        Self::new(panic_message(payload))
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Render a panic payload as text.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(fatal) = payload.downcast_ref::<FatalError>() {
        fatal.to_string()
    } else {
        "panicked with a non-string payload".to_string()
    }
}

/// Abort the current run with a [`FatalError`].
///
/// Implemented as a panic carrying the error as payload so it can be raised from any depth of user code; the
/// engine recognises the payload and propagates it instead of recording a failure.
#[cold]
#[track_caller]
pub fn fatal(message: impl Into<String>) -> ! {
    std::panic::panic_any(FatalError::new(message))
}

/// Classification of an error at a fallible boundary.
#[derive(Clone)]
pub enum Fault {
    Recoverable(SharedError),
    Fatal(FatalError),
}

impl Fault {
    /// Wrap any error as recoverable without inspecting it.
    pub fn recoverable(err: impl Into<BoxError>) -> Self {
        Fault::Recoverable(Arc::from(err.into()))
    }

    /// Classify a returned error. Only a boxed [`FatalError`] is fatal.
    pub fn classify(err: BoxError) -> Self {
        match err.downcast::<FatalError>() {
            Ok(fatal) => Fault::Fatal(*fatal),
            Err(err) => Fault::Recoverable(Arc::from(err)),
        }
    }

    /// Classify a caught panic payload. Only a [`FatalError`] payload (see [`fatal`]) is fatal.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        match payload.downcast::<FatalError>() {
            Ok(fatal) => Fault::Fatal(*fatal),
            Err(payload) => Fault::Recoverable(Arc::new(PanicError::from_payload(payload.as_ref()))),
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Fault::Fatal(_))
    }

    /// Split off the fatal case so callers can propagate it with `?`.
    pub fn into_recoverable(self) -> Result<SharedError, FatalError> {
        match self {
            Fault::Recoverable(err) => Ok(err),
            Fault::Fatal(fatal) => Err(fatal),
        }
    }
}

impl From<FatalError> for Fault {
    fn from(fatal: FatalError) -> Self {
        Fault::Fatal(fatal)
    }
}

impl fmt::Debug for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Recoverable(err) => f.debug_tuple("Recoverable").field(&err.to_string()).finish(),
            Fault::Fatal(fatal) => f.debug_tuple("Fatal").field(fatal).finish(),
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Recoverable(err) => write!(f, "{err}"),
            Fault::Fatal(fatal) => write!(f, "{fatal}"),
        }
    }
}
