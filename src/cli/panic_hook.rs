//! Quiet panic hook for spec runs
//!
//! Assertion panics inside tests are caught and reported by the listener. The default hook would also print
//! `thread '...' panicked at` to stderr for each of them, interleaved with the listener's output. While a
//! [`QuietPanics`] guard is alive, panics go to the debug log instead.

use std::panic::{self, PanicHookInfo};

type PanicHook = Box<dyn Fn(&PanicHookInfo<'_>) + Sync + Send + 'static>;

/// Replaces the process-wide panic hook until dropped, then reinstalls the previous one.
pub struct QuietPanics {
    previous: Option<PanicHook>,
}

impl QuietPanics {
    pub fn install() -> Self {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(|info| {
            tracing::debug!(panic = %info, "panic caught by the engine");
        }));
        QuietPanics {
            previous: Some(previous),
        }
    }
}

impl Drop for QuietPanics {
    fn drop(&mut self) {
        // The hook cannot be swapped while unwinding.
        if std::thread::panicking() {
            return;
        }
        if let Some(previous) = self.previous.take() {
            panic::set_hook(previous);
        }
    }
}
