//! Engine configuration and timeout resolution.

use std::time::Duration;

use super::error::EngineError;

/// Engine-wide fallback used when neither the test, its containers, nor the spec set a timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Environment variable overriding [`EngineConfig::default_timeout`], in milliseconds.
pub const TIMEOUT_ENV: &str = "SPECTEST_TIMEOUT_MS";

/// Configuration shared by every spec run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// Timeout applied when nothing more specific is configured.
    pub default_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl EngineConfig {
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Build a config from the process environment.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the environment, in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let mut config = EngineConfig::default();
        if let Some(raw) = lookup(TIMEOUT_ENV) {
            config.default_timeout = parse_timeout_ms(&raw)
                .map_err(|reason| EngineError::Config(format!("{TIMEOUT_ENV}={raw:?}: {reason}")))?;
        }
        Ok(config)
    }
}

/// Parse a positive millisecond count.
pub fn parse_timeout_ms(raw: &str) -> Result<Duration, String> {
    let ms: u64 = raw
        .trim()
        .parse()
        .map_err(|e| format!("expected a whole number of milliseconds ({e})"))?;
    if ms == 0 {
        return Err("timeout must be greater than zero".to_string());
    }
    Ok(Duration::from_millis(ms))
}

/// Resolve the timeout for one test.
///
/// Precedence: the test's own override, then the nearest enclosing container that sets one (`ancestors` is
/// nearest-first), then the spec default, then the engine default.
pub fn resolve_timeout(
    test: Option<Duration>,
    ancestors: impl IntoIterator<Item = Option<Duration>>,
    spec: Option<Duration>,
    engine: Duration,
) -> Duration {
    test.or_else(|| ancestors.into_iter().flatten().next())
        .or(spec)
        .unwrap_or(engine)
}
