//! Engine Configuration
//!
//! A small serde-backed configuration block. Nothing in the engine reads a
//! global scheduler; the only process-wide setting is the depth limit of the
//! debug-build cascade guard, which `EngineConfig::install` publishes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LiveError;

/// Default depth limit for refresh cascades in debug builds.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 512;

static MAX_CASCADE_DEPTH: AtomicUsize = AtomicUsize::new(DEFAULT_MAX_CASCADE_DEPTH);

/// Tunables for the live expression engine.
///
/// # Example
///
/// ```rust,ignore
/// let config = EngineConfig::from_json(r#"{ "refresh_delay_ms": 250 }"#)?;
/// config.install();
/// let node = LiveExpression::builder(0).config(&config).scheduler(lane).build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Debounce window applied by builders that opt in with `.config(..)`.
    pub refresh_delay_ms: u64,

    /// How deep a synchronous refresh cascade may nest before the debug
    /// build reports a probable dependency cycle.
    pub max_cascade_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_delay_ms: 0,
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, LiveError> {
        Ok(serde_json::from_str(json)?)
    }

    /// The configured debounce window.
    pub fn refresh_delay(&self) -> Duration {
        Duration::from_millis(self.refresh_delay_ms)
    }

    /// Publish the process-wide settings (the cascade depth limit).
    pub fn install(&self) {
        MAX_CASCADE_DEPTH.store(self.max_cascade_depth.max(1), Ordering::Relaxed);
        tracing::debug!(
            max_cascade_depth = self.max_cascade_depth,
            "installed live expression config"
        );
    }
}

/// The currently installed cascade depth limit.
pub(crate) fn max_cascade_depth() -> usize {
    MAX_CASCADE_DEPTH.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let config = EngineConfig::from_json(r#"{ "refresh_delay_ms": 250 }"#).unwrap();
        assert_eq!(config.refresh_delay(), Duration::from_millis(250));
        assert_eq!(config.max_cascade_depth, DEFAULT_MAX_CASCADE_DEPTH);
    }

    #[test]
    fn empty_object_is_default() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            EngineConfig::from_json("{ refresh_delay_ms: }"),
            Err(LiveError::Config(_))
        ));
    }
}
