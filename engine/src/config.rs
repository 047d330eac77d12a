//! Engine tuning knobs.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Recognition and scheduling configuration.
///
/// The match threshold and debounce window are the main recognition-quality
/// knobs and must be re-tuned per deployment; the defaults below are starting
/// points for normalized landmark space, not calibrated values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum Euclidean distance for a gesture match (default: 0.5).
    pub match_threshold: f32,

    /// Cool-down window per label, in milliseconds (default: 1000).
    pub debounce_ms: u64,

    /// Upper bound on one blocking acquisition call, in milliseconds
    /// (default: 100). Also bounds how long a stop request can go unobserved.
    pub capture_timeout_ms: u64,

    /// Event channel capacity (default: 8).
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.5,
            debounce_ms: 1000,
            capture_timeout_ms: 100,
            channel_capacity: crate::channel::DEFAULT_CAPACITY,
        }
    }
}

impl EngineConfig {
    pub fn with_match_threshold(mut self, threshold: f32) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn with_debounce(mut self, window: Duration) -> Self {
        self.debounce_ms = window.as_millis() as u64;
        self
    }

    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn capture_timeout(&self) -> Duration {
        Duration::from_millis(self.capture_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.match_threshold, 0.5);
        assert_eq!(cfg.debounce(), Duration::from_secs(1));
        assert_eq!(cfg.capture_timeout(), Duration::from_millis(100));
        assert_eq!(cfg.channel_capacity, 8);
    }

    #[test]
    fn partial_deserialization_fills_defaults() {
        let cfg: EngineConfig = serde_json::from_str(r#"{"match_threshold": 0.3}"#).unwrap();
        assert_eq!(cfg.match_threshold, 0.3);
        assert_eq!(cfg.debounce_ms, 1000);
    }
}
