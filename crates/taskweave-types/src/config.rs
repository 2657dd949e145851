//! Engine configuration types.
//!
//! `EngineConfig` is the optional `taskweave.toml` that supplies defaults for
//! the resilience combinators. Every field has a default, so an empty file
//! (or no file) yields a working configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(default)]
    pub timeout: TimeoutConfig,
    #[serde(default)]
    pub callbacks: CallbackConfig,
}

/// Defaults for `Retry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

fn default_max_attempts() -> u32 {
    3
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffConfig::default(),
        }
    }
}

/// Backoff strategy selection.
///
/// ```toml
/// backoff = { kind = "linear", base_ms = 100, increment_ms = 50 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffConfig {
    Fixed {
        delay_ms: u64,
    },
    Linear {
        base_ms: u64,
        increment_ms: u64,
    },
    Exponential {
        base_ms: u64,
        factor: f64,
        max_ms: u64,
    },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::Fixed { delay_ms: 100 }
    }
}

/// Defaults for `CircuitBreaker`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Time after the last failure before a probe is allowed.
    #[serde(default = "default_recovery_timeout_ms")]
    pub recovery_timeout_ms: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_recovery_timeout_ms() -> u64 {
    30_000
}

impl CircuitBreakerConfig {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            recovery_timeout_ms: default_recovery_timeout_ms(),
        }
    }
}

/// Defaults for `TimeoutWrapper`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Abort the wrapped task when the timeout fires instead of only
    /// signalling its cancellation token.
    #[serde(default)]
    pub abort_on_timeout: bool,
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl TimeoutConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: default_timeout_ms(),
            abort_on_timeout: false,
        }
    }
}

/// Callback draining behaviour at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Upper bound for draining outstanding callbacks. `0` waits forever.
    #[serde(default)]
    pub wait_timeout_ms: u64,
}

impl CallbackConfig {
    pub fn wait_timeout(&self) -> Option<Duration> {
        (self.wait_timeout_ms > 0).then(|| Duration::from_millis(self.wait_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff, BackoffConfig::Fixed { delay_ms: 100 });
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_timeout(), Duration::from_secs(30));
        assert_eq!(config.timeout.default_timeout(), Duration::from_secs(30));
        assert!(!config.timeout.abort_on_timeout);
        assert_eq!(config.callbacks.wait_timeout(), None);
    }

    #[test]
    fn test_engine_config_deserialize_empty() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_deserialize_with_values() {
        let toml_str = r#"
[retry]
max_attempts = 5
backoff = { kind = "exponential", base_ms = 100, factor = 2.0, max_ms = 5000 }

[circuit_breaker]
failure_threshold = 2
recovery_timeout_ms = 1500

[timeout]
default_timeout_ms = 250
abort_on_timeout = true

[callbacks]
wait_timeout_ms = 2000
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.retry.backoff,
            BackoffConfig::Exponential {
                base_ms: 100,
                factor: 2.0,
                max_ms: 5000
            }
        );
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.circuit_breaker.recovery_timeout(), Duration::from_millis(1500));
        assert_eq!(config.timeout.default_timeout(), Duration::from_millis(250));
        assert!(config.timeout.abort_on_timeout);
        assert_eq!(config.callbacks.wait_timeout(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        let toml_str = r#"
[retry]
backoff = { kind = "linear", base_ms = 10, increment_ms = 5 }
"#;
        let config: EngineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(
            config.retry.backoff,
            BackoffConfig::Linear {
                base_ms: 10,
                increment_ms: 5
            }
        );
    }

    #[test]
    fn test_unknown_backoff_kind_rejected() {
        let toml_str = r#"
[retry]
backoff = { kind = "jittered", base_ms = 10 }
"#;
        assert!(toml::from_str::<EngineConfig>(toml_str).is_err());
    }
}
