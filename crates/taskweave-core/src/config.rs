//! Engine configuration loader.
//!
//! Reads an optional `taskweave.toml` and deserializes it into
//! [`EngineConfig`]. [`load_engine_config`] falls back to defaults when the
//! file is missing or malformed; [`read_engine_config`] surfaces the error
//! instead.

use std::path::{Path, PathBuf};

use taskweave_types::config::{BackoffConfig, EngineConfig};

/// Conventional file name for engine configuration.
pub const CONFIG_FILE_NAME: &str = "taskweave.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse engine config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid engine config: {0}")]
    Invalid(String),
}

/// Parse and validate engine configuration from TOML text.
pub fn parse_engine_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
    if config.retry.max_attempts == 0 {
        return Err(ConfigError::Invalid(
            "retry.max_attempts must be at least 1".to_string(),
        ));
    }
    if let BackoffConfig::Exponential { factor, .. } = config.retry.backoff {
        if !factor.is_finite() || factor < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "retry.backoff.factor must be a non-negative number, got {factor}"
            )));
        }
    }
    Ok(())
}

/// Read engine configuration from `path`, surfacing any failure.
pub async fn read_engine_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    parse_engine_config(&content)
}

/// Load engine configuration from `path`.
///
/// - Missing file: returns [`EngineConfig::default()`].
/// - Unreadable, malformed or invalid file: logs a warning and returns the
///   default.
pub async fn load_engine_config(path: &Path) -> EngineConfig {
    match read_engine_config(path).await {
        Ok(config) => config,
        Err(ConfigError::Read { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No engine config at {}, using defaults", path.display());
            EngineConfig::default()
        }
        Err(err) => {
            tracing::warn!("{err} ({}), using defaults", path.display());
            EngineConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn parse_rejects_zero_attempts() {
        let err = parse_engine_config("[retry]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn parse_rejects_negative_factor() {
        let content = r#"
[retry]
backoff = { kind = "exponential", base_ms = 10, factor = -2.0, max_ms = 100 }
"#;
        assert!(matches!(
            parse_engine_config(content),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn parse_reports_syntax_errors() {
        assert!(matches!(
            parse_engine_config("this is not { valid toml !!!"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn load_engine_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_engine_config(&tmp.path().join(CONFIG_FILE_NAME)).await;
        assert_eq!(config, EngineConfig::default());
    }

    #[tokio::test]
    async fn load_engine_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(
            &path,
            r#"
[retry]
max_attempts = 4

[circuit_breaker]
failure_threshold = 2

[timeout]
default_timeout_ms = 750
"#,
        )
        .await
        .unwrap();

        let config = load_engine_config(&path).await;
        assert_eq!(config.retry.max_attempts, 4);
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.timeout.default_timeout(), Duration::from_millis(750));
    }

    #[tokio::test]
    async fn load_engine_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        tokio::fs::write(&path, "[retry]\nmax_attempts = \"many\"\n")
            .await
            .unwrap();

        let config = load_engine_config(&path).await;
        assert_eq!(config, EngineConfig::default());
    }

    #[tokio::test]
    async fn read_engine_config_surfaces_missing_file() {
        let tmp = TempDir::new().unwrap();
        let err = read_engine_config(&tmp.path().join("absent.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }
}
