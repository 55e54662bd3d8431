//! Structured logging setup

use crate::config::{parse_env_var, ConfigLoader};
use crate::error::{RecommenderError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl FromStr for LogFormat {
    type Err = RecommenderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(RecommenderError::invalid_config(
                format!("Unknown log format '{}'. Must be one of: json, pretty", other),
                "CINEREC_LOG_FORMAT",
            )),
        }
    }
}

/// Logging configuration
///
/// - `CINEREC_LOG_LEVEL` (default: "info"); `RUST_LOG` takes precedence when set
/// - `CINEREC_LOG_FORMAT` (default: "pretty")
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl ConfigLoader for LogConfig {
    fn from_env() -> Result<Self> {
        let defaults = LogConfig::default();
        Ok(Self {
            level: std::env::var("CINEREC_LOG_LEVEL").unwrap_or(defaults.level),
            format: parse_env_var("CINEREC_LOG_FORMAT", defaults.format)?,
        })
    }

    fn validate(&self) -> Result<()> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.level.to_lowercase().as_str()) {
            return Err(RecommenderError::invalid_config(
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.level,
                    valid_log_levels.join(", ")
                ),
                "CINEREC_LOG_LEVEL",
            ));
        }
        Ok(())
    }
}

/// Install the global tracing subscriber
///
/// # Errors
///
/// Returns `RecommenderError::Logging` if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };

    result.map_err(|e| RecommenderError::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_config_validation() {
        assert!(LogConfig::default().validate().is_ok());

        let config = LogConfig {
            level: "verbose".to_string(),
            format: LogFormat::Pretty,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_init_logging_twice_fails_cleanly() {
        let config = LogConfig {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        };
        // The first call may lose the race against another test in this binary
        let _ = init_logging(&config);
        let second = init_logging(&config);
        assert!(matches!(second, Err(RecommenderError::Logging(_))));
    }
}
