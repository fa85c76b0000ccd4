use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;
use tracing::Level;

/// Server configuration as read from YAML.
///
/// Every field has a default, so an empty file (or no file) is valid.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    /// Storage directory for the durable store. Accounts live in memory when unset.
    pub directory: Option<String>,
    pub log_level: String,
    pub json_logs: bool,
    pub session_ttl_secs: u64,
    pub worker_threads: usize,
    pub rate_limit: Option<RateLimit>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            directory: None,
            log_level: "info".to_string(),
            json_logs: false,
            session_ttl_secs: 7 * 24 * 60 * 60,
            worker_threads: 2,
            rate_limit: None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RateLimit {
    /// Seconds to replenish one request
    pub per_second: u64,
    pub burst: u32,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid log level: {value}")]
    InvalidLogLevel { value: String },
    #[error("{field} must be > 0 (got {value})")]
    InvalidNonZero { field: &'static str, value: u64 },
}

pub struct ValidatedConfig {
    pub port: u16,
    pub directory: Option<PathBuf>,
    pub log_level: Level,
    pub json_logs: bool,
    pub session_ttl: Duration,
    pub worker_threads: usize,
    pub rate_limit: Option<RateLimit>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(self) -> Result<ValidatedConfig, ConfigError> {
        let non_zero = [
            ("session_ttl_secs", self.session_ttl_secs),
            ("worker_threads", self.worker_threads as u64),
        ];
        for (field, value) in non_zero {
            if value == 0 {
                return Err(ConfigError::InvalidNonZero { field, value });
            }
        }
        if let Some(limit) = &self.rate_limit {
            if limit.per_second == 0 {
                return Err(ConfigError::InvalidNonZero {
                    field: "rate_limit.per_second",
                    value: 0,
                });
            }
            if limit.burst == 0 {
                return Err(ConfigError::InvalidNonZero {
                    field: "rate_limit.burst",
                    value: 0,
                });
            }
        }

        let log_level =
            Level::from_str(&self.log_level).map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })?;

        Ok(ValidatedConfig {
            port: self.port,
            directory: self.directory.map(PathBuf::from),
            log_level,
            json_logs: self.json_logs,
            session_ttl: Duration::from_secs(self.session_ttl_secs),
            worker_threads: self.worker_threads,
            rate_limit: self.rate_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: Config = serde_yaml::from_str("port: 9000\nlog_level: debug\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.session_ttl_secs, Config::default().session_ttl_secs);

        let validated = config.validate().unwrap();
        assert_eq!(validated.log_level, Level::DEBUG);
        assert!(validated.directory.is_none());
        assert!(validated.rate_limit.is_none());
    }

    #[test]
    fn test_rate_limit_yaml() {
        let config: Config = serde_yaml::from_str(
            "directory: /tmp/bourse\nrate_limit:\n  per_second: 2\n  burst: 50\n",
        )
        .unwrap();
        let validated = config.validate().unwrap();
        assert_eq!(validated.directory, Some(PathBuf::from("/tmp/bourse")));
        assert_eq!(
            validated.rate_limit,
            Some(RateLimit {
                per_second: 2,
                burst: 50
            })
        );
    }

    #[test]
    fn test_invalid_config() {
        let config = Config {
            log_level: "loud".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogLevel { .. })
        ));

        let config = Config {
            session_ttl_secs: 0,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidNonZero {
                field: "session_ttl_secs",
                ..
            })
        ));

        let config = Config {
            rate_limit: Some(RateLimit {
                per_second: 1,
                burst: 0,
            }),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = Config::load(Path::new("/nonexistent/bourse.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
