//! Settings for the producer/consumer demo, read from TOML.
//!
//! ```toml
//! capacity = 5
//! producers = 1
//! consumers = 1
//! produce_interval_ms = 10
//! consume_interval_ms = 10000
//! run_for_ms = 1000
//! log_filter = "info"
//! ```
//!
//! Every key is optional; missing keys take the values above.

use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

/// Upper bound on `producers` and on `consumers`; each one is a thread.
pub const MAX_WORKERS: usize = 64;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub capacity: NonZeroUsize,
    pub producers: usize,
    pub consumers: usize,
    pub produce_interval_ms: u64,
    pub consume_interval_ms: u64,
    pub run_for_ms: u64,
    /// Used when `RUST_LOG` is not set.
    pub log_filter: String,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            capacity: NonZeroUsize::MIN.saturating_add(4),
            producers: 1,
            consumers: 1,
            produce_interval_ms: 10,
            consume_interval_ms: 10_000,
            run_for_ms: 1_000,
            log_filter: "info".to_string(),
        }
    }
}

impl DemoConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: DemoConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, count) in [("producers", self.producers), ("consumers", self.consumers)] {
            if count == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "at least one is required".to_string(),
                });
            }
            if count > MAX_WORKERS {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("{} exceeds the limit of {}", count, MAX_WORKERS),
                });
            }
        }
        if self.run_for_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "run_for_ms",
                reason: "must be greater than 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn produce_interval(&self) -> Duration {
        Duration::from_millis(self.produce_interval_ms)
    }

    pub fn consume_interval(&self) -> Duration {
        Duration::from_millis(self.consume_interval_ms)
    }

    pub fn run_for(&self) -> Duration {
        Duration::from_millis(self.run_for_ms)
    }
}
