//! Configuration management for slicefetch
//!
//! Settings are layered, lowest priority first:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables
//!
//! # Usage
//!
//! ```no_run
//! use slicefetch::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Default segment count: {}", config.download.segments);
//! ```
//!
//! # Environment Variables
//!
//! Any key can be overridden with `SLICEFETCH__<section>__<key>`:
//! - `SLICEFETCH__DOWNLOAD__SEGMENTS=16`
//! - `SLICEFETCH__DOWNLOAD__MERGE_BUFFER=1MB`
//! - `SLICEFETCH__HTTP__REQUEST_TIMEOUT_SECS=60`
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/slicefetch.toml`.
//! This can be overridden using the `SLICEFETCH_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use crate::humanize::ByteSize;
pub use models::{Config, DownloadConfig, HttpSettings};
pub use validation::ValidationError;

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from the default file location and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], with an explicit file taking precedence over
    /// `SLICEFETCH_CONFIG` and the default path
    pub fn load_with(path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let config = sources::load(path)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path (environment still applies)
    pub fn load_from_path(path: PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_minimal_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[download]\nsegments = 8\n").unwrap();

        let config = Config::load_from_path(config_path).unwrap();
        assert_eq!(config.download.segments, 8);
        assert_eq!(config.download.merge_buffer.as_u64(), 64 * 1024);
    }

    #[test]
    fn test_validation_runs_after_loading() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[download]\nsegments = 0\n").unwrap();

        let result = Config::load_from_path(config_path);
        assert!(matches!(
            result.unwrap_err(),
            ConfigError::ValidationError(ValidationError::ZeroSegments)
        ));
    }

    #[test]
    fn test_unparsable_size_is_a_load_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        fs::write(&config_path, "[download]\nmerge_buffer = \"lots\"\n").unwrap();

        assert!(matches!(
            Config::load_from_path(config_path),
            Err(ConfigError::LoadError(_))
        ));
    }
}
