use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "SLICEFETCH_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/slicefetch.toml";
const ENV_PREFIX: &str = "SLICEFETCH";
const ENV_SEPARATOR: &str = "__";

/// Load configuration with priority (lowest first):
/// 1. Defaults (embedded in structs)
/// 2. TOML file: `explicit`, else `$SLICEFETCH_CONFIG`, else the default path
/// 3. Variables from a `.env` file (via dotenvy)
/// 4. Process environment
pub fn load(explicit: Option<PathBuf>) -> Result<Config, ConfigError> {
    // a missing .env is the common case
    let _ = dotenvy::dotenv();

    let config_path = explicit
        .or_else(|| env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    load_from_sources(config_path)
}

/// Load from a specific file plus environment overrides
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::debug!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // SLICEFETCH__DOWNLOAD__SEGMENTS -> download.segments
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_only() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.download.segments, 4);
        assert_eq!(config.http.connect_timeout_secs, 10);
    }

    #[test]
    fn test_load_from_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test.toml");

        let toml_content = r#"
[http]
connect_timeout_secs = 3
request_timeout_secs = 45
user_agent = "mirror-sync/2.1"

[download]
segments = 16
temp_dir = "/var/tmp/segments"
merge_buffer = "256KB"
        "#;

        fs::write(&config_path, toml_content).unwrap();

        let config = load_from_sources(config_path).unwrap();
        assert_eq!(config.http.connect_timeout_secs, 3);
        assert_eq!(config.http.request_timeout_secs, 45);
        assert_eq!(config.http.user_agent, "mirror-sync/2.1");
        assert_eq!(config.download.segments, 16);
        assert_eq!(
            config.download.temp_dir,
            Some(PathBuf::from("/var/tmp/segments"))
        );
        assert_eq!(config.download.merge_buffer.as_u64(), 256 * 1024);
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[download]\nsegments = \"many\"\n").unwrap();

        assert!(load_from_sources(config_path).is_err());
    }
}
