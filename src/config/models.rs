use crate::download::{DownloadSettings, HttpConfig};
use crate::humanize::ByteSize;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub http: HttpSettings,
    #[serde(default)]
    pub download: DownloadConfig,
}

/// Outbound HTTP behaviour shared by probes and segment requests
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpSettings {
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Bounds each HEAD and each ranged GET, body included
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpSettings {
    pub fn to_http_config(&self) -> HttpConfig {
        HttpConfig {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_user_agent() -> String {
    HttpConfig::default().user_agent
}

/// Chunked download defaults
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DownloadConfig {
    /// Segment count used when the command line does not give one
    #[serde(default = "default_segments")]
    pub segments: usize,
    /// Directory for segment artifacts (destination's directory when unset)
    pub temp_dir: Option<PathBuf>,
    /// Copy buffer used while merging
    #[serde(default = "default_merge_buffer")]
    pub merge_buffer: ByteSize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            segments: default_segments(),
            temp_dir: None,
            merge_buffer: default_merge_buffer(),
        }
    }
}

impl DownloadConfig {
    pub fn to_settings(&self) -> DownloadSettings {
        DownloadSettings {
            temp_dir: self.temp_dir.clone(),
            merge_buffer: self.merge_buffer.as_usize(),
        }
    }
}

fn default_segments() -> usize {
    4
}

fn default_merge_buffer() -> ByteSize {
    ByteSize(64 * 1024)
}
