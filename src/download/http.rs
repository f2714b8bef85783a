//! HTTP transport for probes, ranged GETs and whole-file GETs

use super::plan::ByteRange;
use bytes::Bytes;
use reqwest::header::{CONTENT_LENGTH, RANGE};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("response has no Content-Length header")]
    MissingContentLength,

    #[error("invalid Content-Length header: {0}")]
    InvalidContentLength(String),

    #[error("HTTP request failed: {0}")]
    Request(String),

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

impl TransportError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub connect_timeout: Duration,
    /// Upper bound for a whole request, body included
    pub request_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            user_agent: concat!("slicefetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Thin wrapper around a shared `reqwest::Client`; cheap to clone
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;

        Ok(Self { client })
    }

    /// Issue a HEAD request and return the advertised content length
    pub async fn probe(&self, url: &str) -> Result<u64> {
        debug!(url, "Probing content length");

        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let response = check_status(response)?;

        let value = response
            .headers()
            .get(CONTENT_LENGTH)
            .ok_or(TransportError::MissingContentLength)?;

        let text = value
            .to_str()
            .map_err(|e| TransportError::InvalidContentLength(e.to_string()))?;

        text.trim()
            .parse::<u64>()
            .map_err(|_| TransportError::InvalidContentLength(text.to_string()))
    }

    /// GET one byte range; any 2xx is accepted
    pub async fn get_range(&self, url: &str, range: &ByteRange) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .header(RANGE, range.header_value())
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        check_status(response)
    }

    /// Unranged GET of the whole resource
    pub async fn get(&self, url: &str) -> Result<Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        check_status(response)
    }
}

/// Pull the next body chunk, mapping read failures and timeouts
pub(crate) async fn next_chunk(response: &mut Response) -> Result<Option<Bytes>> {
    response.chunk().await.map_err(TransportError::from_reqwest)
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.as_u16() >= StatusCode::MULTIPLE_CHOICES.as_u16() {
        return Err(TransportError::Status(status.as_u16()));
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_config_defaults() {
        let config = HttpConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.request_timeout, Duration::from_secs(300));
        assert!(config.user_agent.starts_with("slicefetch/"));
    }

    #[test]
    fn test_client_builds_from_defaults() {
        assert!(HttpClient::new(&HttpConfig::default()).is_ok());
    }
}
