use super::models::Config;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("download.segments must be at least 1")]
    ZeroSegments,

    #[error("http.{field} must be positive")]
    ZeroTimeout { field: &'static str },

    #[error("http.user_agent must not be empty")]
    EmptyUserAgent,

    #[error("download.merge_buffer must be positive")]
    ZeroMergeBuffer,
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_http(config)?;
    validate_download(config)?;
    Ok(())
}

fn validate_http(config: &Config) -> Result<(), ValidationError> {
    if config.http.connect_timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "connect_timeout_secs",
        });
    }

    if config.http.request_timeout_secs == 0 {
        return Err(ValidationError::ZeroTimeout {
            field: "request_timeout_secs",
        });
    }

    if config.http.user_agent.trim().is_empty() {
        return Err(ValidationError::EmptyUserAgent);
    }

    Ok(())
}

fn validate_download(config: &Config) -> Result<(), ValidationError> {
    if config.download.segments == 0 {
        return Err(ValidationError::ZeroSegments);
    }

    if config.download.merge_buffer.as_u64() == 0 {
        return Err(ValidationError::ZeroMergeBuffer);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::humanize::ByteSize;

    #[test]
    fn test_valid_config() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_segments() {
        let mut config = Config::default();
        config.download.segments = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroSegments)
        ));
    }

    #[test]
    fn test_zero_request_timeout() {
        let mut config = Config::default();
        config.http.request_timeout_secs = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroTimeout {
                field: "request_timeout_secs"
            })
        ));
    }

    #[test]
    fn test_blank_user_agent() {
        let mut config = Config::default();
        config.http.user_agent = "   ".to_string();

        assert!(matches!(
            validate(&config),
            Err(ValidationError::EmptyUserAgent)
        ));
    }

    #[test]
    fn test_zero_merge_buffer() {
        let mut config = Config::default();
        config.download.merge_buffer = ByteSize(0);

        assert!(matches!(
            validate(&config),
            Err(ValidationError::ZeroMergeBuffer)
        ));
    }
}
