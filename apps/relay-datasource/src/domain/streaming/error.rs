//! Upstream error kinds.

/// Boxed transport error carried by `UpstreamError::Connection`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors reported by the upstream connector.
///
/// A clean remote close is not an error; readers report it as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    /// Endpoint or credential is missing or malformed. Never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Dial, read or write failed.
    #[error("connection error: {0}")]
    Connection(#[source] BoxError),

    /// A frame exceeded the configured maximum size.
    #[error("frame of {size} bytes exceeds maximum of {max} bytes")]
    FrameTooLarge {
        /// Size of the offending frame.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
}

impl UpstreamError {
    /// Wrap a transport error.
    pub fn connection(err: impl Into<BoxError>) -> Self {
        Self::Connection(err.into())
    }

    /// Whether a supervisor may reconnect after this error.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Configuration(_))
    }

    /// Short label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Connection(_) => "connection",
            Self::FrameTooLarge { .. } => "frame_too_large",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_is_not_retryable() {
        assert!(!UpstreamError::Configuration("x".to_string()).is_retryable());
        assert!(UpstreamError::connection("reset").is_retryable());
        assert!(UpstreamError::FrameTooLarge { size: 10, max: 5 }.is_retryable());
    }

    #[test]
    fn connection_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = UpstreamError::connection(io);
        assert_eq!(err.kind(), "connection");
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn frame_too_large_message() {
        let err = UpstreamError::FrameTooLarge {
            size: 6000,
            max: 5096,
        };
        assert_eq!(
            err.to_string(),
            "frame of 6000 bytes exceeds maximum of 5096 bytes"
        );
    }
}
