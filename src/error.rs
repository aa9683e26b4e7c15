//! Error types for the telemetry publisher
//!
//! Only fatal startup errors propagate to `main` and halt the process;
//! runtime errors (connection loss, per-message delivery failures) are
//! absorbed and logged where they occur.

use thiserror::Error;

/// Main error type for publisher operations
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] crate::transport::mqtt::MqttError),

    #[error("Signal registration failed: {0}")]
    Signal(#[from] std::io::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl TelemetryError {
    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type for publisher operations
pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;

    #[test]
    fn test_config_error_conversion() {
        let err: TelemetryError = ConfigError::InvalidConfig("bad qos".to_string()).into();
        assert!(matches!(err, TelemetryError::Config(_)));
        assert!(err.to_string().contains("bad qos"));
    }

    #[test]
    fn test_internal_error_display() {
        let err = TelemetryError::internal("unexpected state");
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }
}
