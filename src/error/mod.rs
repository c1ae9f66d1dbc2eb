//! Error types for the AI gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Boxed underlying cause carried by provider errors
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Main error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error: {message}{}", format_status(.status))]
    TransientProvider {
        message: String,
        status: Option<u16>,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Retries exhausted after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: Box<GatewayError>,
    },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error kinds callers can branch on without matching payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Validation,
    TransientProvider,
    ExhaustedRetries,
    MalformedResponse,
    DimensionMismatch,
    Internal,
}

impl GatewayError {
    /// Build a provider error from a message and optional HTTP status
    pub fn provider(message: impl Into<String>, status: Option<u16>) -> Self {
        GatewayError::TransientProvider {
            message: message.into(),
            status,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Configuration(_) => ErrorKind::Configuration,
            GatewayError::Validation(_) => ErrorKind::Validation,
            GatewayError::TransientProvider { .. } => ErrorKind::TransientProvider,
            GatewayError::ExhaustedRetries { .. } => ErrorKind::ExhaustedRetries,
            GatewayError::MalformedResponse(_) => ErrorKind::MalformedResponse,
            GatewayError::DimensionMismatch { .. } => ErrorKind::DimensionMismatch,
            GatewayError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status of the underlying provider failure, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GatewayError::TransientProvider { status, .. } => *status,
            GatewayError::ExhaustedRetries { source, .. } => source.status_code(),
            _ => None,
        }
    }

    /// Whether the retry executor may attempt the operation again
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::TransientProvider { .. })
    }
}

fn format_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return GatewayError::MalformedResponse(err.to_string());
        }

        let message = if err.is_timeout() {
            "Request timed out".to_string()
        } else if err.is_connect() {
            "Connection failed".to_string()
        } else {
            "Request failed".to_string()
        };

        GatewayError::TransientProvider {
            message,
            status: err.status().map(|s| s.as_u16()),
            source: Some(Box::new(err)),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        GatewayError::MalformedResponse(err.to_string())
    }
}

impl From<config::ConfigError> for GatewayError {
    fn from(err: config::ConfigError) -> Self {
        GatewayError::Configuration(err.to_string())
    }
}
