//! Error handling for stackgauge
//!
//! Provides a unified error type and result type for the collection engine and
//! the backend ports it talks to.

/// Result type alias for stackgauge operations
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for stackgauge
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    InvalidConfiguration(String),

    /// Network-level failure talking to a backend
    #[error("Transport error: {0}")]
    Transport(String),

    /// A backend call exceeded its deadline
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// The backend rejected the held credential as expired or invalid
    #[error("Authorization expired: {0}")]
    AuthExpired(String),

    /// Re-authentication failed, or the retried call was still rejected
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// Malformed backend response
    #[error("Decode error: {0}")]
    Decode(String),

    /// No usable endpoint in the service catalog
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// Invalid request or parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration parsing errors
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Create a transport error
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create an authorization-expired error
    pub fn auth_expired(msg: impl Into<String>) -> Self {
        Self::AuthExpired(msg.into())
    }

    /// Create an authentication-failed error
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthFailed(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create an endpoint-not-found error
    pub fn endpoint_not_found(msg: impl Into<String>) -> Self {
        Self::EndpointNotFound(msg.into())
    }

    /// Create an invalid request error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// True for the signal that triggers a single re-authentication and retry
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Error::AuthExpired(_))
    }

    /// Get the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::InvalidConfiguration(_) => "configuration",
            Error::Transport(_) => "transport",
            Error::Timeout(_) => "timeout",
            Error::AuthExpired(_) => "auth_expired",
            Error::AuthFailed(_) => "auth_failed",
            Error::Decode(_) => "decode",
            Error::EndpointNotFound(_) => "endpoint_not_found",
            Error::InvalidRequest(_) => "invalid_request",
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Config(_) => "config",
            Error::Other(_) => "other",
        }
    }
}

/// Extension trait for adding context to Results
pub trait ErrorContext<T> {
    /// Add context to an error
    fn with_context(self, context: impl Into<String>) -> Result<T>;

    /// Add context to an error using a closure
    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn with_context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let original_error = e.into();
            Error::Other(anyhow::anyhow!("{}: {}", context.into(), original_error))
        })
    }

    fn with_context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let original_error = e.into();
            Error::Other(anyhow::anyhow!("{}: {}", f(), original_error))
        })
    }
}
