//! Error types for Leaf client operations

use thiserror::Error;

/// Result type alias for Leaf client operations
pub type Result<T> = std::result::Result<T, LeafClientError>;

/// Errors that can occur inside the client.
///
/// These are only visible to code inside the crate and to logs. The public
/// command surface collapses all of them to [`CommandFailed`].
#[derive(Error, Debug)]
pub enum LeafClientError {
    /// The caller's time budget ran out before a request could be sent
    #[error("No time left for {0}")]
    BudgetExhausted(String),

    /// The request was aborted because the budget expired while in flight
    #[error("Request {0} timed out")]
    Timeout(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Upstream answered with a non-2xx transport status
    #[error("Request {endpoint} failed with HTTP {status}")]
    HttpStatus { endpoint: String, status: u16 },

    /// Upstream answered 2xx but the embedded envelope status was not 200
    #[error("Request {endpoint} rejected by upstream (status {status:?})")]
    Rejected {
        endpoint: String,
        status: Option<i64>,
    },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Login succeeded but carried no usable vehicle
    #[error("No vehicle in login response")]
    NoVehicle,

    /// Password encryption failed; the key material is malformed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Credentials with an empty field
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl LeafClientError {
    /// Create a rejection error for an endpoint
    pub fn rejected(endpoint: impl Into<String>, status: Option<i64>) -> Self {
        Self::Rejected {
            endpoint: endpoint.into(),
            status,
        }
    }

    /// Whether this error is the client's own time budget expiring
    pub fn is_budget(&self) -> bool {
        matches!(self, Self::BudgetExhausted(_) | Self::Timeout(_))
    }
}

/// The single failure signal returned by every command.
///
/// Carries no payload. The underlying cause has already been logged.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("command failed")]
pub struct CommandFailed;

impl From<LeafClientError> for CommandFailed {
    fn from(_: LeafClientError) -> Self {
        CommandFailed
    }
}
