//! Errors raised by compute clients.

use thiserror::Error;

/// Errors that can occur while talking to the compute service.
///
/// None of these are retried by the harness; any of them aborts the
/// current trial.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClientError {
    /// The request never reached the service or the connection failed.
    #[error("Network error: {0}")]
    Network(String),

    /// The service rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The expression could not be evaluated.
    #[error("Malformed query: {0}")]
    MalformedQuery(String),

    /// A literal result would exceed the provider's element cap.
    #[error("Result exceeds the {limit} element limit")]
    ResultTooLarge { limit: usize },

    /// The service does not know the job.
    #[error("Unknown job: {0}")]
    UnknownJob(String),

    /// The response could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Any other non-success HTTP status.
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
}

impl ClientError {
    /// Shorthand for [`ClientError::MalformedQuery`].
    pub fn malformed(message: impl Into<String>) -> Self {
        ClientError::MalformedQuery(message.into())
    }
}
