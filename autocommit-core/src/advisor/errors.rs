//! Error types for advisor operations

use std::time::Duration;
use thiserror::Error;

/// Error raised by an advisory collaborator
#[derive(Debug, Clone, Error)]
pub enum AdvisorError {
    /// The backing command is missing or could not be started
    #[error("Advisor command '{command}' is not available: {message}")]
    Unavailable { command: String, message: String },

    /// The collaborator did not answer in time
    #[error("Advisor timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// The collaborator ran and reported failure
    #[error("Advisor failed: {message}")]
    Failed { message: String },

    /// The response did not match the expected shape
    #[error("Malformed advisor response: {message}")]
    MalformedResponse { message: String },

    /// The response was empty
    #[error("Advisor returned an empty response")]
    EmptyResponse,

    /// No advisor is configured
    #[error("No advisor configured")]
    NotConfigured,
}
