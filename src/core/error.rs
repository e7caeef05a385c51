//! Error types for the core module.

use stream_protocol::ProtocolError;

use super::agent::AgentError;

/// Message shown to end users when a turn cannot be completed.
pub const USER_FACING_FAILURE: &str = "Something went wrong. Please try again.";

/// Core error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The markup stream could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The LLM request failed.
    #[error("agent error: {0}")]
    Agent(#[from] AgentError),

    /// Reading input failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Text safe to show to an end user.
    ///
    /// Stream failures collapse to one generic message; the cause belongs
    /// in the logs.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Protocol(_) | Self::Agent(_) => USER_FACING_FAILURE.to_string(),
            Self::Io(_) => self.to_string(),
        }
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
