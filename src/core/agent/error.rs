//! Agent error types.

/// Errors talking to the LLM.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// API key not configured.
    #[error("API key not configured (set {0})")]
    ApiKeyMissing(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The provider reported an error mid-stream.
    #[error("stream error: {0}")]
    Stream(String),

    /// Failed to read the system prompt.
    #[error("failed to read system prompt: {0}")]
    SystemPrompt(#[from] std::io::Error),
}

/// Result type for agent operations.
pub type Result<T> = std::result::Result<T, AgentError>;
