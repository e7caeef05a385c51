//! Protocol error types.

/// Errors raised around the parser by the session layer.
///
/// The parser itself never fails; these describe streams that ended or grew
/// in ways the caller has to surface.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The stream ended while a tag was still open.
    #[error("stream ended inside an unclosed tag ({} bytes pending)", pending.len())]
    Truncated { pending: String },

    /// The held-back buffer grew past the configured limit.
    #[error("pending buffer of {size} bytes exceeds limit of {limit} bytes")]
    PendingOverflow { size: usize, limit: usize },

    /// The chunk source failed.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
