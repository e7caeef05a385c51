//! LLM provider abstraction.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use super::error::Result;
use super::types::{Message, StopReason};

/// Configuration for an LLM request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Conversation messages.
    pub messages: Vec<Message>,
    /// System prompt.
    pub system: Option<String>,
}

/// A streaming event from the LLM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionEvent {
    /// A chunk of response text.
    TextDelta(String),
    /// The completion has finished.
    Done { stop_reason: Option<StopReason> },
    /// The provider reported an error.
    Error(String),
}

/// Stream of completion events.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<CompletionEvent>> + Send>>;

/// Trait for LLM providers.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &'static str;

    /// Stream a completion request.
    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream>;
}
