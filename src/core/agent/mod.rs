//! LLM-backed director turns.
//!
//! The provider produces raw text deltas; a turn pipes them through a
//! [`StreamSession`] so callers only ever see protocol events.

mod error;
mod provider;
pub mod providers;
mod types;

use std::path::Path;
use std::pin::Pin;

use futures::{Stream, StreamExt};
use stream_protocol::{Event, StreamSession, event_stream};

pub use error::{AgentError, Result};
pub use provider::{CompletionEvent, CompletionRequest, CompletionStream, LlmProvider};
pub use providers::AnthropicProvider;
pub use types::{Message, MessagesRequest, Role, StopReason, StreamEvent};

/// Stream of protocol events for one turn.
pub type EventStream = Pin<Box<dyn Stream<Item = stream_protocol::Result<Event>> + Send>>;

/// Run one assistant turn and decode its markup.
///
/// The returned stream ends with [`Event::Done`] or a protocol error.
/// Provider failures after the request was accepted surface as
/// [`stream_protocol::ProtocolError::Transport`].
///
/// # Errors
///
/// Returns an error if the provider rejects the request.
pub async fn stream_turn(
    provider: &dyn LlmProvider,
    request: CompletionRequest,
    session: StreamSession,
) -> Result<EventStream> {
    tracing::info!(
        provider = provider.name(),
        model = %request.model,
        messages = request.messages.len(),
        "starting director turn"
    );

    let completion = provider.stream(request).await?;

    let chunks = completion.filter_map(|event| async move {
        match event {
            Ok(CompletionEvent::TextDelta(text)) => Some(Ok(text)),
            Ok(CompletionEvent::Done { stop_reason }) => {
                if stop_reason == Some(StopReason::MaxTokens) {
                    tracing::warn!("response stopped at the token limit");
                }
                None
            }
            Ok(CompletionEvent::Error(message)) => Some(Err(AgentError::Stream(message))),
            Err(e) => Some(Err(e)),
        }
    });

    Ok(Box::pin(event_stream(session, chunks)))
}

/// Read a system prompt file, if one is configured.
///
/// # Errors
///
/// Returns an error if the file cannot be read.
pub fn load_system_prompt(path: Option<&Path>) -> Result<Option<String>> {
    path.map(std::fs::read_to_string)
        .transpose()
        .map_err(AgentError::from)
}
