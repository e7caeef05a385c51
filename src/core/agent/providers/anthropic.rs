//! Anthropic (Claude) provider implementation.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};

use crate::core::agent::error::{AgentError, Result};
use crate::core::agent::provider::{
    CompletionEvent, CompletionRequest, CompletionStream, LlmProvider,
};
use crate::core::agent::types::{Delta, MessagesRequest, StreamEvent};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

/// Anthropic (Claude) LLM provider.
#[derive(Debug, Clone)]
pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(AgentError::ApiKeyMissing("the API key".to_string()));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            api_key,
            url: API_URL.to_string(),
        })
    }

    /// Send requests to a different Messages API endpoint.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| AgentError::ApiKeyMissing("a valid API key".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));

        let body = MessagesRequest {
            model: request.model,
            max_tokens: request.max_tokens,
            messages: request.messages,
            system: request.system,
            stream: true,
        };

        tracing::debug!(model = %body.model, url = %self.url, "sending messages request");

        let response = self
            .http
            .post(&self.url)
            .headers(headers)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(AgentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let byte_stream = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut buffer: Vec<u8> = Vec::new();

            futures::pin_mut!(byte_stream);

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(AgentError::Http(e));
                        return;
                    }
                };
                buffer.extend_from_slice(&chunk);

                while let Some(event_opt) = parse_sse_event(&mut buffer) {
                    let Some(event) = event_opt else {
                        continue;
                    };

                    match event {
                        StreamEvent::ContentBlockDelta { delta: Delta::TextDelta { text }, .. } => {
                            yield Ok(CompletionEvent::TextDelta(text));
                        }
                        StreamEvent::MessageDelta { delta } => {
                            yield Ok(CompletionEvent::Done { stop_reason: delta.stop_reason });
                        }
                        StreamEvent::Error { error } => {
                            yield Ok(CompletionEvent::Error(error.message));
                        }
                        _ => {}
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Take one complete SSE frame off the front of `buffer` and decode it.
///
/// Frames are split on the blank line at byte level, so a character cut
/// between two network reads is only decoded once its frame is whole.
/// Returns `None` until a full frame is buffered, and `Some(None)` for
/// frames without a usable `data:` line.
fn parse_sse_event(buffer: &mut Vec<u8>) -> Option<Option<StreamEvent>> {
    let end = buffer.windows(2).position(|w| w == b"\n\n")?;
    let frame: Vec<u8> = buffer.drain(..end + 2).collect();

    let Ok(frame) = std::str::from_utf8(&frame[..end]) else {
        tracing::debug!(len = end, "skipping frame with invalid UTF-8");
        return Some(None);
    };

    let data = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .last();

    let Some(data) = data else {
        return Some(None);
    };

    match serde_json::from_str::<StreamEvent>(data) {
        Ok(event) => Some(Some(event)),
        Err(e) => {
            tracing::debug!(data = %data, error = %e, "failed to parse event");
            Some(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::agent::types::StopReason;

    #[test]
    fn provider_requires_api_key() {
        let result = AnthropicProvider::new("");
        assert!(result.is_err());
    }

    #[test]
    fn provider_accepts_valid_key() {
        let result = AnthropicProvider::new("test-key");
        assert!(result.is_ok());
    }

    #[test]
    fn parse_sse_event_waits_for_blank_line() {
        let mut buffer = b"event: ping\ndata: {\"type\":\"ping\"}\n".to_vec();
        assert!(parse_sse_event(&mut buffer).is_none());
        assert!(!buffer.is_empty());
    }

    #[test]
    fn parse_sse_event_decodes_text_delta() {
        let mut buffer = concat!(
            "event: content_block_delta\n",
            "data: {\"type\":\"content_block_delta\",\"index\":0,",
            "\"delta\":{\"type\":\"text_delta\",\"text\":\"<progress\"}}\n\n",
            "event: ping\n"
        )
        .as_bytes()
        .to_vec();
        let event = parse_sse_event(&mut buffer).unwrap();
        assert!(matches!(
            event,
            Some(StreamEvent::ContentBlockDelta {
                delta: Delta::TextDelta { ref text },
                ..
            }) if text == "<progress"
        ));
        assert_eq!(buffer, b"event: ping\n");
    }

    #[test]
    fn frame_split_inside_multibyte_char_is_decoded_whole() {
        let frame = concat!(
            "data: {\"type\":\"content_block_delta\",\"index\":0,",
            "\"delta\":{\"type\":\"text_delta\",\"text\":\"<stream_item icon=\\\"🔍\\\">\"}}\n\n"
        )
        .as_bytes();
        // Cut two bytes into the four-byte icon.
        let cut = frame.windows(4).position(|w| w == "🔍".as_bytes()).unwrap() + 2;

        let mut buffer = frame[..cut].to_vec();
        assert!(parse_sse_event(&mut buffer).is_none());

        buffer.extend_from_slice(&frame[cut..]);
        let event = parse_sse_event(&mut buffer).unwrap();
        assert!(matches!(
            event,
            Some(StreamEvent::ContentBlockDelta {
                delta: Delta::TextDelta { ref text },
                ..
            }) if text == "<stream_item icon=\"🔍\">"
        ));
        assert!(buffer.is_empty());
    }

    #[test]
    fn parse_sse_event_decodes_stop_reason() {
        let mut buffer = b"data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"max_tokens\"},\"usage\":{\"output_tokens\":5}}\n\n".to_vec();
        let event = parse_sse_event(&mut buffer).unwrap();
        assert!(matches!(
            event,
            Some(StreamEvent::MessageDelta { delta }) if delta.stop_reason == Some(StopReason::MaxTokens)
        ));
    }

    #[test]
    fn parse_sse_event_maps_unknown_types_to_other() {
        let mut buffer = b"data: {\"type\":\"ping\"}\n\n".to_vec();
        let event = parse_sse_event(&mut buffer).unwrap();
        assert!(matches!(event, Some(StreamEvent::Other)));
    }

    #[test]
    fn parse_sse_event_skips_invalid_json() {
        let mut buffer = b"data: {oops\n\nrest".to_vec();
        let event = parse_sse_event(&mut buffer).unwrap();
        assert!(event.is_none());
        assert_eq!(buffer, b"rest");
    }
}
