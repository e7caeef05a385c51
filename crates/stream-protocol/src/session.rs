//! Per-turn buffer ownership on top of the stateless parser.

use futures::{Stream, StreamExt};

use crate::error::{ProtocolError, Result};
use crate::event::Event;
use crate::parser::StreamParser;
use crate::scanner;

/// Default cap on text held back for an unclosed tag (1 MiB).
pub const DEFAULT_MAX_PENDING_BYTES: usize = 1_048_576;

/// Owns the parser buffer for one assistant turn.
///
/// Feed chunks in arrival order with [`feed`](Self::feed), then call
/// [`finish`](Self::finish) exactly once when the transport reports the end
/// of the response.
#[derive(Debug, Clone)]
pub struct StreamSession {
    parser: StreamParser,
    buffer: String,
    max_pending_bytes: Option<usize>,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new(StreamParser::default())
    }
}

impl StreamSession {
    /// Create a session with the default pending limit.
    #[must_use]
    pub const fn new(parser: StreamParser) -> Self {
        Self {
            parser,
            buffer: String::new(),
            max_pending_bytes: Some(DEFAULT_MAX_PENDING_BYTES),
        }
    }

    /// Set or remove the pending limit.
    #[must_use]
    pub fn with_max_pending_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_pending_bytes = limit;
        self
    }

    /// Restore a session from a persisted buffer.
    #[must_use]
    pub fn with_buffer(mut self, buffer: impl Into<String>) -> Self {
        self.buffer = buffer.into();
        self
    }

    /// Text currently held back.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Discard the buffer before a new turn.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Parse one chunk.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PendingOverflow`] when the held-back text
    /// exceeds the limit. The turn cannot recover from this.
    pub fn feed(&mut self, chunk: &str) -> Result<Vec<Event>> {
        let out = self.parser.parse(&self.buffer, chunk);
        self.buffer = out.remaining_buffer;

        if let Some(limit) = self.max_pending_bytes {
            if self.buffer.len() > limit {
                return Err(ProtocolError::PendingOverflow {
                    size: self.buffer.len(),
                    limit,
                });
            }
        }

        Ok(out.events)
    }

    /// Flush at end of stream.
    ///
    /// Returns the flushed events followed by [`Event::Done`].
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] if a tag is still open.
    pub fn finish(&mut self) -> Result<Vec<Event>> {
        let buffer = std::mem::take(&mut self.buffer);
        let out = self.parser.finish(&buffer);

        if !out.remaining_buffer.is_empty() {
            tracing::warn!(
                pending = out.remaining_buffer.len(),
                fragment = %scanner::truncate(&out.remaining_buffer, 80),
                "stream ended inside an unclosed tag"
            );
            return Err(ProtocolError::Truncated {
                pending: out.remaining_buffer,
            });
        }

        let mut events = out.events;
        events.push(Event::Done);
        Ok(events)
    }
}

/// Turn a stream of text chunks into a stream of events.
///
/// The stream ends after [`Event::Done`], or after the first error: a failed
/// chunk becomes [`ProtocolError::Transport`], and session errors are passed
/// through.
pub fn event_stream<S, E>(mut session: StreamSession, chunks: S) -> impl Stream<Item = Result<Event>>
where
    S: Stream<Item = std::result::Result<String, E>>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        futures::pin_mut!(chunks);

        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield Err(ProtocolError::Transport(e.to_string()));
                    return;
                }
            };

            match session.feed(&chunk) {
                Ok(events) => {
                    for event in events {
                        yield Ok(event);
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        match session.finish() {
            Ok(events) => {
                for event in events {
                    yield Ok(event);
                }
            }
            Err(e) => yield Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ProgressState;
    use futures::stream;

    fn ok_chunks(chunks: &[&str]) -> Vec<std::result::Result<String, String>> {
        chunks.iter().map(|c| Ok((*c).to_string())).collect()
    }

    #[test]
    fn feed_carries_buffer_between_chunks() {
        let mut session = StreamSession::default();

        let events = session.feed("Hi <progress step=\"1\"").unwrap();
        assert_eq!(events, vec![Event::chat("Hi ")]);
        assert_eq!(session.pending(), "<progress step=\"1\"");

        let events = session.feed(" state=\"active\"/>").unwrap();
        assert_eq!(
            events,
            vec![Event::Progress {
                step: 1,
                state: ProgressState::Active,
            }]
        );
        assert!(session.pending().is_empty());
    }

    #[test]
    fn finish_appends_done() {
        let mut session = StreamSession::default();
        session.feed("all good").unwrap();
        assert_eq!(session.finish().unwrap(), vec![Event::Done]);
    }

    #[test]
    fn finish_flushes_dangling_angle_bracket() {
        let mut session = StreamSession::default();
        assert_eq!(session.feed("x <").unwrap(), vec![Event::chat("x ")]);
        assert_eq!(
            session.finish().unwrap(),
            vec![Event::chat("<"), Event::Done]
        );
    }

    #[test]
    fn finish_reports_truncated_tag() {
        let mut session = StreamSession::default();
        session.feed("<output type=\"x\">{\"a\"").unwrap();

        let err = session.finish().unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Truncated {
                pending: "<output type=\"x\">{\"a\"".to_string(),
            }
        );
        assert!(session.pending().is_empty());
    }

    #[test]
    fn overflow_is_reported() {
        let mut session = StreamSession::default().with_max_pending_bytes(Some(16));
        let err = session
            .feed("<output type=\"x\">{\"long\": \"payload\"")
            .unwrap_err();
        assert!(matches!(err, ProtocolError::PendingOverflow { limit: 16, .. }));
    }

    #[test]
    fn no_limit_allows_large_pending() {
        let mut session = StreamSession::default().with_max_pending_bytes(None);
        let body = "x".repeat(4096);
        session.feed(&format!("<output type=\"x\">\"{body}")).unwrap();
        assert!(session.pending().len() > 4096);
    }

    #[test]
    fn self_closed_block_does_not_hold_the_turn() {
        let mut session = StreamSession::default();
        let events = session
            .feed("Hi <stream_block/> and more prose <progress step=\"1\" state=\"done\"/> end")
            .unwrap();

        assert_eq!(
            events,
            vec![
                Event::chat("Hi <stream_block/> and more prose "),
                Event::Progress {
                    step: 1,
                    state: ProgressState::Done,
                },
                Event::chat(" end"),
            ]
        );
        assert!(session.pending().is_empty());
        assert_eq!(session.finish().unwrap(), vec![Event::Done]);
    }

    #[test]
    fn restored_buffer_resumes_parsing() {
        let mut session = StreamSession::default().with_buffer("<whats_next clear=");
        let events = session.feed("\"true\"/>").unwrap();
        assert_eq!(events, vec![Event::WhatsNextClear]);
    }

    #[test]
    fn reset_discards_pending() {
        let mut session = StreamSession::default();
        session.feed("<stream_block>").unwrap();
        session.reset();
        assert_eq!(session.finish().unwrap(), vec![Event::Done]);
    }

    #[test]
    fn event_stream_ends_with_done() {
        let chunks = stream::iter(ok_chunks(&["<output type=\"a\">{\"n\"", ":1}</o>", " ok"]));
        let events: Vec<_> = tokio_test::block_on(
            event_stream(StreamSession::default(), chunks).collect::<Vec<_>>(),
        );
        let events: Vec<Event> = events.into_iter().map(|e| e.unwrap()).collect();

        assert_eq!(
            events,
            vec![
                Event::Output {
                    output_type: "a".to_string(),
                    data: serde_json::json!({"n": 1}),
                },
                Event::chat(" ok"),
                Event::Done,
            ]
        );
    }

    #[tokio::test]
    async fn event_stream_surfaces_truncation() {
        let chunks = stream::iter(ok_chunks(&["text ", "<stream_block>"]));
        let results: Vec<_> = event_stream(StreamSession::default(), chunks)
            .collect()
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0], Ok(Event::chat("text ")));
        assert!(matches!(results[1], Err(ProtocolError::Truncated { .. })));
    }

    #[tokio::test]
    async fn event_stream_stops_on_transport_error() {
        let chunks = stream::iter(vec![
            Ok("a".to_string()),
            Err("connection reset".to_string()),
            Ok("b".to_string()),
        ]);
        let results: Vec<_> = event_stream(StreamSession::default(), chunks)
            .collect()
            .await;

        assert_eq!(
            results,
            vec![
                Ok(Event::chat("a")),
                Err(ProtocolError::Transport("connection reset".to_string())),
            ]
        );
    }
}
