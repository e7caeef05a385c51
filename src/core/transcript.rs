//! Recorded transcripts replayed as chunked streams.

use stream_protocol::{Event, ProtocolError, StreamSession};

/// Split `text` into chunks of at most `size` characters.
///
/// Chunks always end on a char boundary. `None` or a size of zero yields
/// the whole text as one chunk.
#[must_use]
pub fn chunk_text(text: &str, size: Option<usize>) -> Vec<&str> {
    let Some(size) = size.filter(|s| *s > 0) else {
        return vec![text];
    };

    let mut chunks = Vec::new();
    let mut start = 0;
    for (count, (index, _)) in text.char_indices().enumerate() {
        if count > 0 && count % size == 0 {
            chunks.push(&text[start..index]);
            start = index;
        }
    }
    if start < text.len() || chunks.is_empty() {
        chunks.push(&text[start..]);
    }
    chunks
}

/// Feed chunks through a session and collect every event.
///
/// # Errors
///
/// Returns the first protocol error raised by the session.
pub fn run_transcript<'a>(
    session: &mut StreamSession,
    chunks: impl IntoIterator<Item = &'a str>,
) -> Result<Vec<Event>, ProtocolError> {
    let mut events = Vec::new();
    for chunk in chunks {
        events.extend(session.feed(chunk)?);
    }
    events.extend(session.finish()?);
    tracing::debug!(events = events.len(), "transcript replayed");
    Ok(events)
}
