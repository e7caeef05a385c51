//! Incremental parser for the streaming markup.
//!
//! Each call walks `buffer + chunk` once, left to right. At every `<` it
//! decides between prose, a recognized tag that is complete, and a tag (or
//! tag name) that is still arriving. The first incomplete tag and everything
//! after it is handed back as the remaining buffer.

use serde::{Deserialize, Serialize};

use crate::event::{Event, ParseOutput, ProgressState};
use crate::scanner::{self, Attributes, BlockEntry, TagKind, TagStart};

/// Order in which events of one call are emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrder {
    /// Strict document order. Prose between tags is emitted at its position.
    #[default]
    Document,
    /// Grouped by tag family (stream blocks, outputs, progress, hint clears,
    /// hints), followed by a single `chat_text` with all prose of the call.
    /// Matches the behavior of earlier LaunchAgent clients.
    Category,
}

impl std::fmt::Display for EventOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Document => write!(f, "document"),
            Self::Category => write!(f, "category"),
        }
    }
}

/// Stateless parser for the streaming markup.
///
/// All state lives in the buffer the caller passes back in, so a parser can
/// be shared freely and a turn can be resumed from a persisted buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamParser {
    order: EventOrder,
}

impl StreamParser {
    /// Create a parser with the given event order.
    #[must_use]
    pub const fn new(order: EventOrder) -> Self {
        Self { order }
    }

    /// The configured event order.
    #[must_use]
    pub const fn order(&self) -> EventOrder {
        self.order
    }

    /// Parse `buffer + chunk`.
    ///
    /// `buffer` is the `remaining_buffer` of the previous call (empty at the
    /// start of a turn).
    #[must_use]
    pub fn parse(&self, buffer: &str, chunk: &str) -> ParseOutput {
        let mut combined = String::with_capacity(buffer.len() + chunk.len());
        combined.push_str(buffer);
        combined.push_str(chunk);
        self.scan(&combined, false)
    }

    /// Flush the buffer at the end of a stream.
    ///
    /// Unlike [`parse`](Self::parse), a trailing fragment of a tag name
    /// (`"<"`, `"<outp"`) is known to be prose now and is emitted as such.
    /// A tag that was opened but never closed stays in `remaining_buffer`.
    #[must_use]
    pub fn finish(&self, buffer: &str) -> ParseOutput {
        self.scan(buffer, true)
    }

    fn scan(&self, input: &str, at_end: bool) -> ParseOutput {
        let mut out = Collector::new(self.order);
        let mut cursor = 0;
        let mut pos = 0;
        let mut held = input.len();

        while let Some(offset) = input[pos..].find('<') {
            let start = pos + offset;
            let rest = &input[start..];

            match scanner::classify(rest) {
                TagStart::Text => pos = start + 1,
                TagStart::Prefix if at_end => pos = start + 1,
                TagStart::Prefix => {
                    held = start;
                    break;
                }
                TagStart::Tag(kind) => {
                    let Some(len) = scanner::tag_extent(kind, rest) else {
                        held = start;
                        break;
                    };
                    let span = &rest[..len];

                    if let Some(events) = decode(kind, span) {
                        out.prose(&input[cursor..start]);
                        out.structural(events);
                        cursor = start + len;
                        pos = cursor;
                    } else {
                        tracing::warn!(
                            tag = kind.name(),
                            fragment = %scanner::truncate(span, 120),
                            "unrecognized markup passed through as text"
                        );
                        pos = start + 1;
                    }
                }
            }
        }

        out.prose(&input[cursor..held]);

        let remaining_buffer = input[held..].to_string();
        if !remaining_buffer.is_empty() {
            tracing::trace!(pending = remaining_buffer.len(), "holding back incomplete tag");
        }

        ParseOutput {
            events: out.finish(),
            remaining_buffer,
        }
    }
}

/// Parse one chunk with the default parser.
///
/// Equivalent to `StreamParser::default().parse(buffer, chunk)`. Calling it as
/// `parse_stream_chunk("", buffer)` flushes a buffer at stream end.
#[must_use]
pub fn parse_stream_chunk(buffer: &str, chunk: &str) -> ParseOutput {
    StreamParser::default().parse(buffer, chunk)
}

/// Turn a complete tag span into events.
///
/// `None` means the span does not match the grammar and is prose. An empty
/// vector means the span was consumed without producing anything.
fn decode(kind: TagKind, span: &str) -> Option<Vec<Event>> {
    let parts = scanner::split_tag(kind, span)?;
    let attrs = Attributes::parse(parts.attrs)?;

    match kind {
        TagKind::StreamBlock => {
            if parts.self_closing || !attrs.is_empty() {
                return None;
            }
            let events = scanner::block_entries(parts.body)
                .into_iter()
                .map(|entry| match entry {
                    BlockEntry::Item { icon, text } => Event::StreamItem {
                        icon: icon.to_string(),
                        text: text.to_string(),
                    },
                    BlockEntry::Complete { summary } => Event::StreamComplete {
                        summary: summary.to_string(),
                    },
                })
                .collect();
            Some(events)
        }

        TagKind::Output => {
            if parts.self_closing || !attrs.has_exactly(&["type"]) {
                return None;
            }
            let output_type = attrs.get("type").filter(|t| !t.is_empty())?;

            match serde_json::from_str(parts.body) {
                Ok(data) => Some(vec![Event::Output {
                    output_type: output_type.to_string(),
                    data,
                }]),
                Err(e) => {
                    tracing::warn!(
                        output_type,
                        error = %e,
                        body = %scanner::truncate(parts.body, 120),
                        "dropping output block with malformed JSON"
                    );
                    Some(Vec::new())
                }
            }
        }

        TagKind::Progress => {
            if !parts.self_closing || !attrs.has_exactly(&["step", "state"]) {
                return None;
            }
            let step = attrs.get("step")?;
            if step.is_empty() || !step.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            let step = step.parse().ok()?;
            let state = ProgressState::from_attr(attrs.get("state")?)?;
            Some(vec![Event::Progress { step, state }])
        }

        TagKind::WhatsNext => {
            if !parts.self_closing {
                return None;
            }
            if attrs.has_exactly(&["clear"]) {
                return (attrs.get("clear") == Some("true")).then(|| vec![Event::WhatsNextClear]);
            }
            if !attrs.has_exactly(&["icon", "title", "desc"]) {
                return None;
            }
            Some(vec![Event::WhatsNext {
                icon: attrs.get("icon")?.to_string(),
                title: attrs.get("title")?.to_string(),
                desc: attrs.get("desc")?.to_string(),
            }])
        }
    }
}

/// Accumulates events and prose for one call, applying the event order.
struct Collector {
    order: EventOrder,
    events: Vec<Event>,
    prose: String,
}

impl Collector {
    const fn new(order: EventOrder) -> Self {
        Self {
            order,
            events: Vec::new(),
            prose: String::new(),
        }
    }

    fn prose(&mut self, text: &str) {
        self.prose.push_str(text);
    }

    fn structural(&mut self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        if self.order == EventOrder::Document {
            self.flush_prose();
        }
        self.events.extend(events);
    }

    fn flush_prose(&mut self) {
        if !self.prose.is_empty() {
            self.events.push(Event::ChatText {
                text: std::mem::take(&mut self.prose),
            });
        }
    }

    fn finish(mut self) -> Vec<Event> {
        if self.order == EventOrder::Category {
            self.events.sort_by_key(category_rank);
        }
        self.flush_prose();
        self.events
    }
}

const fn category_rank(event: &Event) -> u8 {
    match event {
        Event::StreamItem { .. } | Event::StreamComplete { .. } => 0,
        Event::Output { .. } => 1,
        Event::Progress { .. } => 2,
        Event::WhatsNextClear => 3,
        Event::WhatsNext { .. } => 4,
        Event::ChatText { .. } | Event::Done => 5,
    }
}
