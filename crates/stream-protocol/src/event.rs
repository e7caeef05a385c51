//! Event types produced by the parser.

use serde::{Deserialize, Serialize};

/// A decoded unit of the response stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Prose for the current director message.
    ChatText { text: String },

    /// One line of a research-activity block.
    StreamItem { icon: String, text: String },

    /// Summary line closing an activity block.
    StreamComplete { summary: String },

    /// Structured card payload.
    Output {
        #[serde(rename = "outputType")]
        output_type: String,
        data: serde_json::Value,
    },

    /// Progress tracker update.
    Progress { step: u64, state: ProgressState },

    /// "Coming up" hint.
    WhatsNext {
        icon: String,
        title: String,
        desc: String,
    },

    /// Clears the "coming up" hint.
    WhatsNextClear,

    /// End of stream. Emitted by the session, never by the parser.
    Done,
}

impl Event {
    /// Shorthand for a [`Event::ChatText`].
    #[must_use]
    pub fn chat(text: impl Into<String>) -> Self {
        Self::ChatText { text: text.into() }
    }

    /// Wire name of the variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ChatText { .. } => "chat_text",
            Self::StreamItem { .. } => "stream_item",
            Self::StreamComplete { .. } => "stream_complete",
            Self::Output { .. } => "output",
            Self::Progress { .. } => "progress",
            Self::WhatsNext { .. } => "whats_next",
            Self::WhatsNextClear => "whats_next_clear",
            Self::Done => "done",
        }
    }

    /// Whether this is prose rather than a structural event.
    #[must_use]
    pub const fn is_chat_text(&self) -> bool {
        matches!(self, Self::ChatText { .. })
    }
}

/// State of a progress step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressState {
    Active,
    Done,
}

impl ProgressState {
    /// Parse the literal attribute value. Anything else is rejected.
    #[must_use]
    pub fn from_attr(value: &str) -> Option<Self> {
        match value {
            "active" => Some(Self::Active),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProgressState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Result of one parser invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseOutput {
    /// Decoded events in emission order.
    pub events: Vec<Event>,

    /// Unconsumed suffix to prefix to the next chunk.
    pub remaining_buffer: String,
}

impl ParseOutput {
    /// Concatenation of all prose in this output.
    #[must_use]
    pub fn chat_text(&self) -> String {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::ChatText { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}
