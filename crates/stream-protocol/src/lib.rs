//! Incremental parser for the LaunchAgent streaming markup.
//!
//! LLM responses interleave prose with a small pseudo-XML vocabulary
//! (`<stream_block>`, `<output>`, `<progress/>`, `<whats_next/>`). Chunks
//! arrive at arbitrary boundaries, so the parser returns the unconsumed
//! suffix alongside the events it could decode and expects it back on the
//! next call.
//!
//! ```
//! use stream_protocol::{Event, parse_stream_chunk};
//!
//! let first = parse_stream_chunk("", "Hello <progress step=\"2\" sta");
//! assert_eq!(first.remaining_buffer, "<progress step=\"2\" sta");
//!
//! let second = parse_stream_chunk(&first.remaining_buffer, "te=\"done\"/> there");
//! assert!(matches!(second.events[0], Event::Progress { step: 2, .. }));
//! ```

pub mod error;
pub mod event;
pub mod parser;
mod scanner;
pub mod session;

pub use error::{ProtocolError, Result};
pub use event::{Event, ParseOutput, ProgressState};
pub use parser::{EventOrder, StreamParser, parse_stream_chunk};
pub use session::{DEFAULT_MAX_PENDING_BYTES, StreamSession, event_stream};
