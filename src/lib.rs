//! LaunchAgent - growth director with a streaming markup protocol.
//!
//! The director's LLM replies mix prose with markup for activity blocks,
//! output cards, progress, and hints. This crate wires the incremental
//! decoder from `stream-protocol` into:
//! - CLI commands for decoding and replaying transcripts
//! - Live LLM turns against the Anthropic Messages API
//! - An HTTP API with a stateless parse endpoint and SSE streaming
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  ┌─────────────┐
//! │     CLI     │  │   HTTP API  │
//! └──────┬──────┘  └──────┬──────┘
//!        │                │
//!        └───────┬────────┘
//!                │
//!         ┌──────┴──────┐      ┌─────────────────┐
//!         │    Core     │─────▶│ stream-protocol │
//!         └─────────────┘      └─────────────────┘
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod core;

pub use crate::config::Config;
pub use crate::core::Director;
