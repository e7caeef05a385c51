//! Core logic shared by the CLI and the HTTP API.

pub mod agent;
pub mod director;
mod error;
pub mod transcript;

pub use director::Director;
pub use error::{Error, Result, USER_FACING_FAILURE};
