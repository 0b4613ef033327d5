//! Server-sent events transport.
//!
//! The parser is always available; the `reqwest` client needs the
//! `sse-client` feature.

mod parse;
pub use parse::{SseEvent, SseParser};

#[cfg(feature = "sse-client")]
mod client;
#[cfg(feature = "sse-client")]
pub use client::SseClientTransport;
