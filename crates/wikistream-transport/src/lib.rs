//! # wikistream Transport
//!
//! Stream transport implementations for wikistream.
//!
//! This crate provides concrete implementations of the [`StreamTransport`]
//! contract defined in `wikistream-core`.
//!
//! ## Features
//!
//! - `sse-client`: server-sent events client over `reqwest`
//! - `full`: all transports
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────┐
//! │  EventStream           │  (wikistream-runtime)
//! │  (uses a transport)    │
//! ├────────────────────────┤
//! │  wikistream-core       │  (transport contract)
//! ├────────────────────────┤
//! │  wikistream-transport  │  <- This crate (implementations)
//! ├────────────────────────┤
//! │  Network (HTTP)        │
//! └────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wikistream_core::{StreamRequest, StreamTransport};
//! use wikistream_transport::SseClientTransport;
//!
//! let transport = SseClientTransport::new()?;
//! let request = StreamRequest::new("https://stream.wikimedia.org/v2/stream/recentchange")
//!     .with_user_agent("my-tool/1.0");
//! let handle = transport.open(request, handler)?;
//!
//! // Later
//! handle.close();
//! ```
//!
//! [`StreamTransport`]: wikistream_core::StreamTransport

pub mod sse;

pub use sse::{SseEvent, SseParser};

#[cfg(feature = "sse-client")]
pub use sse::SseClientTransport;
