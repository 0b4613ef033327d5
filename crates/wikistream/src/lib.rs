//! # wikistream
//!
//! Subscribe to a wiki's live event feed (Wikimedia EventStreams) and route
//! each event to the listeners whose filters it matches.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐     ┌─────────┐     ┌────────────────────────────────┐
//! │ Transport │────▶│ Decoder │────▶│ listener #1  (filter ▸ action) │
//! │   (SSE)   │     │  JSON   │────▶│ listener #2  (filter ▸ action) │
//! └───────────┘     └─────────┘────▶│ ...                            │
//!                                   └────────────────────────────────┘
//! ```
//!
//! - **EventStream**: one connection, one listener registry, lifecycle hooks
//! - **Transport**: SSE client with reconnect and `Last-Event-ID` resume
//! - **Filters**: field mappings or predicates, compiled once
//! - **Listeners**: run in registration order, each isolated from the others
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use wikistream::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let stream = EventStream::recentchange(
//!         Filter::field("wiki", "enwiki").and("bot", false),
//!         |rec: &EventRecord| println!("{}", rec.get_str("title").unwrap_or_default()),
//!     )?;
//!
//!     tokio::signal::ctrl_c().await?;
//!     stream.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `sse-client` (default): SSE client transport
//! - `toml-config` (default) / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output

pub use wikistream_core as core;
pub use wikistream_runtime as runtime;
pub use wikistream_transport as transport;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use wikistream::prelude::*;
/// ```
pub mod prelude {
    // Session - main entry point
    pub use wikistream_runtime::{EventStream, SessionState, StreamOptions};

    // Records and filters - for writing listeners
    pub use wikistream_core::{ChangeType, EventRecord, Filter, ListenerId, RecentChange};

    // Endpoint and reconnection settings
    pub use wikistream_core::{ReconnectConfig, Since, StreamEndpoint};

    // Errors
    pub use wikistream_core::{StreamError, StreamResult, TransportError};

    // Configuration and logging setup
    pub use wikistream_runtime::config::{ConfigLoader, WikiStreamConfig, load_config};
    pub use wikistream_runtime::logging::{LoggingBuilder, init_from_config};

    #[cfg(feature = "sse-client")]
    pub use wikistream_transport::SseClientTransport;
}
