//! wikistream Runtime - sessions, configuration and logging.
//!
//! This crate provides:
//! - Event stream sessions ([`EventStream`], [`SessionState`])
//! - Session options ([`StreamOptions`])
//! - Layered configuration loading ([`ConfigLoader`])
//! - Logging configuration ([`LoggingBuilder`])
//!
//! ```ignore
//! use wikistream_runtime::{EventStream, StreamOptions, config, logging};
//! use wikistream_core::Filter;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = config::load_config()?;
//!     logging::init_from_config(&config.logging);
//!
//!     let stream = EventStream::new("recentchange", StreamOptions::from_config(&config))?;
//!     stream.add_listener(|rec| println!("{rec}"), Filter::field("type", "new"));
//!
//!     tokio::signal::ctrl_c().await?;
//!     stream.close();
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `sse-client`: [`EventStream::new`] and [`EventStream::recentchange`]
//!   over the SSE client transport
//! - `toml-config` / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output

pub mod config;
pub mod logging;
pub mod options;
pub mod session;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, WikiStreamConfig};
pub use logging::{LoggingBuilder, SpanEvents};
pub use options::{ErrorHook, OpenHook, StreamOptions};
pub use session::{EventStream, SessionState};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
