//! # wikistream Core
//!
//! Building blocks of the wikistream event subscription engine.
//!
//! ## Components
//!
//! - **Message Decoder**: raw payload to [`EventRecord`] ([`decode`])
//! - **Filter Predicate**: [`Filter`] compiled into a [`CompiledFilter`]
//! - **Listener Registry**: ordered `(filter, action)` fan-out ([`ListenerRegistry`])
//! - **Stream Endpoint**: URL, stream names and `since` ([`StreamEndpoint`], [`Since`])
//! - **Transport contract**: [`StreamTransport`], [`TransportHandler`], [`TransportHandle`]
//!
//! ## Message flow
//!
//! ```text
//! ┌───────────┐  text   ┌─────────┐  EventRecord  ┌──────────────────┐
//! │ Transport │────────▶│ Decoder │──────────────▶│ ListenerRegistry │──▶ action
//! │  (SSE)    │         └─────────┘               │  filter ▸ action │──▶ action
//! └───────────┘                                   └──────────────────┘
//! ```
//!
//! The session that wires these together lives in `wikistream-runtime`.

pub mod endpoint;
pub mod error;
pub mod filter;
pub mod model;
pub mod record;
pub mod registry;
pub mod transport;

pub use endpoint::{DEFAULT_BASE_URL, RECENTCHANGE, Since, StreamEndpoint, StreamNames};
pub use error::{
    DecodeError, ListenerError, StreamError, StreamResult, TransportError, TransportResult,
};
pub use filter::{CompiledFilter, Filter, PredicateFn};
pub use model::{ChangeType, RecentChange};
pub use record::{EventRecord, decode, try_decode};
pub use registry::{
    ActionFn, ActionOutcome, DispatchReport, ListenerEntry, ListenerId, ListenerRegistry,
};
pub use transport::{
    BoxedTransport, BoxedTransportHandler, ReconnectConfig, StreamRequest, StreamTransport,
    TransportHandle, TransportHandler,
};

/// User agent sent when the caller does not provide one.
pub const DEFAULT_USER_AGENT: &str = concat!("wikistream/", env!("CARGO_PKG_VERSION"));
