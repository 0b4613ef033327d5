//! Event stream sessions.
//!
//! An [`EventStream`] owns one transport connection and one listener
//! registry. The transport drives it through [`TransportHandler`] hooks:
//!
//! ```text
//!             on_open                 close() / fatal error
//! Connecting ─────────▶ Open ───────────────────────────────▶ Closed
//!      ▲                 │
//!      └─── on_error ────┘
//! ```
//!
//! Messages are decoded and fanned out to listeners on the transport's
//! task. Malformed messages are dropped before any filter runs.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, trace, warn};

use wikistream_core::{
    ActionOutcome, BoxedTransport, EventRecord, Filter, ListenerId, ListenerRegistry, RECENTCHANGE,
    StreamEndpoint, StreamNames, StreamRequest, StreamResult, TransportError, TransportHandle,
    TransportHandler, decode,
};

use crate::options::{ErrorHook, OpenHook, StreamOptions};

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for the transport to (re)connect.
    Connecting,
    /// Connected and delivering messages.
    Open,
    /// Closed for good.
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// A live subscription to one or more event streams.
///
/// The connection opens on construction and stays up, reconnecting per the
/// options' [`ReconnectConfig`](wikistream_core::ReconnectConfig), until
/// [`close`](Self::close) is called or the session is dropped.
///
/// ```rust,ignore
/// use wikistream_runtime::{EventStream, StreamOptions};
/// use wikistream_core::Filter;
///
/// let stream = EventStream::new("recentchange", StreamOptions::new().with_user_agent("my-tool/1.0"))?;
/// stream.add_listener(
///     |rec| println!("{}", rec.get_str("title").unwrap_or_default()),
///     Filter::field("wiki", "enwiki").and("bot", false),
/// );
/// ```
pub struct EventStream {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    endpoint: StreamEndpoint,
    registry: ListenerRegistry,
    state: RwLock<SessionState>,
    handle: Mutex<Option<TransportHandle>>,
    on_open: Option<OpenHook>,
    on_error: Option<ErrorHook>,
}

impl EventStream {
    /// Opens a session over the default SSE transport.
    ///
    /// Must be called from within a tokio runtime.
    #[cfg(feature = "sse-client")]
    pub fn new(streams: impl Into<StreamNames>, options: StreamOptions) -> StreamResult<Self> {
        let transport = wikistream_transport::SseClientTransport::new()?;
        Self::with_transport(streams, options, Arc::new(transport))
    }

    /// Opens a session over the given transport.
    pub fn with_transport(
        streams: impl Into<StreamNames>,
        options: StreamOptions,
        transport: BoxedTransport,
    ) -> StreamResult<Self> {
        let StreamOptions {
            since,
            user_agent,
            base_url,
            reconnect,
            on_open,
            on_error,
        } = options;

        let endpoint = StreamEndpoint::new(base_url, streams, since)?;
        let request = StreamRequest::for_endpoint(&endpoint)
            .with_user_agent(user_agent)
            .with_reconnect(reconnect);

        let inner = Arc::new(SessionInner {
            endpoint,
            registry: ListenerRegistry::new(),
            state: RwLock::new(SessionState::Connecting),
            handle: Mutex::new(None),
            on_open,
            on_error,
        });

        let handler = Arc::new(SessionHandler {
            session: Arc::downgrade(&inner),
        });
        debug!(url = %request.url, "Opening event stream");
        let handle = transport.open(request, handler)?;

        // A fatal error may already have closed the session.
        if inner.is_closed() {
            handle.close();
        } else {
            *inner.handle.lock() = Some(handle);
        }

        Ok(Self { inner })
    }

    /// Opens a `recentchange` session with one listener.
    #[cfg(feature = "sse-client")]
    pub fn recentchange<F, R>(filter: impl Into<Filter>, action: F) -> StreamResult<Self>
    where
        F: Fn(&EventRecord) -> R + Send + Sync + 'static,
        R: ActionOutcome,
    {
        let stream = Self::new(RECENTCHANGE, StreamOptions::default())?;
        stream.add_listener(action, filter);
        Ok(stream)
    }

    /// Opens a `recentchange` session with one listener, custom options and
    /// transport.
    pub fn recentchange_with<F, R>(
        filter: impl Into<Filter>,
        action: F,
        options: StreamOptions,
        transport: BoxedTransport,
    ) -> StreamResult<Self>
    where
        F: Fn(&EventRecord) -> R + Send + Sync + 'static,
        R: ActionOutcome,
    {
        let stream = Self::with_transport(RECENTCHANGE, options, transport)?;
        stream.add_listener(action, filter);
        Ok(stream)
    }

    /// Registers `action` to run for each record matching `filter`.
    ///
    /// Listeners run in registration order. Returns `None` once the session
    /// is closed.
    pub fn add_listener<F, R>(&self, action: F, filter: impl Into<Filter>) -> Option<ListenerId>
    where
        F: Fn(&EventRecord) -> R + Send + Sync + 'static,
        R: ActionOutcome,
    {
        if self.inner.is_closed() {
            warn!(streams = %self.inner.endpoint.streams(), "Ignoring listener added to a closed event stream");
            return None;
        }
        let id = self.inner.registry.add(action, &filter.into());
        debug!(listener = %id, streams = %self.inner.endpoint.streams(), "Listener registered");
        Some(id)
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.registry.remove(id)
    }

    /// Returns the number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Returns the current lifecycle state.
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Returns `true` once the session is closed.
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Returns where this session is connected.
    pub fn endpoint(&self) -> &StreamEndpoint {
        &self.inner.endpoint
    }

    /// Closes the connection. No listener runs afterwards. Idempotent.
    pub fn close(&self) {
        if self.inner.close() {
            info!(streams = %self.inner.endpoint.streams(), "Event stream closed");
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.inner.close();
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("endpoint", &self.inner.endpoint.url())
            .field("state", &self.state())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

impl SessionInner {
    fn is_closed(&self) -> bool {
        *self.state.read() == SessionState::Closed
    }

    /// Moves to `Closed` and stops the transport. Returns `false` if it
    /// already was closed.
    fn close(&self) -> bool {
        {
            let mut state = self.state.write();
            if *state == SessionState::Closed {
                return false;
            }
            *state = SessionState::Closed;
        }
        if let Some(handle) = self.handle.lock().take() {
            handle.close();
        }
        true
    }

    /// Sets a new state unless closed. Returns `false` if closed.
    fn transition(&self, next: SessionState) -> bool {
        let mut state = self.state.write();
        if *state == SessionState::Closed {
            return false;
        }
        let prev = *state;
        if prev != next {
            trace!(from = %prev, to = %next, "Session state changed");
            *state = next;
        }
        true
    }

    fn handle_open(&self) {
        if !self.transition(SessionState::Open) {
            return;
        }
        match &self.on_open {
            Some(hook) => run_hook("on_open", || hook()),
            None => info!(
                "Opened eventsource connection for {} stream(s)",
                self.endpoint.streams()
            ),
        }
    }

    fn handle_error(&self, err: &TransportError) {
        let fatal = err.is_fatal();
        let alive = if fatal {
            !self.is_closed()
        } else {
            self.transition(SessionState::Connecting)
        };
        if !alive {
            return;
        }

        match &self.on_error {
            Some(hook) => run_hook("on_error", || hook(err)),
            None => warn!(error = %err, "event source encountered error"),
        }

        if fatal && self.close() {
            error!(streams = %self.endpoint.streams(), error = %err, "Event stream stopped");
        }
    }

    fn handle_message(&self, data: &str) {
        if self.is_closed() {
            return;
        }
        let Some(record) = decode(data) else {
            return;
        };
        let report = self.registry.dispatch_while(&record, || !self.is_closed());
        if report.interrupted {
            debug!(delivered = report.delivered, "Dispatch stopped by close");
        }
    }
}

/// Runs a caller hook, containing panics.
fn run_hook(name: &str, hook: impl FnOnce()) {
    if catch_unwind(AssertUnwindSafe(hook)).is_err() {
        error!(hook = name, "Session hook panicked");
    }
}

/// Bridges transport hooks to a session without keeping it alive.
struct SessionHandler {
    session: Weak<SessionInner>,
}

#[async_trait]
impl TransportHandler for SessionHandler {
    async fn on_open(&self) {
        if let Some(session) = self.session.upgrade() {
            session.handle_open();
        }
    }

    async fn on_error(&self, error: &TransportError) {
        if let Some(session) = self.session.upgrade() {
            session.handle_error(error);
        }
    }

    async fn on_message(&self, data: &str) {
        if let Some(session) = self.session.upgrade() {
            session.handle_message(data);
        }
    }
}
