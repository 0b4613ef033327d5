//! Transport contract: requests, lifecycle hooks and handles.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use super::config::ReconnectConfig;
use crate::endpoint::StreamEndpoint;
use crate::error::{TransportError, TransportResult};

// =============================================================================
// Request
// =============================================================================

/// Everything a transport needs to open one streaming connection.
#[derive(Debug, Clone)]
pub struct StreamRequest {
    /// Full stream URL.
    pub url: String,
    /// Extra request headers, in order.
    pub headers: Vec<(String, String)>,
    /// Reconnection policy.
    pub reconnect: ReconnectConfig,
}

impl StreamRequest {
    /// Creates a request for `url` with default reconnection policy.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            reconnect: ReconnectConfig::default(),
        }
    }

    /// Creates a request for an endpoint.
    pub fn for_endpoint(endpoint: &StreamEndpoint) -> Self {
        Self::new(endpoint.url())
    }

    /// Adds a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets the `User-Agent` header.
    pub fn with_user_agent(self, user_agent: impl Into<String>) -> Self {
        self.with_header("User-Agent", user_agent)
    }

    /// Sets the reconnection policy.
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Returns the first header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

// =============================================================================
// Handler
// =============================================================================

/// Receives the lifecycle hooks of one streaming connection.
///
/// A transport calls these sequentially from a single task. After the
/// connection's handle is closed no hook is called again.
#[async_trait]
pub trait TransportHandler: Send + Sync {
    /// Called each time the connection is (re)established.
    async fn on_open(&self);

    /// Called when connecting fails or an open connection breaks.
    ///
    /// Fatal errors (see [`TransportError::is_fatal`]) are the last hook call.
    async fn on_error(&self, error: &TransportError);

    /// Called with the text payload of each message event.
    async fn on_message(&self, data: &str);
}

/// Boxed transport handler.
pub type BoxedTransportHandler = Arc<dyn TransportHandler>;

// =============================================================================
// Handle
// =============================================================================

/// Handle to an open streaming connection.
#[derive(Debug, Clone)]
pub struct TransportHandle {
    /// Identifier for logging, usually the stream URL.
    pub id: String,
    /// Shutdown signal sender.
    shutdown_tx: Arc<watch::Sender<bool>>,
}

impl TransportHandle {
    /// Creates a handle from a shutdown sender.
    pub fn new(id: impl Into<String>, shutdown_tx: watch::Sender<bool>) -> Self {
        Self {
            id: id.into(),
            shutdown_tx: Arc::new(shutdown_tx),
        }
    }

    /// Creates a handle and the receiver its transport watches.
    pub fn channel(id: impl Into<String>) -> (Self, watch::Receiver<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        (Self::new(id, shutdown_tx), shutdown_rx)
    }

    /// Closes the connection. Idempotent.
    pub fn close(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        *self.shutdown_tx.borrow()
    }
}

// =============================================================================
// Transport
// =============================================================================

/// A long-lived streaming connection factory.
///
/// `open` must not block: it starts connecting in the background and reports
/// progress only through the handler's hooks.
pub trait StreamTransport: Send + Sync {
    /// Starts a connection for `request`, delivering hooks to `handler`.
    fn open(
        &self,
        request: StreamRequest,
        handler: BoxedTransportHandler,
    ) -> TransportResult<TransportHandle>;
}

/// Shared transport.
pub type BoxedTransport = Arc<dyn StreamTransport>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_is_idempotent() {
        let (handle, rx) = TransportHandle::channel("test");
        assert!(!handle.is_closed());
        handle.close();
        handle.close();
        assert!(handle.is_closed());
        assert!(*rx.borrow());
    }

    #[test]
    fn test_close_through_clone() {
        let (handle, rx) = TransportHandle::channel("test");
        let clone = handle.clone();
        clone.close();
        assert!(handle.is_closed());
        assert!(*rx.borrow());
    }

    #[test]
    fn test_request_headers() {
        let request = StreamRequest::new("https://example.org/stream")
            .with_user_agent("wikistream-test/1.0")
            .with_header("X-Extra", "1");
        assert_eq!(request.header("user-agent"), Some("wikistream-test/1.0"));
        assert_eq!(request.header("x-extra"), Some("1"));
        assert_eq!(request.header("accept"), None);
    }
}
