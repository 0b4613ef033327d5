//! Server-sent events client transport.

use std::time::Duration;

use futures::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, Response};
use tokio::sync::watch;
use tracing::{debug, error, info, trace, warn};

use wikistream_core::{
    BoxedTransportHandler, StreamRequest, StreamTransport, TransportError, TransportHandle,
    TransportResult,
};

use super::parse::{SseEvent, SseParser};

const EVENT_STREAM: &str = "text/event-stream";
const LAST_EVENT_ID: &str = "Last-Event-ID";

/// SSE client transport built on `reqwest`.
///
/// Each [`open`](StreamTransport::open) spawns a task that connects, reads
/// the stream and reconnects per the request's [`ReconnectConfig`], resuming
/// from the last seen event id.
///
/// [`ReconnectConfig`]: wikistream_core::ReconnectConfig
#[derive(Debug, Clone)]
pub struct SseClientTransport {
    client: Client,
}

impl SseClientTransport {
    /// Creates a transport with a default HTTP client.
    pub fn new() -> TransportResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
        Ok(Self { client })
    }

    /// Creates a transport on top of an existing HTTP client.
    ///
    /// The client must not carry a total request timeout, or long-lived
    /// streams will be cut off.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl StreamTransport for SseClientTransport {
    fn open(
        &self,
        request: StreamRequest,
        handler: BoxedTransportHandler,
    ) -> TransportResult<TransportHandle> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        reqwest::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidRequest(format!("{}: {e}", request.url)))?;

        let (handle, shutdown_rx) = TransportHandle::channel(&request.url);
        let state = ClientLoopState::new(self.client.clone(), request, handler, shutdown_rx);

        runtime.spawn(state.run());
        Ok(handle)
    }
}

/// How reading one connection ended.
enum StreamEnd {
    Shutdown,
    Lost(TransportError),
}

/// State for managing SSE client loop interactions.
struct ClientLoopState {
    client: Client,
    request: StreamRequest,
    handler: BoxedTransportHandler,
    shutdown_rx: watch::Receiver<bool>,
    parser: SseParser,
    retry_count: u32,
    current_delay: Duration,
    server_delay: Option<Duration>,
}

impl ClientLoopState {
    /// Creates a new client loop state.
    fn new(
        client: Client,
        request: StreamRequest,
        handler: BoxedTransportHandler,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        let initial_delay = request.reconnect.initial_delay;
        Self {
            client,
            request,
            handler,
            shutdown_rx,
            parser: SseParser::new(),
            retry_count: 0,
            current_delay: initial_delay,
            server_delay: None,
        }
    }

    /// Returns `true` once the handle was closed or dropped.
    fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow() || self.shutdown_rx.has_changed().is_err()
    }

    /// Connect / read / reconnect until shut down or out of retries.
    async fn run(mut self) {
        info!(url = %self.request.url, "Connecting to event stream");

        loop {
            let connected = tokio::select! {
                _ = wait_shutdown(&mut self.shutdown_rx) => break,
                result = connect(&self.client, &self.request, self.parser.last_event_id()) => result,
            };
            if self.is_shutdown() {
                break;
            }

            match connected {
                Ok(response) => {
                    info!(url = %self.request.url, "Event stream opened");
                    self.retry_count = 0;
                    self.current_delay = self
                        .server_delay
                        .unwrap_or(self.request.reconnect.initial_delay);
                    self.handler.on_open().await;

                    match self.read_stream(response).await {
                        StreamEnd::Shutdown => break,
                        StreamEnd::Lost(e) => {
                            if self.is_shutdown() {
                                break;
                            }
                            warn!(url = %self.request.url, error = %e, "Event stream lost");
                            self.handler.on_error(&e).await;
                        }
                    }
                }
                Err(e) => {
                    warn!(url = %self.request.url, error = %e, "Connection failed");
                    self.retry_count += 1;
                    self.handler.on_error(&e).await;
                }
            }

            if !self.wait_before_reconnect().await {
                break;
            }
        }

        info!(url = %self.request.url, "Event stream closed");
    }

    /// Reads events from one response until it ends or the handle closes.
    async fn read_stream(&mut self, response: Response) -> StreamEnd {
        let mut body = response.bytes_stream();
        self.parser.reset();

        loop {
            let chunk = tokio::select! {
                _ = wait_shutdown(&mut self.shutdown_rx) => return StreamEnd::Shutdown,
                chunk = body.next() => chunk,
            };

            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(e)) => return StreamEnd::Lost(TransportError::Stream(e.to_string())),
                None => {
                    return StreamEnd::Lost(TransportError::ConnectionClosed {
                        reason: "server ended the stream".into(),
                    });
                }
            };

            for event in self.parser.feed(&bytes) {
                if self.is_shutdown() {
                    return StreamEnd::Shutdown;
                }
                self.deliver(event).await;
            }

            if let Some(delay) = self.parser.take_retry() {
                debug!(url = %self.request.url, delay = ?delay, "Server set reconnection delay");
                self.server_delay = Some(delay);
                self.current_delay = delay;
            }
        }
    }

    /// Hands a message event to the handler.
    async fn deliver(&self, event: SseEvent) {
        if !event.is_message() {
            trace!(event_type = event.event_type(), "Ignoring non-message event");
            return;
        }
        trace!(len = event.data.len(), id = ?event.id, "Received");
        self.handler.on_message(&event.data).await;
    }

    /// Sleeps for the current backoff delay.
    /// Returns true if should reconnect, false if should stop.
    async fn wait_before_reconnect(&mut self) -> bool {
        if self.is_shutdown() {
            return false;
        }

        let config = &self.request.reconnect;
        if !config.auto_reconnect {
            self.handler
                .on_error(&TransportError::ReconnectDisabled)
                .await;
            return false;
        }

        // Check max retries
        if let Some(max) = config.max_retries
            && self.retry_count >= max
        {
            error!(url = %self.request.url, attempts = self.retry_count, "Max retries reached, giving up");
            self.handler
                .on_error(&TransportError::RetriesExhausted {
                    attempts: self.retry_count,
                })
                .await;
            return false;
        }

        let delay = self.current_delay;
        if self.retry_count > 0 {
            self.current_delay = config.next_delay(delay);
        }

        warn!(url = %self.request.url, delay = ?delay, "Reconnecting...");
        tokio::select! {
            _ = wait_shutdown(&mut self.shutdown_rx) => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }
}

/// Issues the streaming GET and checks that an event stream came back.
async fn connect(
    client: &Client,
    request: &StreamRequest,
    last_event_id: Option<&str>,
) -> TransportResult<Response> {
    let mut builder = client
        .get(&request.url)
        .header(ACCEPT, EVENT_STREAM)
        .header(CACHE_CONTROL, "no-cache");
    for (name, value) in &request.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if let Some(id) = last_event_id {
        builder = builder.header(LAST_EVENT_ID, id);
    }

    let failed = |reason: String| TransportError::ConnectionFailed {
        url: request.url.clone(),
        reason,
    };

    let response = match request.reconnect.connect_timeout {
        Some(timeout) => tokio::time::timeout(timeout, builder.send())
            .await
            .map_err(|_| failed(format!("timed out after {timeout:?}")))?,
        None => builder.send().await,
    }
    .map_err(|e| failed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::BadResponse {
            url: request.url.clone(),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if !content_type.starts_with(EVENT_STREAM) {
        return Err(TransportError::BadResponse {
            url: request.url.clone(),
            reason: format!("expected {EVENT_STREAM}, got '{content_type}'"),
        });
    }

    Ok(response)
}

/// Resolves once the handle is closed or dropped.
async fn wait_shutdown(rx: &mut watch::Receiver<bool>) {
    let _ = rx.wait_for(|closed| *closed).await;
}
