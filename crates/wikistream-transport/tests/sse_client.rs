//! SSE client transport against an in-process axum server.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::routing::get;
use futures::stream::{self, Stream};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use wikistream_core::{
    ReconnectConfig, StreamRequest, StreamTransport, TransportError, TransportHandler,
};
use wikistream_transport::SseClientTransport;

#[derive(Debug)]
enum Hook {
    Open,
    Error(TransportError),
    Message(String),
}

struct RecordingHandler {
    tx: mpsc::UnboundedSender<Hook>,
}

#[async_trait]
impl TransportHandler for RecordingHandler {
    async fn on_open(&self) {
        let _ = self.tx.send(Hook::Open);
    }

    async fn on_error(&self, error: &TransportError) {
        let _ = self.tx.send(Hook::Error(error.clone()));
    }

    async fn on_message(&self, data: &str) {
        let _ = self.tx.send(Hook::Message(data.to_string()));
    }
}

fn recording_handler() -> (Arc<RecordingHandler>, mpsc::UnboundedReceiver<Hook>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(RecordingHandler { tx }), rx)
}

async fn next_hook(rx: &mut mpsc::UnboundedReceiver<Hook>) -> Hook {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a hook")
        .expect("handler dropped")
}

#[derive(Default)]
struct ServerState {
    user_agents: Mutex<Vec<Option<String>>>,
    last_event_ids: Mutex<Vec<Option<String>>>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn finite_stream(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    state.user_agents.lock().push(header(&headers, "user-agent"));
    let connection = {
        let mut ids = state.last_event_ids.lock();
        ids.push(header(&headers, "last-event-id"));
        ids.len()
    };

    let events = vec![
        Event::default().comment("hello"),
        Event::default()
            .id(format!("{connection}"))
            .data(format!(r#"{{"type":"edit","bot":false,"connection":{connection}}}"#)),
        Event::default().event("ping").data("ignored"),
        Event::default().data("not json at all"),
    ];
    Sse::new(stream::iter(events.into_iter().map(Ok)))
}

async fn endless_stream() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let ticks = stream::unfold(0u64, |n| async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Some((Ok(Event::default().data(format!(r#"{{"n":{n}}}"#))), n + 1))
    });
    Sse::new(ticks)
}

async fn plain_text() -> &'static str {
    "this is not an event stream"
}

async fn missing() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn serve(state: Arc<ServerState>) -> String {
    let router = Router::new()
        .route("/v2/stream/{streams}", get(finite_stream))
        .route("/endless", get(endless_stream))
        .route("/plain", get(plain_text))
        .route("/missing", get(missing))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test(flavor = "multi_thread")]
async fn test_delivers_message_events_only() {
    let state = Arc::new(ServerState::default());
    let base = serve(state.clone()).await;
    let (handler, mut rx) = recording_handler();

    let request = StreamRequest::new(format!("{base}/v2/stream/recentchange"))
        .with_user_agent("wikistream-test/1.0")
        .with_reconnect(ReconnectConfig::no_reconnect());
    let transport = SseClientTransport::new().unwrap();
    let handle = transport.open(request, handler).unwrap();

    assert!(matches!(next_hook(&mut rx).await, Hook::Open));
    match next_hook(&mut rx).await {
        Hook::Message(data) => {
            assert_eq!(data, r#"{"type":"edit","bot":false,"connection":1}"#)
        }
        other => panic!("unexpected hook: {other:?}"),
    }
    // The ping event is skipped; malformed payloads are still handed over as text.
    match next_hook(&mut rx).await {
        Hook::Message(data) => assert_eq!(data, "not json at all"),
        other => panic!("unexpected hook: {other:?}"),
    }
    assert!(matches!(
        next_hook(&mut rx).await,
        Hook::Error(TransportError::ConnectionClosed { .. })
    ));
    assert!(matches!(
        next_hook(&mut rx).await,
        Hook::Error(TransportError::ReconnectDisabled)
    ));

    assert_eq!(
        state.user_agents.lock().as_slice(),
        &[Some("wikistream-test/1.0".to_string())]
    );
    handle.close();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reconnect_sends_last_event_id() {
    let state = Arc::new(ServerState::default());
    let base = serve(state.clone()).await;
    let (handler, mut rx) = recording_handler();

    let reconnect = ReconnectConfig::default().with_initial_delay(Duration::from_millis(10));
    let request = StreamRequest::new(format!("{base}/v2/stream/recentchange"))
        .with_reconnect(reconnect);
    let transport = SseClientTransport::new().unwrap();
    let handle = transport.open(request, handler).unwrap();

    let mut opens = 0;
    while opens < 2 {
        if let Hook::Open = next_hook(&mut rx).await {
            opens += 1;
        }
    }
    handle.close();

    let ids = state.last_event_ids.lock().clone();
    assert_eq!(ids[0], None);
    assert_eq!(ids[1].as_deref(), Some("1"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_wrong_content_type_is_reported() {
    let base = serve(Arc::new(ServerState::default())).await;
    let (handler, mut rx) = recording_handler();

    let request =
        StreamRequest::new(format!("{base}/plain")).with_reconnect(ReconnectConfig::no_reconnect());
    let _handle = SseClientTransport::new()
        .unwrap()
        .open(request, handler)
        .unwrap();

    match next_hook(&mut rx).await {
        Hook::Error(TransportError::BadResponse { reason, .. }) => {
            assert!(reason.contains("text/event-stream"), "{reason}")
        }
        other => panic!("unexpected hook: {other:?}"),
    }
    assert!(matches!(
        next_hook(&mut rx).await,
        Hook::Error(TransportError::ReconnectDisabled)
    ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_retries_are_bounded() {
    let base = serve(Arc::new(ServerState::default())).await;
    let (handler, mut rx) = recording_handler();

    let reconnect = ReconnectConfig::default()
        .with_initial_delay(Duration::from_millis(1))
        .with_max_retries(2);
    let request = StreamRequest::new(format!("{base}/missing")).with_reconnect(reconnect);
    let _handle = SseClientTransport::new()
        .unwrap()
        .open(request, handler)
        .unwrap();

    for _ in 0..2 {
        match next_hook(&mut rx).await {
            Hook::Error(TransportError::BadResponse { reason, .. }) => {
                assert_eq!(reason, "HTTP 404")
            }
            other => panic!("unexpected hook: {other:?}"),
        }
    }
    match next_hook(&mut rx).await {
        Hook::Error(err @ TransportError::RetriesExhausted { attempts: 2 }) => {
            assert!(err.is_fatal())
        }
        other => panic!("unexpected hook: {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_close_stops_delivery() {
    let base = serve(Arc::new(ServerState::default())).await;
    let (handler, mut rx) = recording_handler();

    let request = StreamRequest::new(format!("{base}/endless"));
    let handle = SseClientTransport::new()
        .unwrap()
        .open(request, handler)
        .unwrap();

    let mut messages = 0;
    while messages < 3 {
        if let Hook::Message(_) = next_hook(&mut rx).await {
            messages += 1;
        }
    }
    handle.close();

    // Let anything already in flight land, then expect silence.
    tokio::time::sleep(Duration::from_millis(50)).await;
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_invalid_url_is_rejected() {
    let (handler, _rx) = recording_handler();
    let err = SseClientTransport::new()
        .unwrap()
        .open(StreamRequest::new("not a url"), handler)
        .unwrap_err();
    assert!(matches!(err, TransportError::InvalidRequest(_)));
    assert!(err.is_fatal());
}
