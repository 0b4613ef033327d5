//! Incremental `text/event-stream` parser.
//!
//! Bytes arrive in arbitrary chunks; [`SseParser::feed`] buffers partial
//! lines and returns every event completed by the chunk. Field handling
//! follows the server-sent events processing model:
//!
//! - lines end in `\n`, `\r\n` or `\r`; a leading UTF-8 BOM is skipped
//! - `data:` lines accumulate, joined with `\n`
//! - `event:` sets the type of the pending event (default `message`)
//! - `id:` sets the pending event id; it becomes the last event id when the
//!   event is dispatched, and persists across events
//! - `retry:` with an all-digit value sets the reconnection delay
//! - lines starting with `:` are comments
//! - a blank line dispatches the pending event; events without data are dropped

use std::time::Duration;

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// One dispatched server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type, if the server set one.
    pub event: Option<String>,
    /// Event payload.
    pub data: String,
    /// Last event id at the time of dispatch.
    pub id: Option<String>,
}

impl SseEvent {
    /// Returns the event type, `message` when unset.
    pub fn event_type(&self) -> &str {
        self.event.as_deref().unwrap_or("message")
    }

    /// Returns `true` for events a plain message listener receives.
    pub fn is_message(&self) -> bool {
        self.event_type() == "message"
    }
}

/// Streaming parser state.
#[derive(Debug, Default)]
pub struct SseParser {
    line: Vec<u8>,
    pending_cr: bool,
    bom_checked: bool,
    event: Option<String>,
    data: String,
    id_buffer: Option<String>,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl SseParser {
    /// Creates a parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a chunk, returning the events it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();

        for &byte in chunk {
            if self.pending_cr {
                self.pending_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\r' | b'\n' => {
                    self.pending_cr = byte == b'\r';
                    let line = std::mem::take(&mut self.line);
                    if let Some(event) = self.process_line(&line) {
                        events.push(event);
                    }
                }
                _ => self.line.push(byte),
            }
        }

        events
    }

    /// Returns the id of the most recently dispatched event, on any connection.
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Takes the reconnection delay requested by the server, if any.
    pub fn take_retry(&mut self) -> Option<Duration> {
        self.retry.take()
    }

    /// Discards partial input before reading a new connection.
    ///
    /// The last event id is kept so it can be sent on reconnect; an id from
    /// an event that was never completed is dropped.
    pub fn reset(&mut self) {
        self.line.clear();
        self.pending_cr = false;
        self.bom_checked = false;
        self.event = None;
        self.data.clear();
        self.id_buffer.clone_from(&self.last_event_id);
    }

    fn process_line(&mut self, line: &[u8]) -> Option<SseEvent> {
        let mut line = line;
        if !self.bom_checked {
            self.bom_checked = true;
            if let Some(rest) = line.strip_prefix(BOM) {
                line = rest;
            }
        }

        if line.is_empty() {
            return self.dispatch();
        }
        if line[0] == b':' {
            return None;
        }

        let (field, value) = match line.iter().position(|&b| b == b':') {
            Some(i) => {
                let value = &line[i + 1..];
                (&line[..i], value.strip_prefix(b" ").unwrap_or(value))
            }
            None => (line, &[][..]),
        };
        let value = String::from_utf8_lossy(value);

        match field {
            b"event" => self.event = Some(value.into_owned()),
            b"data" => {
                self.data.push_str(&value);
                self.data.push('\n');
            }
            b"id" => {
                if !value.contains('\0') {
                    self.id_buffer = Some(value.into_owned());
                }
            }
            b"retry" => {
                if !value.is_empty()
                    && value.bytes().all(|b| b.is_ascii_digit())
                    && let Ok(ms) = value.parse::<u64>()
                {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        self.last_event_id.clone_from(&self.id_buffer);
        let event = self.event.take();
        let mut data = std::mem::take(&mut self.data);
        if data.is_empty() {
            return None;
        }
        if data.ends_with('\n') {
            data.pop();
        }
        Some(SseEvent {
            event,
            data,
            id: self.last_event_id.clone(),
        })
    }
}
