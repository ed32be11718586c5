// crates/network/src/sse.rs
//! Incremental decoder for `text/event-stream` bodies
//!
//! Bytes arrive in arbitrary chunks; the decoder buffers partial lines and yields an event
//! whenever a blank line terminates one. Field handling follows the EventSource rules:
//! `data` lines are joined with `\n`, `id` persists across events, `retry` sets the
//! reconnect delay, lines starting with `:` are comments.

use std::time::Duration;

/// One dispatched event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Event type, `None` for the default `message` type
    pub event: Option<String>,
    pub data: String,
    /// Last event id in effect when the event was dispatched
    pub id: Option<String>,
}

impl SseEvent {
    /// True for events an `onmessage` handler would see
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    skip_lf: bool,
    started: bool,
    data: Option<String>,
    event: Option<String>,
    last_event_id: Option<String>,
    retry: Option<Duration>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continues an earlier connection's id sequence
    pub fn with_last_event_id(last_event_id: Option<String>) -> Self {
        Self {
            last_event_id,
            ..Self::default()
        }
    }

    /// Feeds a chunk and returns the events it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if self.skip_lf {
                self.skip_lf = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\r' => {
                    self.skip_lf = true;
                    self.end_line(&mut events);
                }
                b'\n' => self.end_line(&mut events),
                _ => self.pending.push(byte),
            }
        }
        events
    }

    /// Id to resend as `Last-Event-ID` on reconnect
    pub fn last_event_id(&self) -> Option<&str> {
        self.last_event_id.as_deref()
    }

    /// Takes the most recent `retry:` value, if one arrived since the last call
    pub fn take_retry(&mut self) -> Option<Duration> {
        self.retry.take()
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        let raw = std::mem::take(&mut self.pending);
        let mut line = String::from_utf8_lossy(&raw).into_owned();
        if !self.started {
            self.started = true;
            if let Some(stripped) = line.strip_prefix('\u{feff}') {
                line = stripped.to_string();
            }
        }

        if line.is_empty() {
            self.dispatch(events);
            return;
        }
        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.find(':') {
            Some(idx) => {
                let value = &line[idx + 1..];
                (&line[..idx], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line.as_str(), ""),
        };

        match field {
            "data" => {
                let data = self.data.get_or_insert_with(String::new);
                data.push_str(value);
                data.push('\n');
            }
            "event" => self.event = Some(value.to_string()),
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = if value.is_empty() {
                        None
                    } else {
                        Some(value.to_string())
                    };
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(Duration::from_millis(ms));
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        let event = self.event.take().filter(|e| !e.is_empty());
        if let Some(mut data) = self.data.take() {
            data.pop();
            events.push(SseEvent {
                event,
                data,
                id: self.last_event_id.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_event() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: {\"running\":true}\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "{\"running\":true}");
        assert!(events[0].is_message());
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"da").is_empty());
        assert!(decoder.feed(b"ta: hel").is_empty());
        assert!(decoder.feed(b"lo\r").is_empty());
        let events = decoder.feed(b"\n\r\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "hello");
    }

    #[test]
    fn test_multiline_data() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: one\ndata: two\ndata\n\n");
        assert_eq!(events[0].data, "one\ntwo\n");
    }

    #[test]
    fn test_comments_and_unknown_fields_ignored() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b": keep-alive\nfoo: bar\n\ndata: x\n\n");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "x");
    }

    #[test]
    fn test_id_and_retry() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"id: 7\nretry: 2500\nevent: log\ndata: a\n\ndata: b\n\n");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id.as_deref(), Some("7"));
        assert_eq!(events[0].event.as_deref(), Some("log"));
        assert!(!events[0].is_message());
        assert_eq!(events[1].id.as_deref(), Some("7"));
        assert!(events[1].is_message());
        assert_eq!(decoder.last_event_id(), Some("7"));
        assert_eq!(decoder.take_retry(), Some(Duration::from_millis(2500)));
        assert_eq!(decoder.take_retry(), None);
    }

    #[test]
    fn test_invalid_retry_ignored() {
        let mut decoder = SseDecoder::new();
        decoder.feed(b"retry: soon\n\n");
        assert_eq!(decoder.take_retry(), None);
    }

    #[test]
    fn test_blank_block_without_data_dispatches_nothing() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: ping\n\n").is_empty());
        let events = decoder.feed(b"data: after\n\n");
        assert_eq!(events[0].event, None);
    }

    #[test]
    fn test_leading_bom_stripped() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed("\u{feff}data: x\n\n".as_bytes());
        assert_eq!(events[0].data, "x");
    }
}
