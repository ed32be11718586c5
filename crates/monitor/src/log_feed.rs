// crates/monitor/src/log_feed.rs
//! Bounded buffer of job log lines fed by the log stream

use crate::error::{MonitorError, MonitorResult};
use log::debug;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use syncwatch_network::{ApiClient, EventStreamClient, StreamHandle};

const STREAM_KEY: &str = "logs";

/// Job log lines in delivery order, oldest dropped first
///
/// The server replays its own recent lines when a stream connects, so the buffer is cleared
/// on every `open`.
pub struct LogFeed {
    streams: Arc<EventStreamClient>,
    tag: String,
    capacity: usize,
    lines: Arc<Mutex<VecDeque<String>>>,
    handle: Mutex<Option<StreamHandle>>,
}

impl LogFeed {
    /// Creates a closed feed keeping at most `capacity` lines
    pub fn new(streams: Arc<EventStreamClient>, tag: impl Into<String>, capacity: usize) -> Self {
        Self {
            streams,
            tag: tag.into(),
            capacity: capacity.max(1),
            lines: Arc::new(Mutex::new(VecDeque::new())),
            handle: Mutex::new(None),
        }
    }

    /// Starts following the log; `on_line` sees every line after it is buffered
    pub fn open<F>(&self, on_line: F) -> MonitorResult<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let mut handle = self.handle.lock().map_err(|_| MonitorError::LockPoisoned)?;
        // The old subscription must be gone before the clear, or its lines leak in
        if let Some(previous) = handle.take() {
            self.streams.close(&previous)?;
        }
        self.lines
            .lock()
            .map_err(|_| MonitorError::LockPoisoned)?
            .clear();

        let lines = Arc::clone(&self.lines);
        let capacity = self.capacity;
        let endpoint = ApiClient::log_stream_path(&self.tag);
        let opened = self.streams.open(STREAM_KEY, &endpoint, move |line| {
            if let Ok(mut buffer) = lines.lock() {
                if buffer.len() == capacity {
                    buffer.pop_front();
                }
                buffer.push_back(line.clone());
            }
            on_line(&line);
        })?;

        debug!("Following job log with tag '{}'", self.tag);
        *handle = Some(opened);
        Ok(())
    }

    /// Stops following; no line is delivered after this returns
    pub fn close(&self) -> MonitorResult<bool> {
        let mut handle = self.handle.lock().map_err(|_| MonitorError::LockPoisoned)?;
        match handle.take() {
            Some(h) => Ok(self.streams.close(&h)?),
            None => Ok(false),
        }
    }

    pub fn is_open(&self) -> bool {
        self.handle
            .lock()
            .map(|h| h.as_ref().is_some_and(|h| self.streams.is_open(h)))
            .unwrap_or(false)
    }

    /// Snapshot of the buffered lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|buffer| buffer.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
