// crates/network/src/event_stream.rs
//! Push-stream subscriptions with automatic reconnection
//!
//! `EventStreamClient` keeps at most one live subscription per key. Each subscription runs on
//! its own task: it connects through an `EventTransport`, decodes server-sent events and hands
//! every message payload to the subscriber's callback. Dropped connections are re-established
//! with backoff and the last seen event id; the subscriber only notices a pause in delivery.
//!
//! `close` is effective on return: delivery goes through a `DeliveryGate`, so a payload that
//! arrives after the close is discarded.

use crate::client::Client;
use crate::error::{NetworkError, NetworkResult};
use crate::sse::SseDecoder;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt, TryStreamExt};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use syncwatch_resilience::{DeliveryGate, ReconnectBackoff};
use tokio::task::JoinHandle;

/// Raw body chunks of one open stream
pub type ByteStream = BoxStream<'static, NetworkResult<Bytes>>;

/// Opens the underlying connection for a subscription
pub trait EventTransport: Send + Sync + 'static {
    fn connect(
        &self,
        endpoint: &str,
        last_event_id: Option<&str>,
    ) -> BoxFuture<'static, NetworkResult<ByteStream>>;
}

/// Server-sent events over HTTP
#[derive(Clone)]
pub struct HttpEventTransport {
    client: Client,
}

impl HttpEventTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl EventTransport for HttpEventTransport {
    fn connect(
        &self,
        endpoint: &str,
        last_event_id: Option<&str>,
    ) -> BoxFuture<'static, NetworkResult<ByteStream>> {
        let client = self.client.clone();
        let endpoint = endpoint.to_string();
        let last_event_id = last_event_id.map(str::to_string);
        async move {
            let response = client
                .open_event_stream(&endpoint, last_event_id.as_deref())
                .await?;
            let stream: ByteStream = response.bytes_stream().map_err(NetworkError::Http).boxed();
            Ok(stream)
        }
        .boxed()
    }
}

type EventCallback = Arc<dyn Fn(String) + Send + Sync>;

/// Identity of one opened subscription
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamHandle {
    key: String,
    id: u64,
}

impl StreamHandle {
    pub fn key(&self) -> &str {
        &self.key
    }
}

struct Subscription {
    id: u64,
    endpoint: String,
    gate: DeliveryGate,
    task: JoinHandle<()>,
}

impl Subscription {
    fn stop(self) {
        self.gate.close();
        self.task.abort();
    }
}

/// Owner of all push-stream subscriptions
pub struct EventStreamClient {
    transport: Arc<dyn EventTransport>,
    backoff: ReconnectBackoff,
    subscriptions: Mutex<HashMap<String, Subscription>>,
    next_id: AtomicU64,
}

impl EventStreamClient {
    pub fn new(transport: Arc<dyn EventTransport>) -> Self {
        Self::with_backoff(transport, ReconnectBackoff::default())
    }

    /// Uses `backoff` as the template for every subscription's reconnect schedule
    pub fn with_backoff(transport: Arc<dyn EventTransport>, backoff: ReconnectBackoff) -> Self {
        Self {
            transport,
            backoff,
            subscriptions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Streams over HTTP through `client`
    pub fn http(client: Client, backoff: ReconnectBackoff) -> Self {
        Self::with_backoff(Arc::new(HttpEventTransport::new(client)), backoff)
    }

    fn registry(&self) -> NetworkResult<MutexGuard<'_, HashMap<String, Subscription>>> {
        self.subscriptions
            .lock()
            .map_err(|_| NetworkError::LockPoisoned)
    }

    /// Subscribes to `endpoint` under `key`, closing any subscription already using the key
    ///
    /// `on_event` receives the data of every message event. It runs on the subscription task
    /// and must not close its own subscription. Must be called from within a tokio runtime.
    pub fn open<F>(&self, key: &str, endpoint: &str, on_event: F) -> NetworkResult<StreamHandle>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        let mut subscriptions = self.registry()?;
        if let Some(previous) = subscriptions.remove(key) {
            info!(
                "Replacing stream '{}' ({} -> {})",
                key, previous.endpoint, endpoint
            );
            previous.stop();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let gate = DeliveryGate::new();
        let task = tokio::spawn(run_subscription(
            Arc::clone(&self.transport),
            key.to_string(),
            endpoint.to_string(),
            gate.clone(),
            Arc::new(on_event),
            self.backoff.clone(),
        ));

        subscriptions.insert(
            key.to_string(),
            Subscription {
                id,
                endpoint: endpoint.to_string(),
                gate,
                task,
            },
        );
        Ok(StreamHandle {
            key: key.to_string(),
            id,
        })
    }

    /// Subscribes with a typed parser; payloads that fail to parse are logged and dropped
    pub fn open_parsed<T, E, P, F>(
        &self,
        key: &str,
        endpoint: &str,
        parse: P,
        on_event: F,
    ) -> NetworkResult<StreamHandle>
    where
        E: Display,
        P: Fn(&str) -> Result<T, E> + Send + Sync + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let stream_key = key.to_string();
        self.open(key, endpoint, move |payload| match parse(&payload) {
            Ok(value) => on_event(value),
            Err(e) => warn!("Dropping malformed payload on stream '{}': {}", stream_key, e),
        })
    }

    /// Closes a subscription; no callback runs after this returns
    ///
    /// Returns false if the handle was already closed or replaced.
    pub fn close(&self, handle: &StreamHandle) -> NetworkResult<bool> {
        let mut subscriptions = self.registry()?;
        let current = subscriptions
            .get(&handle.key)
            .is_some_and(|s| s.id == handle.id);
        if !current {
            return Ok(false);
        }
        if let Some(subscription) = subscriptions.remove(&handle.key) {
            subscription.stop();
            debug!("Closed stream '{}'", handle.key);
        }
        Ok(true)
    }

    /// Closes every subscription
    pub fn close_all(&self) -> NetworkResult<()> {
        let mut subscriptions = self.registry()?;
        for (key, subscription) in subscriptions.drain() {
            subscription.stop();
            debug!("Closed stream '{}'", key);
        }
        Ok(())
    }

    pub fn is_open(&self, handle: &StreamHandle) -> bool {
        self.registry()
            .map(|s| s.get(&handle.key).is_some_and(|s| s.id == handle.id))
            .unwrap_or(false)
    }
}

impl Drop for EventStreamClient {
    fn drop(&mut self) {
        if let Ok(subscriptions) = self.subscriptions.get_mut() {
            for (_, subscription) in subscriptions.drain() {
                subscription.stop();
            }
        }
    }
}

async fn run_subscription(
    transport: Arc<dyn EventTransport>,
    key: String,
    endpoint: String,
    gate: DeliveryGate,
    on_event: EventCallback,
    mut backoff: ReconnectBackoff,
) {
    let mut last_event_id: Option<String> = None;

    while gate.is_open() {
        match transport.connect(&endpoint, last_event_id.as_deref()).await {
            Ok(mut stream) => {
                info!("Stream '{}' connected to {}", key, endpoint);
                let mut decoder = SseDecoder::with_last_event_id(last_event_id.clone());

                while let Some(chunk) = stream.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            warn!("Stream '{}' interrupted: {}", key, e);
                            break;
                        }
                    };
                    backoff.reset();

                    for event in decoder.feed(&chunk) {
                        if !event.is_message() {
                            debug!("Stream '{}' ignoring '{:?}' event", key, event.event);
                            continue;
                        }
                        let callback = Arc::clone(&on_event);
                        if !gate.deliver(move || callback(event.data)) {
                            return;
                        }
                    }
                    if let Some(hint) = decoder.take_retry() {
                        backoff.set_server_hint(hint);
                    }
                    last_event_id = decoder.last_event_id().map(str::to_string);
                }
                debug!("Stream '{}' ended", key);
            }
            Err(e) => warn!("Stream '{}' failed to connect: {}", key, e),
        }

        let delay = backoff.next_delay();
        debug!("Stream '{}' reconnecting in {:?}", key, delay);
        tokio::time::sleep(delay).await;
    }
}
