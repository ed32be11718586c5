// crates/network/src/lib.rs
//! Network layer for talking to the sync server
//!
//! - `Client`: reqwest wrapper bound to one server, with retries for reads
//! - `EventStreamClient`: server-sent event subscriptions with reconnection
//! - `ApiClient`: typed bindings for every resource the monitor uses

mod api;
mod client;
mod error;
mod event_stream;
mod sse;

pub use api::{
    ApiClient, ItemListing, LinkCode, LOG_STREAM_PATH, RUN_SUMMARY_PATH, RUN_SUMMARY_STREAM_PATH,
};
pub use client::{Client, ClientConfig};
pub use error::{NetworkError, NetworkResult};
pub use event_stream::{
    ByteStream, EventStreamClient, EventTransport, HttpEventTransport, StreamHandle,
};
pub use sse::{SseDecoder, SseEvent};
