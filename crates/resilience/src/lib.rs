// crates/resilience/src/lib.rs
//! Resilience patterns for long-lived client work
//!
//! This module provides:
//! - Retry with exponential backoff for one-shot requests
//! - Reconnect backoff for push connections
//! - A delivery gate that makes cancellation effective on return
//! - Bounded poll-until-condition sessions keyed by target
//!
//! # Example
//!
//! ```rust
//! use syncwatch_resilience::{ReconnectBackoff, RetryPolicy};
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::new(3)
//!     .with_initial_delay(Duration::from_millis(100));
//!
//! let mut backoff = ReconnectBackoff::default();
//! let first = backoff.next_delay();
//! assert_eq!(first, Duration::from_secs(1));
//! ```

mod backoff;
mod error;
mod gate;
mod poll;
mod retry;

pub use backoff::ReconnectBackoff;
pub use error::{ResilienceError, ResilienceResult};
pub use gate::DeliveryGate;
pub use poll::{PollConfig, PollHandle, Poller};
pub use retry::{with_retry, RetryPolicy};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_exports_accessible() {
        let _: RetryPolicy = RetryPolicy::default();
        let _: ReconnectBackoff = ReconnectBackoff::default();
        let _: DeliveryGate = DeliveryGate::new();
        let _: Poller = Poller::new();
    }
}
