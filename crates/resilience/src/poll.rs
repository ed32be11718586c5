// crates/resilience/src/poll.rs
//! Bounded poll-until-condition sessions
//!
//! A session fetches a resource once per tick and extracts an optional value from it. The
//! first extracted value that differs from the session's baseline ends the session with
//! `on_success`; running out of ticks ends it with `on_timeout`. Exactly one of the two fires,
//! at most once.
//!
//! Sessions are keyed by target. Starting a session for a target cancels the previous one
//! before returning, so a superseded session can never report. The tick budget is the only
//! timeout: a slow interval stretches it.

use crate::error::{ResilienceError, ResilienceResult};
use crate::gate::DeliveryGate;
use futures::future::BoxFuture;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

type FetchFn<R, E> = Arc<dyn Fn() -> BoxFuture<'static, Result<R, E>> + Send + Sync>;
type ExtractFn<R, T> = Box<dyn Fn(&R) -> Option<T> + Send>;
type SuccessFn<T> = Box<dyn FnOnce(T) + Send>;
type TimeoutFn = Box<dyn FnOnce() + Send>;

/// Description of one poll session
pub struct PollConfig<R, T, E> {
    fetch: FetchFn<R, E>,
    extract: ExtractFn<R, T>,
    interval: Duration,
    max_ticks: u32,
    baseline: Option<T>,
    on_success: SuccessFn<T>,
    on_timeout: TimeoutFn,
}

impl<R, T, E> PollConfig<R, T, E>
where
    R: Send + 'static,
    T: PartialEq + Send + 'static,
    E: Display + Send + 'static,
{
    /// Creates a session polling `fetch` and extracting with `extract`
    ///
    /// Defaults: one second interval, 60 ticks, no baseline, no-op callbacks.
    pub fn new<F, X>(fetch: F, extract: X) -> Self
    where
        F: Fn() -> BoxFuture<'static, Result<R, E>> + Send + Sync + 'static,
        X: Fn(&R) -> Option<T> + Send + 'static,
    {
        Self {
            fetch: Arc::new(fetch),
            extract: Box::new(extract),
            interval: Duration::from_secs(1),
            max_ticks: 60,
            baseline: None,
            on_success: Box::new(|_| {}),
            on_timeout: Box::new(|| {}),
        }
    }

    /// Sets the time between ticks
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the tick budget
    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Sets the previously observed value; only a different value counts as success
    pub fn with_baseline(mut self, baseline: Option<T>) -> Self {
        self.baseline = baseline;
        self
    }

    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.on_success = Box::new(f);
        self
    }

    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.on_timeout = Box::new(f);
        self
    }

    fn validate(&self, target: &str) -> ResilienceResult<()> {
        let invalid = |reason: &str| ResilienceError::InvalidPollConfig {
            target: target.to_string(),
            reason: reason.to_string(),
        };
        if self.max_ticks == 0 {
            return Err(invalid("max_ticks must be at least 1"));
        }
        if self.interval.is_zero() {
            return Err(invalid("interval must be greater than zero"));
        }
        Ok(())
    }
}

/// Identity of one started session
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PollHandle {
    target: String,
    id: u64,
}

impl PollHandle {
    pub fn target(&self) -> &str {
        &self.target
    }
}

struct Session {
    id: u64,
    gate: DeliveryGate,
    task: JoinHandle<()>,
}

impl Session {
    fn stop(self) {
        self.gate.close();
        self.task.abort();
    }
}

type Registry = Arc<Mutex<HashMap<String, Session>>>;

fn lock_registry(registry: &Registry) -> ResilienceResult<MutexGuard<'_, HashMap<String, Session>>> {
    registry.lock().map_err(|_| ResilienceError::LockPoisoned)
}

/// Owner of all poll sessions, at most one live session per target
///
/// Callbacks run on the session's task and must not call back into the same `Poller`.
#[derive(Clone, Default)]
pub struct Poller {
    sessions: Registry,
    next_id: Arc<AtomicU64>,
}

impl Poller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session for `target`, cancelling any live session for it first
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<R, T, E>(
        &self,
        target: impl Into<String>,
        config: PollConfig<R, T, E>,
    ) -> ResilienceResult<PollHandle>
    where
        R: Send + 'static,
        T: PartialEq + Send + 'static,
        E: Display + Send + 'static,
    {
        let target = target.into();
        config.validate(&target)?;

        let mut sessions = lock_registry(&self.sessions)?;
        if let Some(previous) = sessions.remove(&target) {
            info!("Superseding poll session for '{}'", target);
            previous.stop();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let gate = DeliveryGate::new();
        let task = tokio::spawn(run_session(
            target.clone(),
            id,
            config,
            gate.clone(),
            Arc::clone(&self.sessions),
        ));
        sessions.insert(target.clone(), Session { id, gate, task });

        debug!("Started poll session {} for '{}'", id, target);
        Ok(PollHandle { target, id })
    }

    /// Cancels a session; returns false if it had already ended or been superseded
    ///
    /// Once this returns, the session's callbacks will not run.
    pub fn cancel(&self, handle: &PollHandle) -> ResilienceResult<bool> {
        let mut sessions = lock_registry(&self.sessions)?;
        match sessions.get(&handle.target) {
            Some(session) if session.id == handle.id => {
                if let Some(session) = sessions.remove(&handle.target) {
                    session.stop();
                }
                debug!("Cancelled poll session {} for '{}'", handle.id, handle.target);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Cancels whatever session is live for `target`
    pub fn cancel_target(&self, target: &str) -> ResilienceResult<bool> {
        let mut sessions = lock_registry(&self.sessions)?;
        match sessions.remove(target) {
            Some(session) => {
                session.stop();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Returns true while the session is running and has not reported
    pub fn is_active(&self, handle: &PollHandle) -> bool {
        lock_registry(&self.sessions)
            .map(|sessions| {
                sessions
                    .get(&handle.target)
                    .is_some_and(|s| s.id == handle.id && s.gate.is_open())
            })
            .unwrap_or(false)
    }

    /// Number of live sessions
    pub fn active_sessions(&self) -> usize {
        lock_registry(&self.sessions)
            .map(|sessions| sessions.len())
            .unwrap_or(0)
    }
}

async fn run_session<R, T, E>(
    target: String,
    id: u64,
    config: PollConfig<R, T, E>,
    gate: DeliveryGate,
    registry: Registry,
) where
    R: Send + 'static,
    T: PartialEq + Send + 'static,
    E: Display + Send + 'static,
{
    let PollConfig {
        fetch,
        extract,
        interval,
        max_ticks,
        baseline,
        on_success,
        on_timeout,
    } = config;

    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut on_success = Some(on_success);
    let mut succeeded = false;

    for tick in 1..=max_ticks {
        ticker.tick().await;
        if !gate.is_open() {
            return;
        }

        let resource = match fetch().await {
            Ok(resource) => resource,
            Err(e) => {
                debug!("Poll '{}' tick {}/{}: fetch failed: {}", target, tick, max_ticks, e);
                continue;
            }
        };

        let value = match extract(&resource) {
            Some(value) if baseline.as_ref() != Some(&value) => value,
            _ => continue,
        };

        if let Some(callback) = on_success.take() {
            debug!("Poll '{}' succeeded on tick {}", target, tick);
            succeeded = gate.finish(|| callback(value));
        }
        break;
    }

    if !succeeded && gate.finish(on_timeout) {
        warn!("Poll '{}' timed out after {} ticks", target, max_ticks);
    }

    // Leave the registry unless a newer session already replaced this one
    if let Ok(mut sessions) = registry.lock() {
        if sessions.get(&target).is_some_and(|s| s.id == id) {
            sessions.remove(&target);
        }
    }
}
