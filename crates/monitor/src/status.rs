// crates/monitor/src/status.rs
//! Throttled service connectivity and statistics checks

use crate::error::{MonitorError, MonitorResult};
use log::debug;
use std::sync::Mutex;
use std::time::Duration;
use syncwatch_core::{ServiceStatus, SyncStats};
use syncwatch_network::ApiClient;
use tokio::time::Instant;

/// Minimum spacing of unforced statistics fetches
pub const STATS_MIN_INTERVAL: Duration = Duration::from_millis(900);

struct ThrottleState<T> {
    last: Option<T>,
    checked_at: Option<Instant>,
}

/// Last value of a fetch plus when it was last requested
struct Throttle<T> {
    min_interval: Duration,
    state: Mutex<ThrottleState<T>>,
}

impl<T: Clone> Throttle<T> {
    fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            state: Mutex::new(ThrottleState {
                last: None,
                checked_at: None,
            }),
        }
    }

    /// `Err(cached)` inside the interval; otherwise records this request
    fn claim(&self, force: bool) -> MonitorResult<Result<(), Option<T>>> {
        let mut state = self.state.lock().map_err(|_| MonitorError::LockPoisoned)?;
        let now = Instant::now();
        let throttled = state
            .checked_at
            .is_some_and(|at| now.duration_since(at) < self.min_interval);
        if throttled && !force {
            return Ok(Err(state.last.clone()));
        }
        state.checked_at = Some(now);
        Ok(Ok(()))
    }

    fn store(&self, value: T) -> MonitorResult<()> {
        self.state
            .lock()
            .map_err(|_| MonitorError::LockPoisoned)?
            .last = Some(value);
        Ok(())
    }

    fn last(&self) -> Option<T> {
        self.state.lock().ok().and_then(|state| state.last.clone())
    }
}

/// Caches the last connectivity report and limits how often it is refreshed
pub struct StatusMonitor {
    api: ApiClient,
    throttle: Throttle<ServiceStatus>,
}

impl StatusMonitor {
    /// Creates a monitor allowing one unforced check per `min_interval`
    pub fn new(api: ApiClient, min_interval: Duration) -> Self {
        Self {
            api,
            throttle: Throttle::new(min_interval),
        }
    }

    /// Fetches a new report unless one was requested within the minimum interval
    ///
    /// `force` skips the throttle and asks the server to probe again. A throttled
    /// call returns the cached report.
    pub async fn refresh(&self, force: bool) -> MonitorResult<Option<ServiceStatus>> {
        if let Err(cached) = self.throttle.claim(force)? {
            debug!("Status check throttled");
            return Ok(cached);
        }
        let status = self.api.status(force).await?;
        self.throttle.store(status)?;
        Ok(Some(status))
    }

    /// Last known report
    pub fn current(&self) -> Option<ServiceStatus> {
        self.throttle.last()
    }

    /// Whether the server allows a run; unknown status allows it
    pub fn can_run(&self) -> bool {
        self.current().map_or(true, |status| status.can_run)
    }
}

/// Collection statistics with the same throttling as [`StatusMonitor`]
pub struct StatsMonitor {
    api: ApiClient,
    throttle: Throttle<SyncStats>,
}

impl StatsMonitor {
    /// Creates a monitor allowing one unforced fetch per `min_interval`
    pub fn new(api: ApiClient, min_interval: Duration) -> Self {
        Self {
            api,
            throttle: Throttle::new(min_interval),
        }
    }

    /// Fetches fresh statistics; a throttled call returns the cached ones
    ///
    /// `None` until the server has statistics to report.
    pub async fn refresh(&self, force: bool) -> MonitorResult<Option<SyncStats>> {
        if let Err(cached) = self.throttle.claim(force)? {
            debug!("Stats fetch throttled");
            return Ok(cached);
        }
        let stats = self.api.stats().await?;
        if let Some(stats) = stats {
            self.throttle.store(stats)?;
        }
        Ok(stats)
    }

    /// Last statistics received
    pub fn current(&self) -> Option<SyncStats> {
        self.throttle.last()
    }
}
