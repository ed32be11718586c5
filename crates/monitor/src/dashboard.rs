// crates/monitor/src/dashboard.rs
//! Composition root tying the feeds, the reducer, the overlay and the flows together
//!
//! A `Dashboard` owns every stream handle, poll session and throttle timestamp. Renderers
//! consume the `DashboardEvent` receiver returned by `Dashboard::new`.

use crate::auth::{AuthCoordinator, AuthOutcome, AuthPrompt, CredentialSink};
use crate::error::{MonitorError, MonitorResult};
use crate::log_feed::LogFeed;
use crate::overlay::{DisplayItem, HiddenStore, OverlayReconciler};
use crate::run_state::{RunStateMachine, RunView, Transition};
use crate::status::{StatsMonitor, StatusMonitor, STATS_MIN_INTERVAL};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use syncwatch_config::{AuthConfig, Config};
use syncwatch_core::{
    FailureKind, HiddenSet, Provider, RunSummary, ScheduleStatus, ServiceStatus, SyncStats,
    VersionInfo,
};
use syncwatch_network::{
    ApiClient, EventStreamClient, ItemListing, StreamHandle, RUN_SUMMARY_STREAM_PATH,
};
use syncwatch_resilience::{PollHandle, Poller};
use tokio::sync::mpsc;

const SUMMARY_STREAM_KEY: &str = "summary";

/// Events emitted by the dashboard
#[derive(Debug, Clone, PartialEq)]
pub enum DashboardEvent {
    /// The run view changed
    Run(RunView),
    /// The run stopped; emitted once per run, after the matching `Run`
    RunFinished(RunView),
    /// A fresh item list with the overlay applied
    Items {
        rows: Vec<DisplayItem>,
        last_sync_epoch: Option<i64>,
        missing_tmdb_key: bool,
    },
    /// The server has no item list to offer
    ItemsUnavailable {
        reason: String,
        missing_tmdb_key: bool,
    },
    Schedule(ScheduleStatus),
    Status(ServiceStatus),
    Stats(SyncStats),
    /// Result of a version check
    Version(VersionInfo),
    /// `key` was hidden locally; renderers drop it before the delete request resolves
    Hidden { key: String },
    /// The server did not confirm a delete; the item stays hidden
    DeleteRejected { key: String, reason: String },
    Auth(AuthOutcome),
    /// A one-shot failure worth telling the user about
    Failure { kind: FailureKind, message: String },
}

/// Tunables taken from the client config
#[derive(Debug, Clone)]
pub struct DashboardSettings {
    pub status_min_interval: Duration,
    pub stats_min_interval: Duration,
    pub log_tag: String,
    pub log_buffer_lines: usize,
    pub auth: AuthConfig,
}

impl DashboardSettings {
    /// Settings from the `[app]`, `[stream]` and `[auth]` sections
    pub fn from_config(config: &Config) -> Self {
        Self {
            status_min_interval: Duration::from_secs(config.app.status_min_interval_secs),
            stats_min_interval: STATS_MIN_INTERVAL,
            log_tag: config.stream.log_tag.clone(),
            log_buffer_lines: config.stream.log_buffer_lines,
            auth: config.auth.clone(),
        }
    }
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

struct Inner {
    api: ApiClient,
    streams: Arc<EventStreamClient>,
    run: Arc<Mutex<RunStateMachine>>,
    overlay: OverlayReconciler,
    status: StatusMonitor,
    stats: StatsMonitor,
    logs: LogFeed,
    auth: AuthCoordinator,
    busy: AtomicBool,
    summary_stream: Mutex<Option<StreamHandle>>,
    events: mpsc::UnboundedSender<DashboardEvent>,
}

impl Inner {
    fn emit(&self, event: DashboardEvent) {
        // A dropped receiver only means nobody is rendering
        let _ = self.events.send(event);
    }

    fn run_state(&self) -> MonitorResult<MutexGuard<'_, RunStateMachine>> {
        self.run.lock().map_err(|_| MonitorError::LockPoisoned)
    }

    fn apply_summary(self: &Arc<Self>, summary: RunSummary) -> MonitorResult<RunView> {
        let mut run = self.run_state()?;
        let transition = run.apply(summary);
        publish(&self.events, &Arc::downgrade(self), transition);
        Ok(run.view())
    }

    async fn refresh_items(&self) -> MonitorResult<()> {
        let since = self.overlay.begin_refresh()?;
        match self.api.items().await? {
            ItemListing::Available {
                items,
                last_sync_epoch,
                missing_tmdb_key,
            } => {
                let rows = self.overlay.apply_items(since, &items)?;
                debug!("Item list refreshed: {} items", rows.len());
                self.emit(DashboardEvent::Items {
                    rows,
                    last_sync_epoch,
                    missing_tmdb_key,
                });
            }
            ItemListing::Unavailable {
                reason,
                missing_tmdb_key,
            } => {
                info!("Item list unavailable: {}", reason);
                self.emit(DashboardEvent::ItemsUnavailable {
                    reason,
                    missing_tmdb_key,
                });
            }
        }
        Ok(())
    }

    async fn refresh_schedule(&self) -> MonitorResult<ScheduleStatus> {
        let schedule = self.api.schedule_status().await?;
        self.emit(DashboardEvent::Schedule(schedule));
        Ok(schedule)
    }

    async fn refresh_status(&self, force: bool) -> MonitorResult<Option<ServiceStatus>> {
        let status = self.status.refresh(force).await?;
        if let Some(status) = status {
            self.emit(DashboardEvent::Status(status));
        }
        Ok(status)
    }

    async fn refresh_stats(&self, force: bool) -> MonitorResult<Option<SyncStats>> {
        let stats = self.stats.refresh(force).await?;
        if let Some(stats) = stats {
            self.emit(DashboardEvent::Stats(stats));
        }
        Ok(stats)
    }
}

/// Emits the events for `transition`; a finished run triggers the item and schedule refresh
fn publish(
    events: &mpsc::UnboundedSender<DashboardEvent>,
    inner: &Weak<Inner>,
    transition: Transition,
) {
    match transition {
        Transition::Ignored => {}
        Transition::Updated(view) => {
            let _ = events.send(DashboardEvent::Run(view));
        }
        Transition::Finished(view) => {
            let _ = events.send(DashboardEvent::Run(view));
            let _ = events.send(DashboardEvent::RunFinished(view));
            spawn_after_run(inner.clone());
        }
    }
}

fn spawn_after_run(inner: Weak<Inner>) {
    tokio::spawn(async move {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        if let Err(e) = inner.refresh_items().await {
            warn!("Item refresh after run failed: {}", e);
        }
        if let Err(e) = inner.refresh_schedule().await {
            debug!("Schedule refresh after run failed: {}", e);
        }
        if let Err(e) = inner.refresh_stats(true).await {
            debug!("Stats refresh after run failed: {}", e);
        }
    });
}

fn spawn_status_refresh(inner: Weak<Inner>, force: bool) {
    tokio::spawn(async move {
        if let Some(inner) = inner.upgrade() {
            if let Err(e) = inner.refresh_status(force).await {
                debug!("Status refresh failed: {}", e);
            }
        }
    });
}

/// Owner of all client-side monitoring state
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<Inner>,
}

impl Dashboard {
    /// Builds a dashboard and the receiver its events go to
    pub fn new(
        api: ApiClient,
        streams: Arc<EventStreamClient>,
        hidden_store: Box<dyn HiddenStore>,
        credentials: Arc<dyn CredentialSink>,
        settings: DashboardSettings,
    ) -> (Self, mpsc::UnboundedReceiver<DashboardEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let inner = Inner {
            overlay: OverlayReconciler::new(hidden_store),
            status: StatusMonitor::new(api.clone(), settings.status_min_interval),
            stats: StatsMonitor::new(api.clone(), settings.stats_min_interval),
            logs: LogFeed::new(
                Arc::clone(&streams),
                settings.log_tag,
                settings.log_buffer_lines,
            ),
            auth: AuthCoordinator::new(api.clone(), Poller::new(), settings.auth, credentials),
            api,
            streams,
            run: Arc::new(Mutex::new(RunStateMachine::new())),
            busy: AtomicBool::new(false),
            summary_stream: Mutex::new(None),
            events,
        };
        (
            Self {
                inner: Arc::new(inner),
            },
            receiver,
        )
    }

    /// Subscribes to pushed summaries, then pulls the current snapshot
    ///
    /// A failed pull is logged; the stream keeps the view current once it connects.
    pub async fn start(&self) -> MonitorResult<()> {
        // The callback holds no strong reference to the dashboard
        let run = Arc::clone(&self.inner.run);
        let events = self.inner.events.clone();
        let weak = Arc::downgrade(&self.inner);
        let handle =
            self.inner
                .streams
                .open(SUMMARY_STREAM_KEY, RUN_SUMMARY_STREAM_PATH, move |payload| {
                    match run.lock() {
                        Ok(mut run) => {
                            let transition = run.apply_payload(&payload);
                            publish(&events, &weak, transition);
                        }
                        Err(_) => warn!("Dropping run summary: run state lock poisoned"),
                    }
                })?;
        *self
            .inner
            .summary_stream
            .lock()
            .map_err(|_| MonitorError::LockPoisoned)? = Some(handle);

        if let Err(e) = self.refresh_run().await {
            warn!("Initial run summary fetch failed: {}", e);
        }
        if let Err(e) = self.inner.refresh_status(false).await {
            warn!("Initial status fetch failed: {}", e);
        }
        if let Err(e) = self.inner.refresh_stats(false).await {
            debug!("Initial stats fetch failed: {}", e);
        }
        Ok(())
    }

    /// Closes the streams and cancels running authorization flows
    pub fn shutdown(&self) -> MonitorResult<()> {
        if let Some(handle) = self
            .inner
            .summary_stream
            .lock()
            .map_err(|_| MonitorError::LockPoisoned)?
            .take()
        {
            self.inner.streams.close(&handle)?;
        }
        self.inner.logs.close()?;
        for provider in [Provider::Plex, Provider::Simkl] {
            self.inner.auth.cancel(provider)?;
        }
        info!("Dashboard stopped");
        Ok(())
    }

    /// Pulls the current snapshot through the same reducer as the stream
    pub async fn refresh_run(&self) -> MonitorResult<RunView> {
        let summary = self.inner.api.run_summary().await?;
        self.inner.apply_summary(summary)
    }

    /// Feeds a snapshot obtained elsewhere into the reducer
    ///
    /// Must be called from within a tokio runtime.
    pub fn apply_summary(&self, summary: RunSummary) -> MonitorResult<RunView> {
        self.inner.apply_summary(summary)
    }

    /// Current run view
    pub fn view(&self) -> RunView {
        self.inner
            .run_state()
            .map(|run| run.view())
            .unwrap_or_default()
    }

    pub fn summary(&self) -> Option<RunSummary> {
        self.inner
            .run_state()
            .ok()
            .and_then(|run| run.summary().cloned())
    }

    /// Fetches the item list and emits it with the overlay applied
    pub async fn refresh_items(&self) -> MonitorResult<()> {
        self.inner.refresh_items().await
    }

    pub async fn refresh_schedule(&self) -> MonitorResult<ScheduleStatus> {
        self.inner.refresh_schedule().await
    }

    /// Throttled connectivity check; see [`StatusMonitor::refresh`]
    pub async fn refresh_status(&self, force: bool) -> MonitorResult<Option<ServiceStatus>> {
        self.inner.refresh_status(force).await
    }

    pub fn status(&self) -> Option<ServiceStatus> {
        self.inner.status.current()
    }

    /// Fetches collection statistics, at most once per `stats_min_interval` unless forced
    pub async fn refresh_stats(&self, force: bool) -> MonitorResult<Option<SyncStats>> {
        self.inner.refresh_stats(force).await
    }

    pub fn stats(&self) -> Option<SyncStats> {
        self.inner.stats.current()
    }

    /// Asks the server for its version and the newest release
    pub async fn check_version(&self) -> MonitorResult<VersionInfo> {
        let info = self.inner.api.version().await?;
        if info.update_available {
            info!(
                "Server update available: {} -> {}",
                info.current,
                info.latest.as_deref().unwrap_or("?")
            );
        }
        self.inner.emit(DashboardEvent::Version(info.clone()));
        Ok(info)
    }

    /// Whether a run may be requested now
    pub fn can_initiate(&self) -> bool {
        let running = self
            .inner
            .run_state()
            .map(|run| run.is_running())
            .unwrap_or(false);
        !self.inner.busy.load(Ordering::SeqCst) && !running && self.inner.status.can_run()
    }

    /// Asks the server to start a run
    ///
    /// A failure is reported once, as the returned error and a `Failure` event; the run
    /// view is not touched. The status is re-checked afterwards either way.
    pub async fn initiate_run(&self) -> MonitorResult<()> {
        if self.inner.busy.swap(true, Ordering::SeqCst) {
            return Err(MonitorError::RunInProgress);
        }

        let result = self.request_run().await;
        self.inner.busy.store(false, Ordering::SeqCst);
        spawn_status_refresh(Arc::downgrade(&self.inner), false);

        if let Err(e) = &result {
            warn!("{}", e);
            self.inner.emit(DashboardEvent::Failure {
                kind: FailureKind::RunInitiationFailed,
                message: e.to_string(),
            });
        }
        result
    }

    async fn request_run(&self) -> MonitorResult<()> {
        if self.inner.run_state()?.is_running() {
            return Err(MonitorError::RunInProgress);
        }
        if !self.inner.status.can_run() {
            return Err(MonitorError::RunNotAllowed);
        }
        self.inner
            .api
            .start_run()
            .await
            .map_err(|e| MonitorError::RunInitiationFailed(e.to_string()))?;
        info!("Run requested");
        Ok(())
    }

    /// Hides `key` at once, then asks the server to delete it
    ///
    /// Returns false when the server did not confirm; the key stays hidden regardless.
    pub async fn delete_item(&self, key: &str) -> MonitorResult<bool> {
        self.inner.overlay.mark_hidden(key)?;
        self.inner.emit(DashboardEvent::Hidden {
            key: key.to_string(),
        });
        match self.inner.api.delete_item(key).await {
            Ok(()) => {
                info!("Deleted '{}'", key);
                Ok(true)
            }
            Err(e) => {
                self.inner.overlay.delete_rejected(key);
                self.inner.emit(DashboardEvent::DeleteRejected {
                    key: key.to_string(),
                    reason: e.to_string(),
                });
                Ok(false)
            }
        }
    }

    pub fn unhide(&self, key: &str) -> MonitorResult<bool> {
        self.inner.overlay.unhide(key)
    }

    pub fn hidden(&self) -> MonitorResult<HiddenSet> {
        self.inner.overlay.hidden()
    }

    /// Starts an authorization flow; its outcome arrives as an `Auth` event
    pub async fn start_auth(
        &self,
        provider: Provider,
        current_token: Option<String>,
    ) -> MonitorResult<(AuthPrompt, PollHandle)> {
        let events = self.inner.events.clone();
        let weak = Arc::downgrade(&self.inner);
        self.inner
            .auth
            .start(provider, current_token, move |outcome| {
                let authorized = matches!(outcome, AuthOutcome::Authorized { .. });
                let _ = events.send(DashboardEvent::Auth(outcome));
                if authorized {
                    spawn_status_refresh(weak.clone(), true);
                }
            })
            .await
    }

    pub fn cancel_auth(&self, provider: Provider) -> MonitorResult<bool> {
        self.inner.auth.cancel(provider)
    }

    pub fn is_auth_active(&self, handle: &PollHandle) -> bool {
        self.inner.auth.is_active(handle)
    }

    /// Follows the job log; lines are buffered and passed to `on_line`
    pub fn open_logs<F>(&self, on_line: F) -> MonitorResult<()>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.logs.open(on_line)
    }

    pub fn close_logs(&self) -> MonitorResult<bool> {
        self.inner.logs.close()
    }

    pub fn log_lines(&self) -> Vec<String> {
        self.inner.logs.lines()
    }
}
