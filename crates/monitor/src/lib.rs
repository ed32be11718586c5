//! Client-side monitoring for SyncWatch
//!
//! - [`RunStateMachine`] reduces pulled and pushed run snapshots into one [`RunView`]
//! - [`OverlayReconciler`] keeps user deletes visible until the server confirms them
//! - [`AuthCoordinator`] runs the provider authorization polls
//! - [`Dashboard`] owns all of the above plus the log feed and status checks
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use syncwatch_monitor::{Dashboard, DashboardSettings, MemoryHiddenStore};
//! use syncwatch_network::{ApiClient, Client, EventStreamClient};
//! use syncwatch_resilience::ReconnectBackoff;
//! # use syncwatch_monitor::{CredentialSink, MonitorResult};
//! # struct NoCredentials;
//! # impl CredentialSink for NoCredentials {
//! #     fn store_token(&self, _: syncwatch_core::Provider, _: &str) -> MonitorResult<()> { Ok(()) }
//! # }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::new()?;
//! let streams = Arc::new(EventStreamClient::http(client.clone(), ReconnectBackoff::default()));
//! let (dashboard, mut events) = Dashboard::new(
//!     ApiClient::new(client),
//!     streams,
//!     Box::new(MemoryHiddenStore::default()),
//!     Arc::new(NoCredentials),
//!     DashboardSettings::default(),
//! );
//! dashboard.start().await?;
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! # Ok(())
//! # }
//! ```

mod error;

pub mod auth;
pub mod dashboard;
pub mod log_feed;
pub mod overlay;
pub mod run_state;
pub mod status;

pub use auth::{token_in_server_config, AuthCoordinator, AuthOutcome, AuthPrompt, CredentialSink};
pub use dashboard::{Dashboard, DashboardEvent, DashboardSettings};
pub use error::{MonitorError, MonitorResult};
pub use log_feed::LogFeed;
pub use overlay::{
    compute_display_status, reconcile, DisplayItem, DisplayStatus, HiddenStore,
    MemoryHiddenStore, OverlayReconciler, Revision,
};
pub use run_state::{milestone_progress, RunPhase, RunStateMachine, RunView, Transition};
pub use status::{StatsMonitor, StatusMonitor, STATS_MIN_INTERVAL};
