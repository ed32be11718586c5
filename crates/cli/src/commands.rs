// FILE: crates/cli/src/commands.rs

use anyhow::{bail, Context, Result};
use chrono::DateTime;
use clap::ArgMatches;
use console::style;
use log::warn;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use syncwatch_config::{Config, ConfigManager, StreamConfig};
use syncwatch_core::{Provider, ScheduleStatus, ServiceStatus, SyncStats, VersionInfo};
use syncwatch_monitor::{
    token_in_server_config, AuthOutcome, AuthPrompt, CredentialSink, Dashboard, DashboardEvent,
    DashboardSettings, DisplayItem, DisplayStatus, RunView,
};
use syncwatch_network::{ApiClient, Client, ClientConfig, EventStreamClient};
use syncwatch_resilience::{ReconnectBackoff, RetryPolicy};
use tokio::sync::mpsc::UnboundedReceiver;

const PLEX_LINK_URL: &str = "https://plex.tv/link";

/// Loaded configuration plus the manager it came from
pub struct AppContext {
    manager: Arc<ConfigManager>,
    config: Config,
}

impl AppContext {
    /// Loads the config from `config_dir` (or the platform dir), then applies overrides
    pub fn load(config_dir: Option<&str>, server: Option<&str>) -> Result<Self> {
        let manager = match config_dir {
            Some(dir) => ConfigManager::with_directory(PathBuf::from(dir)),
            None => ConfigManager::new(),
        }
        .context("Failed to locate config directory")?;

        let mut config = manager
            .load_with_env_overrides()
            .with_context(|| format!("Failed to read {}", manager.config_path().display()))?;
        if let Some(url) = server {
            config.server.base_url = url.trim_end_matches('/').to_string();
        }
        Ok(Self::with_manager(manager, config))
    }

    pub fn with_manager(manager: ConfigManager, config: Config) -> Self {
        Self {
            manager: Arc::new(manager),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn manager(&self) -> &ConfigManager {
        &self.manager
    }

    fn client(&self) -> Result<Client> {
        Client::with_config(client_config(&self.config)).context("Invalid server settings")
    }

    pub fn api(&self) -> Result<ApiClient> {
        Ok(ApiClient::new(self.client()?))
    }

    /// Builds a dashboard wired to the server, the hidden-set file and the credential store
    pub fn dashboard(&self) -> Result<(Dashboard, UnboundedReceiver<DashboardEvent>)> {
        let client = self.client()?;
        let streams = Arc::new(EventStreamClient::http(
            client.clone(),
            reconnect_backoff(&self.config.stream),
        ));
        let hidden = self.manager.hidden_set_file(&self.config);
        let credentials: Arc<dyn CredentialSink> = self.manager.clone();

        Ok(Dashboard::new(
            ApiClient::new(client),
            streams,
            Box::new(hidden),
            credentials,
            DashboardSettings::from_config(&self.config),
        ))
    }
}

/// HTTP client settings taken from the `server` section
pub(crate) fn client_config(config: &Config) -> ClientConfig {
    let server = &config.server;
    let retry_policy = (server.max_retries > 1).then(|| {
        RetryPolicy::new(server.max_retries)
            .with_initial_delay(Duration::from_millis(server.retry_initial_delay_ms))
    });
    ClientConfig {
        base_url: server.base_url.clone(),
        timeout: Duration::from_secs(server.request_timeout_secs),
        retry_policy,
        ..ClientConfig::default()
    }
}

/// Reconnect delays taken from the `stream` section; streams retry forever
pub(crate) fn reconnect_backoff(stream: &StreamConfig) -> ReconnectBackoff {
    ReconnectBackoff::new(
        RetryPolicy::new(usize::MAX)
            .with_initial_delay(Duration::from_millis(stream.reconnect_initial_ms))
            .with_max_delay(Duration::from_millis(stream.reconnect_max_ms)),
    )
}

/// Write a default config file
pub fn init(ctx: &AppContext) -> Result<()> {
    let path = ctx.manager().config_path();
    let created = ctx
        .manager()
        .initialize()
        .context("Failed to write default config")?;

    if created {
        println!("{} Config written to {}", style("✓").green().bold(), path.display());
    } else {
        println!("Config already exists at {}", path.display());
    }
    Ok(())
}

/// Ask the server to start a run
pub async fn start_run(ctx: &AppContext) -> Result<()> {
    let (dashboard, _events) = ctx.dashboard()?;
    if let Err(e) = dashboard.refresh_run().await {
        warn!("Could not fetch the current run: {}", e);
    }
    if let Err(e) = dashboard.refresh_status(false).await {
        warn!("Could not fetch service status: {}", e);
    }

    dashboard
        .initiate_run()
        .await
        .context("Failed to start sync")?;
    println!("{} Sync started", style("✓").green().bold());
    Ok(())
}

/// Show the latest run summary
pub async fn show_summary(ctx: &AppContext) -> Result<()> {
    let (dashboard, _events) = ctx.dashboard()?;
    let view = dashboard
        .refresh_run()
        .await
        .context("Failed to fetch run summary")?;

    println!("\n{}", style(view.headline()).bold().cyan());
    println!("{}", "=".repeat(80));
    if view.phase.is_running() {
        println!("{}", run_line(&view));
    }
    if let Some(summary) = dashboard.summary() {
        for line in summary.report_lines() {
            println!("{}", line);
        }
    }
    Ok(())
}

/// List items with the hidden-set overlay applied
pub async fn list_items(ctx: &AppContext) -> Result<()> {
    let (dashboard, mut events) = ctx.dashboard()?;
    dashboard
        .refresh_items()
        .await
        .context("Failed to fetch items")?;

    while let Ok(event) = events.try_recv() {
        match event {
            DashboardEvent::Items {
                rows,
                last_sync_epoch,
                missing_tmdb_key,
            } => {
                println!("\n{} Items", style(rows.len()).bold().cyan());
                println!("{}", "=".repeat(80));
                for row in &rows {
                    println!("{}", item_row(row));
                }
                if let Some(epoch) = last_sync_epoch {
                    println!("\nLast sync: {}", format_epoch(epoch));
                }
                if missing_tmdb_key {
                    println!("{}", style("No TMDb API key configured; posters are unavailable").yellow());
                }
            }
            DashboardEvent::ItemsUnavailable {
                reason,
                missing_tmdb_key,
            } => {
                println!("No items yet: {}", reason);
                if missing_tmdb_key {
                    println!("{}", style("No TMDb API key configured").yellow());
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Delete an item from the server's watchlist
pub async fn delete_item(ctx: &AppContext, matches: &ArgMatches) -> Result<()> {
    let key = matches
        .get_one::<String>("key")
        .ok_or_else(|| anyhow::anyhow!("Item key is required"))?;
    let force = matches.get_flag("force");

    if !force {
        println!("Are you sure you want to delete '{}'? (y/N)", key);
        let mut input = String::new();
        std::io::stdin()
            .read_line(&mut input)
            .context("Failed to read input")?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    let (dashboard, mut events) = ctx.dashboard()?;
    if dashboard.delete_item(key).await? {
        println!("{} Deleted: {}", style("✓").green().bold(), key);
        return Ok(());
    }

    let reason = std::iter::from_fn(|| events.try_recv().ok())
        .find_map(|event| match event {
            DashboardEvent::DeleteRejected { reason, .. } => Some(reason),
            _ => None,
        })
        .unwrap_or_else(|| "no reason given".to_string());
    println!(
        "{} Server did not confirm deleting '{}': {}",
        style("!").yellow().bold(),
        key,
        reason
    );
    println!("  It stays hidden; run `syncwatch unhide {}` to show it again.", key);
    Ok(())
}

/// Remove a key from the hidden set
pub fn unhide_item(ctx: &AppContext, matches: &ArgMatches) -> Result<()> {
    let key = matches
        .get_one::<String>("key")
        .ok_or_else(|| anyhow::anyhow!("Item key is required"))?;

    let (dashboard, _events) = ctx.dashboard()?;
    if dashboard.unhide(key)? {
        println!("{} '{}' is no longer hidden", style("✓").green().bold(), key);
    } else {
        println!("'{}' was not hidden", key);
    }
    Ok(())
}

/// Connect an account and wait for the server to report the new token
pub async fn authorize(ctx: &AppContext, matches: &ArgMatches) -> Result<()> {
    let provider: Provider = matches
        .get_one::<String>("provider")
        .ok_or_else(|| anyhow::anyhow!("Provider is required"))?
        .parse()
        .map_err(anyhow::Error::msg)?;

    // Only a token different from the one the server already holds completes the flow
    let baseline = match ctx.api()?.server_config().await {
        Ok(config) => token_in_server_config(&config, provider),
        Err(e) => {
            warn!("Could not read server config: {}", e);
            ctx.config()
                .credentials
                .token(provider)
                .map(str::to_string)
        }
    };

    let (dashboard, mut events) = ctx.dashboard()?;
    let (prompt, _handle) = dashboard
        .start_auth(provider, baseline)
        .await
        .with_context(|| format!("Failed to start {} authorization", provider))?;

    match prompt {
        AuthPrompt::LinkCode(code) => {
            println!(
                "Enter code {} at {}",
                style(&code.code).bold().cyan(),
                PLEX_LINK_URL
            );
            if let Some(secs) = code.expires_in {
                println!("  The code expires in {}", format_duration(secs));
            }
        }
        AuthPrompt::AuthorizeUrl(url) => {
            println!("Open this URL and approve access:\n  {}", style(url).cyan());
        }
    }
    println!("Waiting for authorization (Ctrl+C to cancel)...");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(DashboardEvent::Auth(AuthOutcome::Authorized { provider, stored, .. })) => {
                    println!("{} {} connected", style("✓").green().bold(), provider);
                    if !stored {
                        println!(
                            "{} The token could not be saved to {}",
                            style("!").yellow().bold(),
                            ctx.manager().config_path().display()
                        );
                    }
                    return Ok(());
                }
                Some(DashboardEvent::Auth(AuthOutcome::TimedOut { provider })) => {
                    bail!("{} authorization was not completed in time", provider);
                }
                Some(_) => {}
                None => bail!("Authorization stopped unexpectedly"),
            },
            _ = tokio::signal::ctrl_c() => {
                dashboard.cancel_auth(provider)?;
                println!("Authorization cancelled.");
                return Ok(());
            }
        }
    }
}

/// Print job log lines until interrupted
pub async fn follow_logs(ctx: &AppContext) -> Result<()> {
    let (dashboard, _events) = ctx.dashboard()?;
    dashboard.open_logs(|line| println!("{}", line))?;
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    dashboard.close_logs()?;
    Ok(())
}

/// Show connectivity and the schedule
pub async fn show_status(ctx: &AppContext) -> Result<()> {
    let (dashboard, _events) = ctx.dashboard()?;
    let status = dashboard
        .refresh_status(true)
        .await
        .context("Failed to fetch service status")?;

    println!("\n{}", style("Service Status").bold().cyan());
    println!("{}", "=".repeat(80));
    if let Some(status) = status {
        for line in status_lines(&status) {
            println!("{}", line);
        }
    }
    match dashboard.refresh_schedule().await {
        Ok(schedule) => println!("{}", schedule_line(&schedule)),
        Err(e) => warn!("Could not fetch schedule: {}", e),
    }
    match dashboard.refresh_stats(true).await {
        Ok(Some(stats)) => {
            for line in stats_lines(&stats) {
                println!("{}", line);
            }
        }
        Ok(None) => println!("Stats: none yet"),
        Err(e) => warn!("Could not fetch stats: {}", e),
    }
    match dashboard.check_version().await {
        Ok(info) => println!("{}", version_line(&info)),
        Err(e) => warn!("Could not check server version: {}", e),
    }
    Ok(())
}

/// Progress bar plus headline for a run view
pub(crate) fn run_line(view: &RunView) -> String {
    format!("{} {}", progress_bar(view.progress_pct, 40), view.headline())
}

pub(crate) fn progress_bar(pct: u8, width: usize) -> String {
    let pct = usize::from(pct.min(100));
    let filled = (pct * width / 100).min(width);
    format!(
        "[{}{}] {:>3}%",
        "=".repeat(filled),
        " ".repeat(width - filled),
        pct
    )
}

pub(crate) fn item_row(row: &DisplayItem) -> String {
    let status = match row.status {
        DisplayStatus::Deleted => style(row.status.to_string()).red(),
        _ => style(row.status.to_string()).dim(),
    };
    format!(
        "  {:<40} {:<20} {}",
        truncate(&row.item.label(), 40),
        truncate(&row.item.key, 20),
        status
    )
}

pub(crate) fn status_lines(status: &ServiceStatus) -> Vec<String> {
    let mark = |ok: bool| if ok { "connected" } else { "not connected" };
    vec![
        format!("{}: {}", Provider::Plex, mark(status.plex_connected)),
        format!("{}: {}", Provider::Simkl, mark(status.simkl_connected)),
        format!("Can run: {}", if status.can_run { "Yes" } else { "No" }),
    ]
}

pub(crate) fn schedule_line(schedule: &ScheduleStatus) -> String {
    match (schedule.enabled, schedule.next_run_at) {
        (false, _) => "Schedule: off".to_string(),
        (true, Some(epoch)) => format!("Schedule: next run {}", format_epoch(epoch)),
        (true, None) => "Schedule: on".to_string(),
    }
}

pub(crate) fn stats_lines(stats: &SyncStats) -> Vec<String> {
    let trend = match stats.week_delta() {
        0 => "no change".to_string(),
        delta => format!("{:+} vs last week", delta),
    };
    let mut lines = vec![format!(
        "Items: {} now, {} last week, {} last month ({})",
        stats.now, stats.week, stats.month, trend
    )];
    if let (Some(added), Some(removed)) = (stats.last_added, stats.last_removed) {
        lines.push(format!("Last run: +{} / -{}", added, removed));
    }
    lines
}

pub(crate) fn version_line(info: &VersionInfo) -> String {
    match (&info.latest, info.update_available) {
        (Some(latest), true) => format!(
            "Server {}: update {} available{}",
            info.current,
            latest,
            info.html_url
                .as_deref()
                .map(|url| format!(" at {}", url))
                .unwrap_or_default()
        ),
        _ => format!("Server {}: up to date", info.current),
    }
}

pub(crate) fn format_epoch(epoch: i64) -> String {
    DateTime::from_timestamp(epoch, 0)
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| epoch.to_string())
}

fn format_duration(seconds: u64) -> String {
    let minutes = seconds / 60;
    if minutes > 0 {
        format!("{}m {}s", minutes, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
