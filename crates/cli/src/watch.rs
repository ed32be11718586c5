// FILE: crates/cli/src/watch.rs

use crate::commands::{
    item_row, run_line, schedule_line, stats_lines, status_lines, version_line, AppContext,
};
use anyhow::{Context, Result};
use console::{style, Term};
use log::debug;
use syncwatch_monitor::{AuthOutcome, DashboardEvent};
use tokio::sync::mpsc::UnboundedReceiver;

/// Follows the run until Ctrl+C
pub async fn run(ctx: &AppContext, with_logs: bool) -> Result<()> {
    let (dashboard, mut events) = ctx.dashboard()?;
    let term = Term::stdout();

    dashboard
        .start()
        .await
        .context("Failed to subscribe to run updates")?;
    if let Err(e) = dashboard.check_version().await {
        debug!("Version check failed: {}", e);
    }
    if with_logs {
        dashboard.open_logs(|line| println!("  {}", style(line).dim()))?;
    }

    term.write_line(&format!(
        "Watching {} (Ctrl+C to stop)",
        style(&ctx.config().server.base_url).cyan()
    ))
    .context("Failed to write header")?;

    let result = watch_loop(&term, &mut events).await;
    dashboard.shutdown()?;
    result
}

async fn watch_loop(term: &Term, events: &mut UnboundedReceiver<DashboardEvent>) -> Result<()> {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if matches!(event, DashboardEvent::RunFinished(_)) {
                        // Terminal bell as the finished cue
                        let _ = term.write_str("\x07");
                    }
                    for line in describe(&event) {
                        term.write_line(&line).context("Failed to write event")?;
                    }
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

/// Terminal lines for one dashboard event
fn describe(event: &DashboardEvent) -> Vec<String> {
    match event {
        DashboardEvent::Run(view) => vec![run_line(view)],
        DashboardEvent::RunFinished(view) => vec![format!(
            "{} Sync finished: {}",
            style("✓").green().bold(),
            view.headline()
        )],
        DashboardEvent::Items { rows, .. } => {
            let mut lines = vec![format!("{} Items", style(rows.len()).bold())];
            lines.extend(rows.iter().map(item_row));
            lines
        }
        DashboardEvent::ItemsUnavailable { reason, .. } => vec![format!("No items yet: {}", reason)],
        DashboardEvent::Schedule(schedule) => vec![schedule_line(schedule)],
        DashboardEvent::Status(status) => status_lines(status),
        DashboardEvent::Stats(stats) => stats_lines(stats),
        DashboardEvent::Version(info) => vec![version_line(info)],
        DashboardEvent::Hidden { key } => vec![format!("Hidden '{}'", key)],
        DashboardEvent::DeleteRejected { key, reason } => vec![format!(
            "{} Delete of '{}' not confirmed: {}",
            style("!").yellow().bold(),
            key,
            reason
        )],
        DashboardEvent::Auth(AuthOutcome::Authorized {
            provider, stored, ..
        }) => {
            let mut lines = vec![format!("{} {} connected", style("✓").green().bold(), provider)];
            if !stored {
                lines.push("  The token was not saved locally".to_string());
            }
            lines
        }
        DashboardEvent::Auth(AuthOutcome::TimedOut { provider }) => {
            vec![format!("{} authorization timed out", provider)]
        }
        DashboardEvent::Failure { kind, message } => vec![format!(
            "{} {} ({})",
            style("✗").red().bold(),
            message,
            kind.user_message()
        )],
    }
}
