// crates/monitor/src/run_state.rs
//! Reducer from run snapshots to one coherent run view
//!
//! Pulled snapshots and pushed summary events go through the same `apply`. The reducer is
//! idempotent and tolerates either feed arriving late:
//!
//! - a snapshot with an older `started_at` than the current one is stale
//! - a snapshot without `started_at` never replaces one with it
//! - when neither carries `started_at`, a running snapshot after a finished run, or one
//!   whose timeline went backwards, starts a new run
//! - within one run, a snapshot ranks by (finished, milestones, detail) and a lower rank
//!   is stale, so a finished run is never overwritten by a late running snapshot

use log::{debug, info, warn};
use std::cmp::Ordering;
use syncwatch_core::{RunResult, RunSummary, Timeline};

/// Coarse state of the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    Idle,
    /// Running but no milestone after `start` yet
    Starting,
    Running,
    FinishedOk,
    FinishedBad,
}

impl RunPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }

    fn of(summary: &RunSummary) -> Self {
        if summary.running {
            if summary.timeline.milestones_reached() == 0 {
                Self::Starting
            } else {
                Self::Running
            }
        } else {
            match summary.exit_code {
                Some(0) => Self::FinishedOk,
                Some(_) => Self::FinishedBad,
                None => Self::Idle,
            }
        }
    }
}

/// Derived view of the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunView {
    pub phase: RunPhase,
    /// Progress estimate, non-decreasing within a run
    pub progress_pct: u8,
    /// Whether the snapshot before the current one was running
    pub was_running_prev: bool,
    pub result: Option<RunResult>,
}

impl RunView {
    pub fn idle() -> Self {
        Self {
            phase: RunPhase::Idle,
            progress_pct: 0,
            was_running_prev: false,
            result: None,
        }
    }

    /// One-line status text for the run header
    pub fn headline(&self) -> &'static str {
        match self.phase {
            RunPhase::Starting | RunPhase::Running => "Running…",
            RunPhase::FinishedOk if self.result == Some(RunResult::Equal) => "In sync",
            RunPhase::FinishedOk => "Synced",
            RunPhase::FinishedBad => "Attention needed",
            RunPhase::Idle => "Idle: run a sync to see results",
        }
    }
}

impl Default for RunView {
    fn default() -> Self {
        Self::idle()
    }
}

/// Progress for the milestones in `timeline`
///
/// Thirds of the `pre`/`post`/`done` milestones, so 0, 15, 66, 100. A single
/// milestone shows the 15 floor rather than 33.
pub fn milestone_progress(timeline: &Timeline) -> u8 {
    match timeline.milestones_reached() {
        0 => 0,
        1 => 15,
        reached => (u16::from(reached) * 100 / 3) as u8,
    }
}

/// Outcome of applying one snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Duplicate or stale snapshot; the view is unchanged
    Ignored,
    /// The view changed
    Updated(RunView),
    /// The view changed and the run just stopped; reported once per run
    Finished(RunView),
}

impl Transition {
    pub fn view(&self) -> Option<&RunView> {
        match self {
            Self::Ignored => None,
            Self::Updated(view) | Self::Finished(view) => Some(view),
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Rank of a snapshot within one run; higher means more complete
fn rank(summary: &RunSummary) -> (bool, u8, u8) {
    let detail = [
        summary.exit_code.is_some(),
        summary.result.is_some(),
        summary.finished_at.is_some(),
        summary.pre_counts.is_some(),
        summary.post_counts.is_some(),
        summary.duration_sec.is_some(),
    ]
    .iter()
    .filter(|set| **set)
    .count() as u8;
    (
        summary.is_finished(),
        summary.timeline.completion(),
        detail,
    )
}

/// Where `next` stands relative to `current`
fn compare_runs(current: &RunSummary, next: &RunSummary) -> Ordering {
    match (current.started_at, next.started_at) {
        (Some(cur), Some(new)) if new != cur => new.cmp(&cur),
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        _ if restarts(current, next) => Ordering::Greater,
        _ => rank(next).cmp(&rank(current)),
    }
}

/// Between untimestamped snapshots, a running one after a finished run or with a
/// timeline that lost flags belongs to a new run
fn restarts(current: &RunSummary, next: &RunSummary) -> bool {
    current.started_at.is_none()
        && next.started_at.is_none()
        && next.running
        && (current.is_finished() || !next.timeline.covers(&current.timeline))
}

/// The run reducer
#[derive(Debug, Default)]
pub struct RunStateMachine {
    current: Option<RunSummary>,
    view: RunView,
}

impl RunStateMachine {
    /// Creates a reducer with no run seen yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Current derived view
    pub fn view(&self) -> RunView {
        self.view
    }

    /// Last accepted snapshot
    pub fn summary(&self) -> Option<&RunSummary> {
        self.current.as_ref()
    }

    pub fn is_running(&self) -> bool {
        self.current.as_ref().is_some_and(|s| s.running)
    }

    /// Decodes and applies a pushed payload; malformed payloads are ignored
    pub fn apply_payload(&mut self, payload: &str) -> Transition {
        match RunSummary::from_json(payload) {
            Ok(summary) => self.apply(summary),
            Err(e) => {
                warn!("Ignoring malformed run summary: {}", e);
                Transition::Ignored
            }
        }
    }

    /// Applies one snapshot from either feed
    pub fn apply(&mut self, summary: RunSummary) -> Transition {
        let same_run = match &self.current {
            None => false,
            Some(current) if *current == summary => {
                debug!("Duplicate run snapshot");
                return Transition::Ignored;
            }
            Some(current) => match compare_runs(current, &summary) {
                Ordering::Less => {
                    debug!("Stale run snapshot (started_at {:?})", summary.started_at);
                    return Transition::Ignored;
                }
                // A tie in rank with different content is a same-run update
                Ordering::Equal => true,
                Ordering::Greater => {
                    current.started_at == summary.started_at && !restarts(current, &summary)
                }
            },
        };

        let was_running = self.is_running();
        let phase = RunPhase::of(&summary);
        let target = milestone_progress(&summary.timeline);
        let progress_pct = match phase {
            RunPhase::Idle => 0,
            _ if same_run => target.max(self.view.progress_pct),
            _ => target,
        };

        let view = RunView {
            phase,
            progress_pct,
            was_running_prev: was_running,
            result: summary.result,
        };

        let finished = was_running && !summary.running;
        if finished {
            info!(
                "Run finished: {:?} (exit {:?})",
                phase, summary.exit_code
            );
        } else if !same_run && summary.running {
            info!("Run started at {:?}", summary.started_at);
        }

        self.current = Some(summary);
        self.view = view;

        if finished {
            Transition::Finished(view)
        } else {
            Transition::Updated(view)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(minute: u32) -> RunSummary {
        let payload = format!(
            r#"{{"running": false, "started_at": "2025-08-01T10:{:02}:00Z"}}"#,
            minute
        );
        RunSummary::from_json(&payload).expect("valid summary")
    }

    fn running(minute: u32, pre: bool, post: bool, done: bool) -> RunSummary {
        let mut s = at(minute);
        s.running = true;
        s.timeline = Timeline {
            start: true,
            pre,
            post,
            done,
        };
        s
    }

    fn finished(minute: u32, exit_code: i32) -> RunSummary {
        let mut s = at(minute);
        s.exit_code = Some(exit_code);
        s.timeline = Timeline {
            start: true,
            pre: true,
            post: true,
            done: true,
        };
        s
    }

    #[test]
    fn test_phases() {
        let mut machine = RunStateMachine::new();
        assert_eq!(machine.view().phase, RunPhase::Idle);

        machine.apply(running(0, false, false, false));
        assert_eq!(machine.view().phase, RunPhase::Starting);

        machine.apply(running(0, true, false, false));
        assert_eq!(machine.view().phase, RunPhase::Running);

        machine.apply(finished(0, 2));
        assert_eq!(machine.view().phase, RunPhase::FinishedBad);
    }

    #[test]
    fn test_progress_scenario() {
        let mut machine = RunStateMachine::new();

        machine.apply(running(0, false, false, false));
        assert_eq!(machine.view().progress_pct, 0);

        machine.apply(running(0, true, false, false));
        assert_eq!(machine.view().progress_pct, 15);

        machine.apply(running(0, true, true, false));
        assert_eq!(machine.view().progress_pct, 66);

        machine.apply(running(0, true, true, true));
        assert_eq!(machine.view().progress_pct, 100);

        let transition = machine.apply(finished(0, 0));
        assert!(transition.is_finished());
        assert_eq!(machine.view().phase, RunPhase::FinishedOk);
        assert_eq!(machine.view().progress_pct, 100);
    }

    #[test]
    fn test_finished_reported_once() {
        let mut machine = RunStateMachine::new();
        machine.apply(running(0, true, false, false));

        assert!(machine.apply(finished(0, 0)).is_finished());
        assert_eq!(machine.apply(finished(0, 0)), Transition::Ignored);

        let mut detailed = finished(0, 0);
        detailed.duration_sec = Some(12.0);
        let again = machine.apply(detailed);
        assert!(matches!(again, Transition::Updated(_)));
    }

    #[test]
    fn test_no_finish_without_seeing_run() {
        let mut machine = RunStateMachine::new();
        let transition = machine.apply(finished(0, 0));
        assert!(matches!(transition, Transition::Updated(_)));
        assert!(!machine.view().was_running_prev);
    }

    #[test]
    fn test_late_running_snapshot_ignored() {
        let mut machine = RunStateMachine::new();
        machine.apply(running(0, true, false, false));
        machine.apply(finished(0, 0));

        assert_eq!(machine.apply(running(0, true, true, false)), Transition::Ignored);
        assert_eq!(machine.view().phase, RunPhase::FinishedOk);
    }

    #[test]
    fn test_older_run_ignored() {
        let mut machine = RunStateMachine::new();
        machine.apply(running(5, true, false, false));
        assert_eq!(machine.apply(finished(0, 0)), Transition::Ignored);
        assert_eq!(machine.view().phase, RunPhase::Running);
    }

    #[test]
    fn test_new_run_resets_progress() {
        let mut machine = RunStateMachine::new();
        machine.apply(running(0, true, true, true));
        machine.apply(finished(0, 0));

        let transition = machine.apply(running(5, false, false, false));
        let view = transition.view().copied().expect("accepted");
        assert_eq!(view.phase, RunPhase::Starting);
        assert_eq!(view.progress_pct, 0);
    }

    #[test]
    fn test_less_complete_timeline_loses() {
        let mut machine = RunStateMachine::new();
        machine.apply(running(0, true, true, false));
        assert_eq!(machine.apply(running(0, true, false, false)), Transition::Ignored);
        assert_eq!(machine.view().progress_pct, 66);
    }

    fn untimed(payload: &str) -> RunSummary {
        RunSummary::from_json(payload).expect("valid summary")
    }

    #[test]
    fn test_new_run_without_started_at() {
        let mut machine = RunStateMachine::new();
        machine.apply(untimed(
            r#"{"running": true, "timeline": {"start": true, "pre": true}}"#,
        ));
        machine.apply(untimed(
            r#"{"running": false, "exit_code": 0, "timeline": {"start": true, "pre": true, "post": true, "done": true}}"#,
        ));
        assert_eq!(machine.view().phase, RunPhase::FinishedOk);

        let transition = machine.apply(untimed(r#"{"running": true, "timeline": {"start": true}}"#));
        let view = transition.view().copied().expect("accepted as a new run");
        assert_eq!(view.phase, RunPhase::Starting);
        assert_eq!(view.progress_pct, 0);
        assert!(!view.was_running_prev);
    }

    #[test]
    fn test_timeline_reset_without_started_at() {
        let mut machine = RunStateMachine::new();
        machine.apply(untimed(
            r#"{"running": true, "timeline": {"start": true, "pre": true, "post": true}}"#,
        ));
        assert_eq!(machine.view().progress_pct, 66);

        machine.apply(untimed(r#"{"running": true, "timeline": {"start": true}}"#));
        assert_eq!(machine.view().phase, RunPhase::Starting);
        assert_eq!(machine.view().progress_pct, 0);
    }

    #[test]
    fn test_idle_snapshot_does_not_hide_known_run() {
        let mut machine = RunStateMachine::new();
        machine.apply(finished(0, 0));
        assert_eq!(machine.apply(RunSummary::idle()), Transition::Ignored);
    }

    #[test]
    fn test_malformed_payload_ignored() {
        let mut machine = RunStateMachine::new();
        machine.apply(running(0, true, false, false));
        assert_eq!(machine.apply_payload("{not json"), Transition::Ignored);
        assert_eq!(
            machine.apply_payload(r#"{"running": true, "finished_at": "2025-08-01T10:00:00Z"}"#),
            Transition::Ignored
        );
        assert_eq!(machine.view().phase, RunPhase::Running);
    }

    #[test]
    fn test_headlines() {
        let mut view = RunView::idle();
        assert_eq!(view.headline(), "Idle: run a sync to see results");
        view.phase = RunPhase::FinishedOk;
        view.result = Some(RunResult::Equal);
        assert_eq!(view.headline(), "In sync");
        view.result = Some(RunResult::Changed);
        assert_eq!(view.headline(), "Synced");
        view.phase = RunPhase::FinishedBad;
        assert_eq!(view.headline(), "Attention needed");
    }
}
