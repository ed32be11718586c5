//! Benchmarks for the overlay and the run reducer
//!
//! Run with: cargo bench --package syncwatch-monitor

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use syncwatch_core::{HiddenSet, Item, ItemStatus, RunSummary};
use syncwatch_monitor::{compute_display_status, reconcile, MemoryHiddenStore, OverlayReconciler, RunStateMachine};

fn items(count: usize) -> Vec<Item> {
    (0..count)
        .map(|i| {
            let status = match i % 4 {
                0 => ItemStatus::BothSides,
                1 => ItemStatus::SideAOnly,
                2 => ItemStatus::SideBOnly,
                _ => ItemStatus::ServerDeleted,
            };
            Item::new(format!("tmdb:{}", i), status).with_meta("title", format!("Title {}", i))
        })
        .collect()
}

fn hidden(count: usize, step: usize) -> HiddenSet {
    (0..count).step_by(step).map(|i| format!("tmdb:{}", i)).collect()
}

fn bench_display_status(c: &mut Criterion) {
    let items = items(5_000);
    let hidden = hidden(5_000, 10);

    c.bench_function("overlay_display_status_5k", |b| {
        b.iter(|| {
            let statuses: Vec<_> = items
                .iter()
                .map(|item| compute_display_status(item, &hidden))
                .collect();
            black_box(statuses);
        });
    });
}

fn bench_reconcile(c: &mut Criterion) {
    let items = items(5_000);
    let hidden = hidden(5_000, 10);

    c.bench_function("overlay_reconcile_5k", |b| {
        b.iter(|| {
            black_box(reconcile(&items, &hidden));
        });
    });
}

fn bench_apply_items(c: &mut Criterion) {
    let items = items(2_000);

    c.bench_function("overlay_apply_items_2k", |b| {
        b.iter(|| {
            let overlay =
                OverlayReconciler::new(Box::new(MemoryHiddenStore::new(hidden(2_000, 7))));
            let since = overlay.begin_refresh().expect("refresh");
            let rows = overlay.apply_items(since, &items).expect("apply");
            black_box(rows);
        });
    });
}

fn bench_reducer(c: &mut Criterion) {
    let snapshots: Vec<RunSummary> = [
        r#"{"running": true, "started_at": "2025-08-01T10:00:00Z", "timeline": {"start": true}}"#,
        r#"{"running": true, "started_at": "2025-08-01T10:00:00Z", "timeline": {"start": true, "pre": true}}"#,
        r#"{"running": true, "started_at": "2025-08-01T10:00:00Z", "timeline": {"start": true, "pre": true, "post": true}}"#,
        r#"{"running": false, "exit_code": 0, "started_at": "2025-08-01T10:00:00Z", "timeline": {"start": true, "pre": true, "post": true, "done": true}}"#,
    ]
    .iter()
    .map(|raw| RunSummary::from_json(raw).expect("snapshot"))
    .collect();

    c.bench_function("reducer_apply_run", |b| {
        b.iter(|| {
            let mut machine = RunStateMachine::new();
            for snapshot in snapshots.iter().rev().chain(snapshots.iter()) {
                black_box(machine.apply(snapshot.clone()));
            }
            black_box(machine.view());
        });
    });
}

criterion_group!(
    benches,
    bench_display_status,
    bench_reconcile,
    bench_apply_items,
    bench_reducer
);
criterion_main!(benches);
