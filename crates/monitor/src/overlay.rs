// crates/monitor/src/overlay.rs
//! Optimistic-delete overlay
//!
//! The user's deletes are remembered in a persisted hidden set and shown at once, before the
//! server confirms anything. Each authoritative item list prunes the keys the server now
//! reports as deleted. A rejected delete leaves the key hidden; only the user can unhide it.

use crate::error::{MonitorError, MonitorResult};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard};
use syncwatch_config::HiddenSetFile;
use syncwatch_core::{HiddenSet, Item, ItemStatus};

/// Status shown for an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayStatus {
    /// Hidden by the user, whatever the server says
    Deleted,
    /// The server's status
    Authoritative(ItemStatus),
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted | Self::Authoritative(ItemStatus::ServerDeleted) => {
                write!(f, "Status: Deleted")
            }
            Self::Authoritative(ItemStatus::BothSides) => write!(f, "Source: Synced"),
            Self::Authoritative(ItemStatus::SideAOnly) => write!(f, "Source: Plex"),
            Self::Authoritative(ItemStatus::SideBOnly) => write!(f, "Source: SIMKL"),
        }
    }
}

/// Status to display for `item` given the hidden set
pub fn compute_display_status(item: &Item, hidden: &HiddenSet) -> DisplayStatus {
    if hidden.contains(&item.key) {
        DisplayStatus::Deleted
    } else {
        DisplayStatus::Authoritative(item.status)
    }
}

/// Returns `hidden` without the keys `items` reports as deleted on the server
///
/// Keys absent from `items` stay hidden.
pub fn reconcile(items: &[Item], hidden: &HiddenSet) -> HiddenSet {
    let mut next = hidden.clone();
    next.retain(|key| {
        !items
            .iter()
            .any(|item| item.key == key && item.status == ItemStatus::ServerDeleted)
    });
    next
}

/// Durable home of the hidden set
pub trait HiddenStore: Send + Sync {
    fn load(&self) -> HiddenSet;
    fn save(&self, set: &HiddenSet) -> MonitorResult<()>;
}

impl HiddenStore for HiddenSetFile {
    fn load(&self) -> HiddenSet {
        HiddenSetFile::load(self)
    }

    fn save(&self, set: &HiddenSet) -> MonitorResult<()> {
        HiddenSetFile::save(self, set).map_err(MonitorError::from)
    }
}

/// Hidden set kept only in memory
#[derive(Debug, Default)]
pub struct MemoryHiddenStore {
    set: Mutex<HiddenSet>,
}

impl MemoryHiddenStore {
    /// Store starting with `initial`; nothing is written to disk
    pub fn new(initial: HiddenSet) -> Self {
        Self {
            set: Mutex::new(initial),
        }
    }
}

impl HiddenStore for MemoryHiddenStore {
    fn load(&self) -> HiddenSet {
        self.set
            .lock()
            .map(|set| set.clone())
            .unwrap_or_default()
    }

    fn save(&self, set: &HiddenSet) -> MonitorResult<()> {
        let mut stored = self.set.lock().map_err(|_| MonitorError::LockPoisoned)?;
        *stored = set.clone();
        Ok(())
    }
}

/// Revision of the hidden set when an item refresh began
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Revision(u64);

/// One row of the displayed list
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayItem {
    pub item: Item,
    pub status: DisplayStatus,
}

struct OverlayState {
    hidden: HiddenSet,
    revision: u64,
    /// Revision at which each key was last hidden
    hidden_at: HashMap<String, u64>,
}

/// Stateful overlay over a [`HiddenStore`]
pub struct OverlayReconciler {
    store: Box<dyn HiddenStore>,
    state: Mutex<OverlayState>,
}

impl OverlayReconciler {
    /// Loads the hidden set from `store`
    pub fn new(store: Box<dyn HiddenStore>) -> Self {
        let hidden = store.load();
        debug!("Overlay starts with {} hidden keys", hidden.len());
        Self {
            store,
            state: Mutex::new(OverlayState {
                hidden,
                revision: 0,
                hidden_at: HashMap::new(),
            }),
        }
    }

    fn state(&self) -> MonitorResult<MutexGuard<'_, OverlayState>> {
        self.state.lock().map_err(|_| MonitorError::LockPoisoned)
    }

    fn persist(&self, set: &HiddenSet) {
        if let Err(e) = self.store.save(set) {
            warn!("Could not persist hidden set: {}", e);
        }
    }

    /// Copy of the current hidden set
    pub fn hidden(&self) -> MonitorResult<HiddenSet> {
        Ok(self.state()?.hidden.clone())
    }

    /// Whether `key` is hidden; false if the state lock is poisoned
    pub fn is_hidden(&self, key: &str) -> bool {
        self.state()
            .map(|state| state.hidden.contains(key))
            .unwrap_or(false)
    }

    /// Hides `key` and persists the set; call before sending the delete request
    ///
    /// Returns false if the key was already hidden.
    pub fn mark_hidden(&self, key: &str) -> MonitorResult<bool> {
        let mut state = self.state()?;
        state.revision += 1;
        let revision = state.revision;
        state.hidden_at.insert(key.to_string(), revision);
        let inserted = state.hidden.insert(key);
        if inserted {
            debug!("Hid '{}'", key);
            self.persist(&state.hidden);
        }
        Ok(inserted)
    }

    /// Removes `key` from the hidden set; the only way a key becomes visible again
    pub fn unhide(&self, key: &str) -> MonitorResult<bool> {
        let mut state = self.state()?;
        state.hidden_at.remove(key);
        let removed = state.hidden.remove(key);
        if removed {
            info!("Unhid '{}'", key);
            self.persist(&state.hidden);
        }
        Ok(removed)
    }

    /// Records that the server rejected the delete for `key`; the key stays hidden
    pub fn delete_rejected(&self, key: &str) {
        warn!(
            "Server rejected delete of '{}'; keeping it hidden until the next refresh",
            key
        );
    }

    /// Marks the start of an item refresh
    pub fn begin_refresh(&self) -> MonitorResult<Revision> {
        Ok(Revision(self.state()?.revision))
    }

    /// Applies a fresh item list fetched since `since` and returns the rows to display
    ///
    /// Keys hidden after `since` are never pruned by this list.
    pub fn apply_items(&self, since: Revision, items: &[Item]) -> MonitorResult<Vec<DisplayItem>> {
        let mut state = self.state()?;

        let mut next = reconcile(items, &state.hidden);
        for (key, revision) in &state.hidden_at {
            if *revision > since.0 && state.hidden.contains(key) && !next.contains(key) {
                debug!("Keeping '{}' hidden; hidden after the refresh began", key);
                next.insert(key.clone());
            }
        }
        // Reinsertion appends; restore the original order
        let order: Vec<String> = state.hidden.iter().map(str::to_string).collect();
        let next: HiddenSet = order.into_iter().filter(|k| next.contains(k)).collect();

        if next != state.hidden {
            let pruned = state.hidden.len() - next.len();
            info!("Pruned {} hidden keys confirmed deleted by the server", pruned);
            let OverlayState {
                hidden, hidden_at, ..
            } = &mut *state;
            hidden_at.retain(|key, _| next.contains(key));
            *hidden = next;
            self.persist(hidden);
        }

        Ok(items
            .iter()
            .map(|item| DisplayItem {
                item: item.clone(),
                status: compute_display_status(item, &state.hidden),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(keys: &[&str]) -> HiddenSet {
        keys.iter().copied().collect()
    }

    fn overlay(keys: &[&str]) -> OverlayReconciler {
        OverlayReconciler::new(Box::new(MemoryHiddenStore::new(set(keys))))
    }

    #[test]
    fn test_display_status_is_pure() {
        let item = Item::new("k", ItemStatus::SideAOnly);
        assert_eq!(
            compute_display_status(&item, &HiddenSet::new()),
            DisplayStatus::Authoritative(ItemStatus::SideAOnly)
        );
        assert_eq!(compute_display_status(&item, &set(&["k"])), DisplayStatus::Deleted);
    }

    #[test]
    fn test_reconcile_prunes_only_server_deleted() {
        let items = vec![
            Item::new("gone", ItemStatus::ServerDeleted),
            Item::new("still", ItemStatus::BothSides),
        ];
        let hidden = set(&["gone", "still", "absent"]);

        let next = reconcile(&items, &hidden);
        assert_eq!(next, set(&["still", "absent"]));
        assert_eq!(hidden.len(), 3);
        assert_eq!(reconcile(&items, &next), next);
    }

    #[test]
    fn test_hide_then_reconcile() {
        let overlay = overlay(&[]);
        assert!(overlay.mark_hidden("k").expect("hide"));
        assert!(!overlay.mark_hidden("k").expect("hide"));

        let rev = overlay.begin_refresh().expect("rev");
        let rows = overlay
            .apply_items(rev, &[Item::new("k", ItemStatus::BothSides)])
            .expect("apply");
        assert_eq!(rows[0].status, DisplayStatus::Deleted);
        assert!(overlay.is_hidden("k"));

        let rev = overlay.begin_refresh().expect("rev");
        let rows = overlay
            .apply_items(rev, &[Item::new("k", ItemStatus::ServerDeleted)])
            .expect("apply");
        assert_eq!(
            rows[0].status,
            DisplayStatus::Authoritative(ItemStatus::ServerDeleted)
        );
        assert!(!overlay.is_hidden("k"));
    }

    #[test]
    fn test_mark_hidden_wins_over_inflight_refresh() {
        let overlay = overlay(&["k"]);
        let rev = overlay.begin_refresh().expect("rev");

        // Hidden again while the list that still says "deleted" was in flight
        overlay.unhide("k").expect("unhide");
        overlay.mark_hidden("k").expect("hide");

        overlay
            .apply_items(rev, &[Item::new("k", ItemStatus::ServerDeleted)])
            .expect("apply");
        assert!(overlay.is_hidden("k"));

        let rev = overlay.begin_refresh().expect("rev");
        overlay
            .apply_items(rev, &[Item::new("k", ItemStatus::ServerDeleted)])
            .expect("apply");
        assert!(!overlay.is_hidden("k"));
    }

    #[test]
    fn test_rejected_delete_keeps_hidden() {
        let overlay = overlay(&[]);
        overlay.mark_hidden("k").expect("hide");
        overlay.delete_rejected("k");
        assert!(overlay.is_hidden("k"));
    }

    #[test]
    fn test_prune_keeps_insertion_order() {
        let overlay = overlay(&["a", "b", "c"]);
        let rev = overlay.begin_refresh().expect("rev");
        overlay.mark_hidden("d").expect("hide");
        overlay
            .apply_items(rev, &[Item::new("b", ItemStatus::ServerDeleted)])
            .expect("apply");

        let hidden = overlay.hidden().expect("hidden");
        assert_eq!(hidden.iter().collect::<Vec<_>>(), vec!["a", "c", "d"]);
    }

    #[test]
    fn test_changes_are_persisted() {
        let store = std::sync::Arc::new(MemoryHiddenStore::default());

        struct Shared(std::sync::Arc<MemoryHiddenStore>);
        impl HiddenStore for Shared {
            fn load(&self) -> HiddenSet {
                self.0.load()
            }
            fn save(&self, set: &HiddenSet) -> MonitorResult<()> {
                self.0.save(set)
            }
        }

        let overlay = OverlayReconciler::new(Box::new(Shared(store.clone())));
        overlay.mark_hidden("x").expect("hide");
        assert!(store.load().contains("x"));
        overlay.unhide("x").expect("unhide");
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(DisplayStatus::Deleted.to_string(), "Status: Deleted");
        assert_eq!(
            DisplayStatus::Authoritative(ItemStatus::BothSides).to_string(),
            "Source: Synced"
        );
    }
}
