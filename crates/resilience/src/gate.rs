// crates/resilience/src/gate.rs
//! Delivery gate for cancellable callbacks
//!
//! A `DeliveryGate` sits between a background task and the callbacks it invokes. Callbacks run
//! while the gate's lock is held, so once `close` returns no callback is running and none will
//! start afterwards. Responses that arrive after a close are simply discarded.
//!
//! Callbacks must not close their own gate (the lock is not reentrant).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Open/closed flag shared between an owner and its background task
#[derive(Debug, Clone)]
pub struct DeliveryGate {
    open: Arc<Mutex<bool>>,
}

impl DeliveryGate {
    /// Creates an open gate
    pub fn new() -> Self {
        Self {
            open: Arc::new(Mutex::new(true)),
        }
    }

    // A poisoned flag is still a valid bool, so recover it.
    fn state(&self) -> MutexGuard<'_, bool> {
        self.open.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` if the gate is still open; returns whether it ran
    pub fn deliver<F>(&self, f: F) -> bool
    where
        F: FnOnce(),
    {
        let open = self.state();
        if !*open {
            return false;
        }
        f();
        true
    }

    /// Closes the gate and runs `f`, unless the gate was already closed
    ///
    /// Used for terminal callbacks: of several racing `finish` calls exactly one runs.
    pub fn finish<F>(&self, f: F) -> bool
    where
        F: FnOnce(),
    {
        let mut open = self.state();
        if !*open {
            return false;
        }
        *open = false;
        f();
        true
    }

    /// Closes the gate, waiting for any callback in progress; returns whether it was open
    pub fn close(&self) -> bool {
        let mut open = self.state();
        std::mem::replace(&mut *open, false)
    }

    pub fn is_open(&self) -> bool {
        *self.state()
    }
}

impl Default for DeliveryGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_deliver_while_open() {
        let gate = DeliveryGate::new();
        let mut calls = 0;
        assert!(gate.deliver(|| calls += 1));
        assert!(gate.deliver(|| calls += 1));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_nothing_delivered_after_close() {
        let gate = DeliveryGate::new();
        assert!(gate.close());
        assert!(!gate.close());
        assert!(!gate.deliver(|| panic!("delivered after close")));
        assert!(!gate.finish(|| panic!("finished after close")));
    }

    #[test]
    fn test_finish_runs_once() {
        let gate = DeliveryGate::new();
        let mut calls = 0;
        assert!(gate.finish(|| calls += 1));
        assert!(!gate.finish(|| calls += 1));
        assert_eq!(calls, 1);
        assert!(!gate.is_open());
    }

    #[test]
    fn test_close_waits_for_running_callback() {
        let gate = DeliveryGate::new();
        let done = Arc::new(AtomicUsize::new(0));
        let (started_tx, started_rx) = std::sync::mpsc::channel();

        let worker = {
            let gate = gate.clone();
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                gate.deliver(|| {
                    let _ = started_tx.send(());
                    std::thread::sleep(Duration::from_millis(50));
                    done.store(1, Ordering::SeqCst);
                });
            })
        };

        started_rx.recv().expect("callback started");
        gate.close();
        assert_eq!(done.load(Ordering::SeqCst), 1);
        worker.join().expect("worker joins");
    }
}
