//! Busy tracking for offer and confirmation work
//!
//! Every offer- or confirmation-affecting operation holds a `BusyGuard` while
//! it runs. The idle-relogin timer only forces a relogin when nothing is in
//! flight. A watchdog (`decay`) clears everything on a fixed period so a guard
//! that is never dropped cannot block relogin forever; guards acquired before a
//! decay belong to an older epoch and are ignored when they drop.

use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct BusyState {
    in_flight: usize,
    epoch: u64,
}

/// Shared in-flight counter
#[derive(Debug, Clone, Default)]
pub struct BusyTracker {
    state: Arc<Mutex<BusyState>>,
}

impl BusyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusyState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Mark an operation as in flight until the returned guard drops
    pub fn acquire(&self, operation: &'static str) -> BusyGuard {
        let mut state = self.lock();
        state.in_flight += 1;
        debug!(operation, in_flight = state.in_flight, "busy");
        BusyGuard {
            tracker: self.clone(),
            epoch: state.epoch,
            operation,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.lock().in_flight > 0
    }

    pub fn in_flight(&self) -> usize {
        self.lock().in_flight
    }

    /// Watchdog clear; returns true if anything was still marked in flight
    pub fn decay(&self) -> bool {
        let mut state = self.lock();
        if state.in_flight == 0 {
            return false;
        }
        warn!(in_flight = state.in_flight, "Busy watchdog clearing stale operations");
        state.in_flight = 0;
        state.epoch += 1;
        true
    }

    fn release(&self, epoch: u64, operation: &'static str) {
        let mut state = self.lock();
        if state.epoch != epoch {
            debug!(operation, "guard from cleared epoch released");
            return;
        }
        state.in_flight = state.in_flight.saturating_sub(1);
        debug!(operation, in_flight = state.in_flight, "released");
    }
}

/// In-flight marker; releases on drop
#[must_use = "the operation is only marked busy while the guard is alive"]
#[derive(Debug)]
pub struct BusyGuard {
    tracker: BusyTracker,
    epoch: u64,
    operation: &'static str,
}

impl BusyGuard {
    pub fn operation(&self) -> &'static str {
        self.operation
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.tracker.release(self.epoch, self.operation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_lifecycle() {
        let busy = BusyTracker::new();
        assert!(!busy.is_busy());

        let a = busy.acquire("send_trade_offer");
        let b = busy.acquire("get_inventory");
        assert!(busy.is_busy());
        assert_eq!(busy.in_flight(), 2);

        drop(a);
        assert!(busy.is_busy());
        drop(b);
        assert!(!busy.is_busy());
    }

    #[test]
    fn test_decay_clears_and_ignores_old_guards() {
        let busy = BusyTracker::new();
        let stale = busy.acquire("send_trade_offer");
        assert!(busy.decay());
        assert!(!busy.is_busy());

        let fresh = busy.acquire("get_trade_offer");
        // the stale guard must not release the fresh operation
        drop(stale);
        assert!(busy.is_busy());
        drop(fresh);
        assert!(!busy.is_busy());
    }

    #[test]
    fn test_decay_when_idle() {
        let busy = BusyTracker::new();
        assert!(!busy.decay());
    }
}
