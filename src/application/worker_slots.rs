//! In-flight repository task accounting.
//!
//! A slot is an accounting token, not a resource: the orchestrator takes one
//! before a task body starts and the returned [`SlotGuard`] gives it back
//! when the body ends, whether it returned, failed or panicked. Shutdown
//! completes only once the count is back to zero.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("all {max} worker slots are in use")]
pub struct SlotsExhausted {
    pub max: usize,
}

#[derive(Debug)]
pub struct WorkerSlotTracker {
    active: Mutex<usize>,
    max: usize,
}

impl WorkerSlotTracker {
    pub fn new(max: usize) -> Arc<Self> {
        Arc::new(Self {
            active: Mutex::new(0),
            max,
        })
    }

    /// Take a slot. The lock is held only for the increment.
    pub fn acquire(self: &Arc<Self>) -> Result<SlotGuard, SlotsExhausted> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if *active >= self.max {
            return Err(SlotsExhausted { max: self.max });
        }
        *active += 1;
        Ok(SlotGuard {
            tracker: Arc::clone(self),
        })
    }

    pub fn active(&self) -> usize {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn max(&self) -> usize {
        self.max
    }

    fn release(&self) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        debug_assert!(*active > 0, "slot released twice");
        *active = active.saturating_sub(1);
    }

    /// Poll until no slot is held, giving up after `timeout`.
    ///
    /// Returns whether the tracker reached zero.
    pub async fn wait_until_idle(&self, timeout: Duration, poll_interval: Duration) -> bool {
        let wait = async {
            loop {
                let active = self.active();
                if active == 0 {
                    break;
                }
                debug!(active_slots = active, "waiting for in-flight repositories");
                tokio::time::sleep(poll_interval).await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }
}

/// Returns its slot on drop.
#[derive(Debug)]
pub struct SlotGuard {
    tracker: Arc<WorkerSlotTracker>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.tracker.release();
    }
}
