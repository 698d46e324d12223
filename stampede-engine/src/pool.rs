//! Elastic per-phase virtual user pools

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// How a slot was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// An idle slot was free
    Reused,
    /// The pool grew by one slot
    Grown,
    /// A slot was returned within the admission window
    Waited,
}

/// A held slot; dropping it returns the slot to its pool
#[derive(Debug)]
pub struct Slot {
    _permit: OwnedSemaphorePermit,
    pub admission: Admission,
}

/// Bounded pool of execution slots owned by one phase
///
/// Free slots are semaphore permits. Growing the pool adds a permit;
/// `allocated` never exceeds `max`.
#[derive(Debug)]
pub struct PhasePool {
    free: Arc<Semaphore>,
    allocated: AtomicU32,
    max: u32,
}

impl PhasePool {
    /// Pool with `pre_allocated` idle slots
    pub fn new(pre_allocated: u32, max: u32) -> Self {
        let pre_allocated = pre_allocated.min(max);
        Self {
            free: Arc::new(Semaphore::new(pre_allocated as usize)),
            allocated: AtomicU32::new(pre_allocated),
            max,
        }
    }

    pub fn allocated(&self) -> u32 {
        self.allocated.load(Ordering::Acquire)
    }

    pub fn max(&self) -> u32 {
        self.max
    }

    /// Slots currently idle
    pub fn idle(&self) -> usize {
        self.free.available_permits()
    }

    /// Take a free slot, grow by one, or wait up to `window` for a return
    ///
    /// `None` means the work item must be dropped.
    pub async fn acquire(&self, window: Duration) -> Option<Slot> {
        if let Ok(permit) = Arc::clone(&self.free).try_acquire_owned() {
            return Some(Slot {
                _permit: permit,
                admission: Admission::Reused,
            });
        }

        if self.try_grow() {
            // The new permit may be taken by a concurrent waiter; fall through
            if let Ok(permit) = Arc::clone(&self.free).try_acquire_owned() {
                return Some(Slot {
                    _permit: permit,
                    admission: Admission::Grown,
                });
            }
        }

        match tokio::time::timeout(window, Arc::clone(&self.free).acquire_owned()).await {
            Ok(Ok(permit)) => Some(Slot {
                _permit: permit,
                admission: Admission::Waited,
            }),
            // Timed out, or the semaphore was closed
            _ => None,
        }
    }

    fn try_grow(&self) -> bool {
        let grown = self
            .allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < self.max).then_some(current + 1)
            })
            .is_ok();
        if grown {
            self.free.add_permits(1);
        }
        grown
    }

    /// Refuse further acquisitions; pending waiters give up
    pub fn close(&self) {
        self.free.close();
    }
}
