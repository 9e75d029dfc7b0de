//! Single-flight admission per requester.
//!
//! A requester may have at most one job in flight. A second request while
//! the first is running is rejected immediately, never queued.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use bclip_models::RequesterId;

/// Tracks which requesters currently have a job running.
///
/// Constructed once at process start and shared by cloning.
#[derive(Debug, Clone, Default)]
pub struct JobGuard {
    active: Arc<Mutex<HashSet<RequesterId>>>,
}

impl JobGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically admit `requester` if it has no job in flight.
    pub fn try_admit(&self, requester: &RequesterId) -> bool {
        let admitted = self.lock().insert(requester.clone());
        debug!(requester = %requester, admitted, "Admission check");
        admitted
    }

    /// Forget `requester`. Unconditional; releasing an absent id is a no-op.
    pub fn release(&self, requester: &RequesterId) {
        self.lock().remove(requester);
    }

    /// Admit `requester`, returning a permit that releases on drop.
    pub fn admit(&self, requester: &RequesterId) -> Option<JobPermit> {
        self.try_admit(requester).then(|| JobPermit {
            guard: self.clone(),
            requester: requester.clone(),
        })
    }

    pub fn is_active(&self, requester: &RequesterId) -> bool {
        self.lock().contains(requester)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    // Each critical section is a single set operation; poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, HashSet<RequesterId>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Proof of admission. Dropping it releases the requester.
#[derive(Debug)]
pub struct JobPermit {
    guard: JobGuard,
    requester: RequesterId,
}

impl JobPermit {
    pub fn requester(&self) -> &RequesterId {
        &self.requester
    }
}

impl Drop for JobPermit {
    fn drop(&mut self) {
        self.guard.release(&self.requester);
    }
}
