use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

/// Process-wide single-flight guard for cache synchronization. The scheduler
/// and manual triggers share one gate; a second caller is turned away instead
/// of queueing behind the first.
#[derive(Clone, Default)]
pub struct SyncGate {
    inner: Arc<Mutex<()>>,
}

/// Held for the duration of one run; dropping it releases the gate.
pub struct SyncPermit {
    _guard: OwnedMutexGuard<()>,
}

impl SyncGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self) -> Option<SyncPermit> {
        self.inner
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| SyncPermit { _guard: guard })
    }

    pub fn is_running(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}
