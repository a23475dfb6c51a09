/*
[INPUT]:  Completed clock probe measurements
[OUTPUT]: Immutable offset snapshots and an exclusive sync guard
[POS]:    Time layer - owned storage for server time offset state
[UPDATE]: When changing how offset state is stored or guarded
*/

use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use tokio::sync::Notify;

/// Point-in-time copy of the offset state handed to signing logic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OffsetSnapshot {
    /// Estimated `server_time - local_time` in milliseconds
    pub offset_ms: i64,
    /// Local time (epoch ms) of the last trusted measurement, `None` if never synced
    pub last_sync_ms: Option<i64>,
}

impl OffsetSnapshot {
    pub fn is_synced(&self) -> bool {
        self.last_sync_ms.is_some()
    }
}

/// Server time offset state for one client session.
///
/// Writes only happen through [`SyncGuard::commit`], and only one guard can
/// exist at a time.
#[derive(Debug, Default)]
pub struct TimeOffsetCache {
    snapshot: RwLock<OffsetSnapshot>,
    in_progress: AtomicBool,
    released: Notify,
}

impl TimeOffsetCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current offset state
    pub fn snapshot(&self) -> OffsetSnapshot {
        *self
            .snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a probe currently holds the sync guard
    pub fn is_sync_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    /// Claim the right to run a probe. Returns `None` while another probe is in flight.
    pub fn try_begin_sync(&self) -> Option<SyncGuard<'_>> {
        self.in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncGuard { cache: self })
    }

    /// Wait until no probe holds the sync guard
    pub async fn wait_for_release(&self) {
        let mut released = pin!(self.released.notified());
        // registered before the check so a release in between is not missed
        released.as_mut().enable();
        if !self.is_sync_in_progress() {
            return;
        }
        released.await;
    }
}

/// Exclusive permission to update the offset. Dropping it clears the in-progress flag.
#[derive(Debug)]
pub struct SyncGuard<'a> {
    cache: &'a TimeOffsetCache,
}

impl SyncGuard<'_> {
    /// Store a trusted measurement taken at local time `measured_at_ms`
    pub fn commit(&self, offset_ms: i64, measured_at_ms: i64) {
        let mut guard = self
            .cache
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = OffsetSnapshot {
            offset_ms,
            last_sync_ms: Some(measured_at_ms),
        };
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        self.cache.in_progress.store(false, Ordering::Release);
        self.cache.released.notify_waiters();
    }
}
