/*
[INPUT]:  Server time probes, local clock readings, sync configuration
[OUTPUT]: Trusted server time offset committed to the session cache
[POS]:    Time layer - periodic, non-overlapping server clock synchronization
[UPDATE]: When changing refresh, trust threshold, or retry behavior
*/

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::http::{ConnectorError, Result};

use super::{Clock, OffsetSnapshot, SystemClock, TimeOffsetCache};

/// Default minimum time between two successful syncs
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(30_000);
/// Default maximum round trip for a probe to be trusted
pub const DEFAULT_TRUST_THRESHOLD: Duration = Duration::from_millis(1_000);

/// Lightweight unauthenticated request that reports the exchange clock
#[async_trait]
pub trait ServerTimeProbe: Send + Sync {
    /// Server time in epoch milliseconds
    async fn server_time(&self) -> Result<i64>;
}

/// Retry behavior for probes discarded as too slow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Probes issued per sync before giving up, including the first one
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay before the probe following `attempt` (1-based), doubling each time
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// Server time synchronization settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSyncConfig {
    /// Correct request timestamps by the measured server offset
    pub enabled: bool,
    pub refresh_interval: Duration,
    pub trust_threshold: Duration,
    pub retry: RetryPolicy,
}

impl Default for TimeSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            trust_threshold: DEFAULT_TRUST_THRESHOLD,
            retry: RetryPolicy::default(),
        }
    }
}

impl TimeSyncConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }
}

/// Result of a single [`ClockSynchronizer::sync`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Offset correction is turned off
    Disabled,
    /// Another probe is already in flight
    InProgress,
    /// Last sync is younger than the refresh interval
    Fresh,
    /// A trusted probe updated the offset
    Synced { offset_ms: i64, round_trip_ms: i64 },
    /// Every probe was too slow; the offset was left untouched
    Abandoned { attempts: u32 },
}

/// Keeps the session's server time offset up to date
pub struct ClockSynchronizer {
    config: TimeSyncConfig,
    cache: TimeOffsetCache,
    clock: Arc<dyn Clock>,
    probe: Arc<dyn ServerTimeProbe>,
}

impl fmt::Debug for ClockSynchronizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockSynchronizer")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl ClockSynchronizer {
    pub fn new(config: TimeSyncConfig, probe: Arc<dyn ServerTimeProbe>) -> Self {
        Self::with_clock(config, probe, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: TimeSyncConfig,
        probe: Arc<dyn ServerTimeProbe>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            cache: TimeOffsetCache::new(),
            clock,
            probe,
        }
    }

    pub fn config(&self) -> &TimeSyncConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn snapshot(&self) -> OffsetSnapshot {
        self.cache.snapshot()
    }

    pub fn is_synced(&self) -> bool {
        self.cache.snapshot().is_synced()
    }

    pub fn is_sync_in_progress(&self) -> bool {
        self.cache.is_sync_in_progress()
    }

    /// Local time corrected by the last committed offset (zero when disabled)
    pub fn timestamp_ms(&self) -> i64 {
        let now = self.clock.now_ms();
        if self.config.enabled {
            now.saturating_add(self.cache.snapshot().offset_ms)
        } else {
            now
        }
    }

    fn is_fresh(&self, now: i64) -> bool {
        self.cache
            .snapshot()
            .last_sync_ms
            .is_some_and(|last| now.saturating_sub(last) < duration_ms(self.config.refresh_interval))
    }

    /// Measure the server offset unless disabled, already running, or still fresh.
    ///
    /// Slow probes are discarded and retried up to `retry.max_attempts` times.
    /// Transport errors are returned to the caller. The in-progress guard is
    /// released on every path.
    pub async fn sync(&self) -> Result<SyncOutcome> {
        if !self.config.enabled {
            return Ok(SyncOutcome::Disabled);
        }

        let Some(guard) = self.cache.try_begin_sync() else {
            debug!("server time sync already in progress");
            return Ok(SyncOutcome::InProgress);
        };

        if self.is_fresh(self.clock.now_ms()) {
            return Ok(SyncOutcome::Fresh);
        }

        let threshold_ms = duration_ms(self.config.trust_threshold);
        let max_attempts = self.config.retry.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let t0 = self.clock.now_ms();
            debug!(attempt, "probing server time");
            let server_time = self.probe.server_time().await?;
            let t1 = self.clock.now_ms();

            let round_trip_ms = t1.saturating_sub(t0).max(0);
            if round_trip_ms >= threshold_ms {
                warn!(
                    attempt,
                    round_trip_ms, threshold_ms, "server time probe too slow, discarding"
                );
                if attempt < max_attempts {
                    tokio::time::sleep(self.config.retry.backoff(attempt)).await;
                }
                continue;
            }

            let offset_ms = server_time
                .checked_sub(t0)
                .and_then(|offset| offset.checked_sub(round_trip_ms / 2))
                .ok_or_else(|| {
                    ConnectorError::InvalidResponse(format!(
                        "server time {server_time} out of range"
                    ))
                })?;
            guard.commit(offset_ms, t0);
            info!(offset_ms, round_trip_ms, "server time offset updated");
            return Ok(SyncOutcome::Synced {
                offset_ms,
                round_trip_ms,
            });
        }

        warn!(
            attempts = max_attempts,
            "giving up on server time sync, keeping previous offset"
        );
        Ok(SyncOutcome::Abandoned {
            attempts: max_attempts,
        })
    }

    /// Like [`sync`](Self::sync), but waits out a probe started elsewhere.
    ///
    /// When another probe holds the guard, waits for it to finish and checks
    /// again: a committed offset then reports `Fresh`, a failed or abandoned
    /// one is retried by this call.
    pub async fn sync_and_wait(&self) -> Result<SyncOutcome> {
        loop {
            match self.sync().await? {
                SyncOutcome::InProgress => self.cache.wait_for_release().await,
                outcome => return Ok(outcome),
            }
        }
    }

    /// Start a background [`sync`](Self::sync) without waiting for it.
    ///
    /// Does nothing when disabled, when a probe is already running, when the
    /// last sync is still fresh, or outside a tokio runtime.
    pub fn trigger(self: &Arc<Self>) {
        if !self.config.enabled
            || self.cache.is_sync_in_progress()
            || self.is_fresh(self.clock.now_ms())
        {
            return;
        }

        let Ok(handle) = Handle::try_current() else {
            debug!("no tokio runtime, skipping background server time sync");
            return;
        };

        let this = Arc::clone(self);
        handle.spawn(async move {
            if let Err(err) = this.sync().await {
                warn!(
                    error = %err,
                    retryable = err.is_retryable(),
                    "background server time sync failed"
                );
            }
        });
    }
}

fn duration_ms(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}
