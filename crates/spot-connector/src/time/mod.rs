/*
[INPUT]:  Local clock readings and server time probes
[OUTPUT]: Server time offset estimates for request timestamps
[POS]:    Time layer - clock skew tracking between host and exchange
[UPDATE]: When changing offset storage or synchronization policy
*/

pub mod clock;
pub mod offset;
pub mod sync;

pub use clock::{Clock, SystemClock};
pub use offset::{OffsetSnapshot, SyncGuard, TimeOffsetCache};
pub use sync::{
    ClockSynchronizer, DEFAULT_REFRESH_INTERVAL, DEFAULT_TRUST_THRESHOLD, RetryPolicy,
    ServerTimeProbe, SyncOutcome, TimeSyncConfig,
};
