/*
[INPUT]:  System wall clock
[OUTPUT]: Local time in epoch milliseconds
[POS]:    Time layer - local clock abstraction used for offset measurement
[UPDATE]: When changing the local time source
*/

use std::fmt::Debug;

use chrono::Utc;

/// Source of local wall-clock time in epoch milliseconds
pub trait Clock: Send + Sync + Debug {
    fn now_ms(&self) -> i64;
}

/// Clock backed by the operating system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}
