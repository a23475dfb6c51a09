/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public spot connector crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod http;
pub mod time;
pub mod types;

// Re-export commonly used types from http
pub use http::{
    ClientConfig,
    ConnectorError,
    Credentials,
    Method,
    Params,
    PreparedRequest,
    RequestSigner,
    Result,
    SpotClient,
};

// Re-export commonly used types from time
pub use time::{
    ClockSynchronizer,
    OffsetSnapshot,
    RetryPolicy,
    SyncOutcome,
    TimeSyncConfig,
};

// Re-export all types
pub use types::*;
