/*
[INPUT]:  HTTP client configuration and API endpoints
[OUTPUT]: HTTP responses and typed API results
[POS]:    HTTP layer - REST API communication
[UPDATE]: When adding new endpoints or changing client behavior
*/

pub mod client;
pub mod error;
pub mod public;
pub mod query;
pub mod signature;

pub use error::{ConnectorError, Result};
pub use reqwest::Method;
pub use query::{Params, build_query_string, remove_empty_value};
pub use signature::RequestSigner;

pub use client::{ClientConfig, Credentials, PreparedRequest, SpotClient};
