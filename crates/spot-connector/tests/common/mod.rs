/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for spot-connector tests

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use spot_connector::time::Clock;
use spot_connector::{ClientConfig, Credentials, RequestSigner};
use wiremock::{MockServer, Request};

pub const API_KEY: &str = "vmPUZE6mv9SD5VNHk4HlWFsOr6aKE2zvsw0MuIgwCIPy6utIco14y7Ju91duEh8A";
pub const API_SECRET: &str = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

pub fn test_credentials() -> Credentials {
    Credentials::new(API_KEY, API_SECRET)
}

pub fn config_for(server: &MockServer) -> ClientConfig {
    ClientConfig::default().with_base_url(server.uri())
}

/// Clock frozen at a fixed epoch millisecond value
#[derive(Debug)]
pub struct FrozenClock(AtomicI64);

#[allow(dead_code)]
impl FrozenClock {
    pub fn at(ms: i64) -> Arc<Self> {
        Arc::new(Self(AtomicI64::new(ms)))
    }

    pub fn advance(&self, ms: i64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for FrozenClock {
    fn now_ms(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Requests the mock server received on `path`
#[allow(dead_code)]
pub async fn requests_to(server: &MockServer, path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == path)
        .collect()
}

/// Recompute the signature over everything before `&signature=`
#[allow(dead_code)]
pub fn signature_is_valid(query: &str) -> bool {
    let Some((payload, signature)) = query.rsplit_once("&signature=") else {
        return false;
    };
    RequestSigner::new(API_SECRET).verify(payload, signature)
}
