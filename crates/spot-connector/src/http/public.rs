/*
[INPUT]:  None (connectivity and clock endpoints take no parameters)
[OUTPUT]: Connectivity check and exchange server time
[POS]:    HTTP layer - public endpoints (no auth required)
[UPDATE]: When adding new public endpoints or changing response format
*/

use crate::http::client::SERVER_TIME_ENDPOINT;
use crate::http::{Params, Result, SpotClient};
use crate::types::ServerTime;
use reqwest::Method;

impl SpotClient {
    /// Test connectivity to the REST API
    ///
    /// GET /api/v3/ping
    pub async fn ping(&self) -> Result<()> {
        let _: serde_json::Value = self
            .public_request(Method::GET, "/api/v3/ping", &Params::new())
            .await?;
        Ok(())
    }

    /// Query the exchange server time
    ///
    /// GET /api/v3/time
    pub async fn server_time(&self) -> Result<ServerTime> {
        self.public_request(Method::GET, SERVER_TIME_ENDPOINT, &Params::new())
            .await
    }
}
