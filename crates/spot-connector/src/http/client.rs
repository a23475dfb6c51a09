/*
[INPUT]:  HTTP configuration (base URL, timeouts, credentials, time sync settings)
[OUTPUT]: Public and signed request descriptors, decoded API responses
[POS]:    HTTP layer - core client implementation and session state
[UPDATE]: When adding connection options or changing request construction
*/

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::http::query::{Params, build_query_string, remove_empty_value};
use crate::http::{ConnectorError, RequestSigner, Result};
use crate::time::{
    Clock, ClockSynchronizer, OffsetSnapshot, ServerTimeProbe, SyncOutcome, SystemClock,
    TimeSyncConfig,
};
use crate::types::ServerTime;

/// Base URL for the exchange REST API
pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";
/// Header carrying the API key on every request
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";
/// Unauthenticated endpoint used to probe the server clock
pub const SERVER_TIME_ENDPOINT: &str = "/api/v3/time";

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    pub time_sync: TimeSyncConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: format!("spot-connector/{}", env!("CARGO_PKG_VERSION")),
            time_sync: TimeSyncConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Toggle correction of request timestamps by the measured server offset
    pub fn with_server_time_offset(mut self, enabled: bool) -> Self {
        self.time_sync.enabled = enabled;
        self
    }

    pub fn with_time_sync(mut self, time_sync: TimeSyncConfig) -> Self {
        self.time_sync = time_sync;
        self
    }

    /// Reject settings the client cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ConnectorError::Config("base_url must not be empty".to_string()));
        }
        if self.timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ConnectorError::Config("timeouts must be positive".to_string()));
        }
        if self.time_sync.trust_threshold.is_zero() {
            return Err(ConnectorError::Config(
                "time_sync.trust_threshold must be positive".to_string(),
            ));
        }
        if self.time_sync.retry.max_attempts == 0 {
            return Err(ConnectorError::Config(
                "time_sync.retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Credentials for authenticated requests
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Fully built request, ready to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub api_key: Option<String>,
}

impl PreparedRequest {
    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }
}

/// Builds unauthenticated requests and performs network calls
#[derive(Debug)]
struct HttpTransport {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpTransport {
    fn new(config: &ClientConfig, api_key: Option<String>) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
            timeout: config.timeout,
        })
    }

    /// Build full URL for a path that may already carry a query string
    fn url(&self, path_and_query: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path_and_query))?)
    }

    fn prepare_public(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<PreparedRequest> {
        let query = build_query_string(&remove_empty_value(params));
        let url = if query.is_empty() {
            self.url(path)?
        } else {
            self.url(&format!("{path}?{query}"))?
        };

        Ok(PreparedRequest {
            method,
            url,
            api_key: self.api_key.clone(),
        })
    }

    async fn send_json<T: DeserializeOwned>(&self, request: PreparedRequest) -> Result<T> {
        debug!(method = %request.method, path = request.url.path(), "sending request");

        let mut builder = self.http_client.request(request.method, request.url);
        if let Some(api_key) = &request.api_key {
            builder = builder.header(API_KEY_HEADER, api_key);
        }

        let response = builder.send().await.map_err(|err| {
            if err.is_timeout() {
                ConnectorError::Timeout {
                    duration: self.timeout.as_secs(),
                }
            } else {
                ConnectorError::Http(err)
            }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse().ok())
                .unwrap_or(1);
            return Err(ConnectorError::RateLimit { retry_after });
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(ConnectorError::api_error(status, body));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl ServerTimeProbe for HttpTransport {
    async fn server_time(&self) -> Result<i64> {
        let request = self.prepare_public(Method::GET, SERVER_TIME_ENDPOINT, &Params::new())?;
        let response: ServerTime = self.send_json(request).await?;
        Ok(response.server_time)
    }
}

/// Main HTTP client for the exchange REST API.
///
/// One instance per session. Owns the server time offset state; public calls
/// never depend on it, signed calls read the last committed value.
#[derive(Debug)]
pub struct SpotClient {
    transport: Arc<HttpTransport>,
    credentials: Option<Credentials>,
    signer: Option<RequestSigner>,
    synchronizer: Arc<ClockSynchronizer>,
}

impl SpotClient {
    /// Create a client for public endpoints only
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::build(None, config, Arc::new(SystemClock))
    }

    /// Create a client able to sign requests
    pub fn with_credentials(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        Self::build(Some(credentials), config, Arc::new(SystemClock))
    }

    /// Create a client whose local time comes from `clock`
    pub fn with_clock(
        credentials: Option<Credentials>,
        config: ClientConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::build(credentials, config, clock)
    }

    fn build(
        credentials: Option<Credentials>,
        config: ClientConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let api_key = credentials.as_ref().map(|c| c.api_key.clone());
        let transport = Arc::new(HttpTransport::new(&config, api_key)?);
        let signer = credentials
            .as_ref()
            .map(|c| RequestSigner::new(c.api_secret.clone()));

        let synchronizer = Arc::new(ClockSynchronizer::with_clock(
            config.time_sync,
            transport.clone(),
            clock,
        ));
        synchronizer.trigger();

        Ok(Self {
            transport,
            credentials,
            signer,
            synchronizer,
        })
    }

    /// Get credentials if set
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn base_url(&self) -> &str {
        &self.transport.base_url
    }

    pub fn synchronizer(&self) -> &Arc<ClockSynchronizer> {
        &self.synchronizer
    }

    /// Last committed server time offset
    pub fn time_offset(&self) -> OffsetSnapshot {
        self.synchronizer.snapshot()
    }

    /// Run a server time sync and wait for it to finish.
    ///
    /// A probe already in flight, such as the one started at construction,
    /// is waited for instead of reported as `InProgress`.
    pub async fn sync_time(&self) -> Result<SyncOutcome> {
        self.synchronizer.sync_and_wait().await
    }

    /// Build an unauthenticated request.
    ///
    /// Empty parameters are dropped and `?query` is only appended when something is left.
    pub fn prepare_public(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<PreparedRequest> {
        self.transport.prepare_public(method, path, params)
    }

    /// Build a signed request: `{path}?{query}&timestamp={ts}&signature={hmac}`.
    ///
    /// Fails with [`ConnectorError::UnsyncedClock`] when offset correction is on
    /// and no sync has completed yet. Starts a background refresh but signs with
    /// the offset already committed.
    pub fn prepare_signed(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<PreparedRequest> {
        if self.synchronizer.is_enabled() && !self.synchronizer.is_synced() {
            return Err(ConnectorError::UnsyncedClock);
        }
        let (Some(credentials), Some(signer)) = (&self.credentials, &self.signer) else {
            return Err(ConnectorError::Authentication {
                message: "API key and secret are required for signed requests".to_string(),
            });
        };

        self.synchronizer.trigger();

        let timestamp = self.synchronizer.timestamp_ms();
        let params = remove_empty_value(params).insert("timestamp", timestamp);
        let query = build_query_string(&params);
        let signature = signer.sign(&query);

        Ok(PreparedRequest {
            method,
            url: self
                .transport
                .url(&format!("{path}?{query}&signature={signature}"))?,
            api_key: Some(credentials.api_key.clone()),
        })
    }

    /// Send an unauthenticated request and decode the JSON response
    pub async fn public_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<T> {
        let request = self.prepare_public(method, path, params)?;
        self.transport.send_json(request).await
    }

    /// Send a signed request and decode the JSON response
    pub async fn sign_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &Params,
    ) -> Result<T> {
        let request = self.prepare_signed(method, path, params)?;
        self.transport.send_json(request).await
    }
}
