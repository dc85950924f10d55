use super::stats::ClientStats;
use reqwest::{Client, ClientBuilder};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::info;
use url::Url;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Matomo endpoints derived from one base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    /// `<base>matomo.php`, single hits and bulk batches
    pub tracker: Url,
    /// `<base>index.php?module=API&method=Agent.postLogData`, error hits
    pub agent: Url,
    /// `<base>index.php`, reporting API
    pub api: Url,
}

impl Endpoints {
    pub const TRACKER_PATH: &'static str = "matomo.php";
    pub const AGENT_PATH: &'static str = "index.php?module=API&method=Agent.postLogData";
    pub const API_PATH: &'static str = "index.php";

    /// Derive all endpoints from `base`, adding a trailing `/` when missing.
    pub fn from_base(base: &str) -> Result<Self, ClientError> {
        let base = normalize_base_url(base);
        let base: Url = base
            .parse()
            .map_err(|e| ClientError::InvalidConfiguration(format!("Invalid Matomo URL: {e}")))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(ClientError::InvalidConfiguration(format!(
                "Unsupported Matomo URL scheme: {}",
                base.scheme()
            )));
        }

        let join = |path: &str| {
            base.join(path).map_err(|e| {
                ClientError::InvalidConfiguration(format!("Invalid Matomo endpoint {path}: {e}"))
            })
        };

        Ok(Self {
            tracker: join(Self::TRACKER_PATH)?,
            agent: join(Self::AGENT_PATH)?,
            api: join(Self::API_PATH)?,
        })
    }
}

/// `base` with exactly one trailing `/` appended when absent.
pub fn normalize_base_url(base: &str) -> String {
    let base = base.trim();
    if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoints: Endpoints,
    pub timeout: Duration,
    pub connection_timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            user_agent: format!("matomo-log-agent/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Deserialize)]
struct VersionResponse {
    value: String,
}

/// Shared reqwest client bound to one Matomo instance.
#[derive(Debug, Clone)]
pub struct MatomoClient {
    pub client: Client,
    pub config: ClientConfig,
    pub stats: Arc<ClientStats>,
}

impl MatomoClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .connect_timeout(config.connection_timeout)
            .user_agent(&config.user_agent)
            .gzip(true)
            .build()
            .map_err(|e| {
                ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            config,
            stats: Arc::new(ClientStats::new()),
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.config.endpoints
    }

    /// Check `token_auth` against the reporting API and return the Matomo version.
    ///
    /// Anything other than a 200 carrying a JSON `value` field is an error.
    pub async fn validate_token(&self, token_auth: &str) -> Result<String, ClientError> {
        let start = Instant::now();
        let response = self
            .client
            .post(self.config.endpoints.api.clone())
            .form(&[
                ("module", "API"),
                ("method", "API.getMatomoVersion"),
                ("format", "JSON"),
                ("token_auth", token_auth),
            ])
            .send()
            .await?;

        let status = response.status();
        self.stats
            .record_request(status == reqwest::StatusCode::OK, start.elapsed());

        if status != reqwest::StatusCode::OK {
            return Err(ClientError::HttpError {
                status: status.as_u16(),
                message: format!("Token validation rejected: {status}"),
            });
        }

        let body = response.text().await?;
        let version: VersionResponse = serde_json::from_str(&body).map_err(|e| {
            ClientError::InvalidResponse(format!("Unexpected version response: {e}"))
        })?;

        info!(version = %version.value, "Auth token ok");
        Ok(version.value)
    }
}
