use super::client::MatomoClient;
use super::params::HitParams;
use crate::buffer::Batch;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

#[derive(Error, Debug)]
pub enum TransmissionError {
    #[error("Hit has no normalized timestamp (raw '{raw}')")]
    MissingTimestamp { raw: String },
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Matomo rejected request to {endpoint}: HTTP {status}")]
    Rejected { endpoint: String, status: u16 },
}

#[derive(Debug, Clone)]
pub struct TransmissionResult {
    pub status_code: u16,
    pub latency: Duration,
    pub hits: usize,
    pub bytes_sent: usize,
}

#[derive(Serialize)]
struct BulkRequest<'a> {
    requests: Vec<String>,
    token_auth: &'a str,
}

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Posts encoded hits to the tracker and error endpoints.
///
/// Every call is attempted once. Failures are returned to the caller and
/// never re-queued.
#[derive(Debug, Clone)]
pub struct HitTransmitter {
    pub client: MatomoClient,
    token_auth: String,
}

impl HitTransmitter {
    pub fn new(client: MatomoClient, token_auth: impl Into<String>) -> Self {
        Self {
            client,
            token_auth: token_auth.into(),
        }
    }

    /// Form-encoded POST of one hit to the tracker endpoint.
    pub async fn send_hit(&self, params: &HitParams) -> Result<TransmissionResult, TransmissionError> {
        let endpoint = self.client.endpoints().tracker.clone();
        self.post_form(endpoint, params).await
    }

    /// Form-encoded POST of one hit to the agent error endpoint.
    pub async fn send_error_hit(
        &self,
        params: &HitParams,
    ) -> Result<TransmissionResult, TransmissionError> {
        let endpoint = self.client.endpoints().agent.clone();
        self.post_form(endpoint, params).await
    }

    /// One bulk tracking request carrying every hit in `batch`.
    pub async fn send_batch(&self, batch: &Batch) -> Result<TransmissionResult, TransmissionError> {
        let body = BulkRequest {
            requests: batch.entries().iter().map(HitParams::as_bulk_request).collect(),
            token_auth: &self.token_auth,
        };
        let payload = serde_json::to_vec(&body)?;
        let bytes_sent = payload.len();

        debug!(batch_id = batch.id(), hits = batch.size(), "sending batch");

        let start = Instant::now();
        let endpoint = self.client.endpoints().tracker.clone();
        let response = self
            .client
            .client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .body(payload)
            .send()
            .await;

        let result = self.finish(endpoint, response, start, batch.size(), bytes_sent)?;
        info!(
            batch_id = batch.id(),
            hits = result.hits,
            bytes = result.bytes_sent,
            latency_ms = result.latency.as_millis() as u64,
            "batch sent"
        );
        Ok(result)
    }

    async fn post_form(
        &self,
        endpoint: Url,
        params: &HitParams,
    ) -> Result<TransmissionResult, TransmissionError> {
        let body = params.encode();
        let bytes_sent = body.len();

        let start = Instant::now();
        let response = self
            .client
            .client
            .post(endpoint.clone())
            .header(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE))
            .body(body)
            .send()
            .await;

        let result = self.finish(endpoint, response, start, 1, bytes_sent)?;
        debug!(
            url = params.get("url").unwrap_or_default(),
            status = result.status_code,
            "hit sent"
        );
        Ok(result)
    }

    fn finish(
        &self,
        endpoint: Url,
        response: Result<reqwest::Response, reqwest::Error>,
        start: Instant,
        hits: usize,
        bytes_sent: usize,
    ) -> Result<TransmissionResult, TransmissionError> {
        let latency = start.elapsed();
        let response = response.inspect_err(|_| self.client.stats.record_failure())?;

        let status = response.status();
        self.client.stats.record_request(status.is_success(), latency);
        if !status.is_success() {
            return Err(TransmissionError::Rejected {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(TransmissionResult {
            status_code: status.as_u16(),
            latency,
            hits,
            bytes_sent,
        })
    }
}
