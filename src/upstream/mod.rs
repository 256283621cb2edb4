//! Upstream provider client.
//!
//! Issues the generation call and exposes the response body as a
//! [`RecordStream`]. Dropping the returned stream aborts the underlying
//! connection, which is how sessions release upstream resources early.

use futures_util::StreamExt;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::params::GenerationRequest;
use crate::streaming::{record_stream, RecordStream};

/// HTTP client for the upstream generation endpoint.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: SecretString,
}

impl UpstreamClient {
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| RelayError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: config.generate_endpoint.clone(),
            api_key: config.api_key.clone(),
        })
    }

    /// Open a generation stream for a fully resolved request.
    ///
    /// Failure to establish the call, including a non-success status, is an
    /// `UpstreamConnect` error; the status line and body are kept for
    /// operator logs, never for clients.
    pub async fn open_stream(&self, request: &GenerationRequest) -> Result<RecordStream> {
        debug!(endpoint = %self.endpoint, ?request, "sending upstream generation request");

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| RelayError::UpstreamConnect(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UpstreamConnect(format!(
                "upstream returned {status}: {body}"
            )));
        }

        let bytes = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| RelayError::UpstreamConnect(format!("lost upstream stream: {e}")))
        });
        Ok(record_stream(bytes))
    }
}
