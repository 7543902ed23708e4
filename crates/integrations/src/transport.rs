//! HTTP transport to the upstream ESP.
//!
//! The fetchers only need "GET this URL with this token", so the seam is a
//! single async method. [`ReqwestTransport`] is the production
//! implementation; tests use [`crate::test_support::ScriptedTransport`].

use async_trait::async_trait;
use campaign_core::config::EspConfig;
use campaign_core::{CampaignError, CampaignResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// Status and raw body of one upstream response. The body is kept as text
/// because the ESP does not reliably return JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait EspTransport: Send + Sync {
    /// Issue a bearer-authenticated GET. `Err` means no HTTP response was
    /// received at all (timeout, DNS, TLS); any status code is `Ok`.
    async fn get(&self, url: &str, token: &str) -> CampaignResult<HttpResponse>;
}

pub struct ReqwestTransport {
    client: Client,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport").finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    pub fn new(config: &EspConfig) -> CampaignResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_static("version"),
            HeaderValue::from_str(&config.api_version).map_err(|e| {
                CampaignError::Config(format!("Invalid API version header: {e}"))
            })?,
        );

        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(format!("campaign-reconcile/{}", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| CampaignError::Config(format!("Failed to create HTTP client: {e}")))?;

        info!(
            api_version = %config.api_version,
            timeout_ms = config.timeout_ms,
            "Created ESP HTTP transport"
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl EspTransport for ReqwestTransport {
    async fn get(&self, url: &str, token: &str) -> CampaignResult<HttpResponse> {
        debug!(url = %url, "GET");
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| CampaignError::Transport(format!("Request failed: {e}")))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| CampaignError::Transport(format!("Failed to read body: {e}")))?;

        Ok(HttpResponse { status, body })
    }
}
