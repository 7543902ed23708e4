//! Sequential fallback across endpoint variants.
//!
//! Candidates are tried strictly in order, never raced. A non-2xx response or
//! a transport failure is recorded and the next candidate is tried; only when
//! every candidate has failed does an error reach the caller.

use crate::endpoints::{ResolvedEndpoint, ResourceKind};
use crate::payload::{error_message, extract_rows};
use crate::transport::{EspTransport, HttpResponse};
use campaign_core::error::REAUTH_HINT;
use campaign_core::{CampaignError, CampaignResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Upstream message that comes with a 401/403 but does not mean the token
/// lacks a scope; the route simply is not available on this API surface.
const IAM_FALSE_POSITIVE: &str = "not yet supported by the iam service";

/// One failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointFailure {
    pub endpoint: &'static str,
    pub url: String,
    /// `None` when no HTTP response was received.
    pub status: Option<u16>,
    pub message: String,
}

impl EndpointFailure {
    pub fn is_authorization(&self) -> bool {
        matches!(self.status, Some(401) | Some(403))
            && !self.message.to_lowercase().contains(IAM_FALSE_POSITIVE)
    }

    pub fn summary(&self) -> String {
        match self.status {
            Some(code) if self.message.is_empty() => format!("HTTP {code}"),
            Some(code) => format!("HTTP {code}: {}", self.message),
            None => format!("no response: {}", self.message),
        }
    }
}

/// Failures collected over one cascade, with authorization rejections kept
/// apart from everything else.
#[derive(Debug, Clone)]
pub struct FailureLog {
    resource: ResourceKind,
    failures: Vec<EndpointFailure>,
    auth_failures: Vec<EndpointFailure>,
}

impl FailureLog {
    pub fn new(resource: ResourceKind) -> Self {
        Self {
            resource,
            failures: Vec::new(),
            auth_failures: Vec::new(),
        }
    }

    pub fn record(&mut self, failure: EndpointFailure) {
        debug!(
            resource = self.resource.label(),
            endpoint = failure.endpoint,
            url = %failure.url,
            status = ?failure.status,
            message = %failure.message,
            "Endpoint variant failed"
        );
        metrics::counter!("esp.endpoint_failures", "resource" => self.resource.label())
            .increment(1);
        if failure.is_authorization() {
            self.auth_failures.push(failure.clone());
        }
        self.failures.push(failure);
    }

    pub fn attempts(&self) -> usize {
        self.failures.len()
    }

    /// The exhausted-candidates error for this cascade.
    pub fn into_error(self) -> CampaignError {
        let resource = self.resource.label().to_string();
        let attempts = self.failures.len();
        warn!(
            resource = %resource,
            attempts = attempts,
            auth_failures = self.auth_failures.len(),
            "All endpoint variants failed"
        );
        if let Some(last_auth) = self.auth_failures.last() {
            return CampaignError::MissingScope {
                resource,
                attempts,
                last: last_auth.summary(),
                hint: REAUTH_HINT.to_string(),
            };
        }
        let last = self
            .failures
            .last()
            .map(EndpointFailure::summary)
            .unwrap_or_else(|| "no endpoint variants were applicable".to_string());
        CampaignError::EndpointsExhausted {
            resource,
            attempts,
            last,
            hint: REAUTH_HINT.to_string(),
        }
    }
}

/// A successful list response.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub endpoint: &'static str,
    pub url: String,
    pub payload: Value,
    pub rows: Vec<Value>,
}

#[derive(Clone)]
pub struct EndpointFallbackFetcher {
    transport: Arc<dyn EspTransport>,
}

impl EndpointFallbackFetcher {
    pub fn new(transport: Arc<dyn EspTransport>) -> Self {
        Self { transport }
    }

    /// One attempt: a 2xx response or the failure describing why not.
    pub async fn attempt(
        &self,
        endpoint: &ResolvedEndpoint,
        token: &str,
    ) -> Result<HttpResponse, EndpointFailure> {
        self.get(endpoint.name, &endpoint.url, token).await
    }

    pub(crate) async fn get(
        &self,
        name: &'static str,
        url: &str,
        token: &str,
    ) -> Result<HttpResponse, EndpointFailure> {
        metrics::counter!("esp.requests").increment(1);
        match self.transport.get(url, token).await {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(EndpointFailure {
                endpoint: name,
                url: url.to_string(),
                status: Some(response.status),
                message: error_message(&response.body),
            }),
            Err(e) => Err(EndpointFailure {
                endpoint: name,
                url: url.to_string(),
                status: None,
                message: e.to_string(),
            }),
        }
    }

    /// First candidate whose response holds at least one row. A 2xx with no
    /// rows does not stop the cascade, but is returned (empty) if nothing
    /// better turns up.
    pub async fn fetch_rows(
        &self,
        resource: ResourceKind,
        endpoints: &[ResolvedEndpoint],
        token: &str,
    ) -> CampaignResult<FetchedPage> {
        let mut log = FailureLog::new(resource);
        let mut first_empty: Option<FetchedPage> = None;

        for endpoint in endpoints {
            let response = match self.attempt(endpoint, token).await {
                Ok(r) => r,
                Err(failure) => {
                    log.record(failure);
                    continue;
                }
            };
            let payload = match serde_json::from_str::<Value>(&response.body) {
                Ok(v) => v,
                Err(_) => {
                    log.record(EndpointFailure {
                        endpoint: endpoint.name,
                        url: endpoint.url.clone(),
                        status: Some(response.status),
                        message: "response body is not JSON".to_string(),
                    });
                    continue;
                }
            };
            let rows = extract_rows(&payload);
            let page = FetchedPage {
                endpoint: endpoint.name,
                url: endpoint.url.clone(),
                payload,
                rows,
            };
            if !page.rows.is_empty() {
                debug!(
                    resource = resource.label(),
                    endpoint = endpoint.name,
                    rows = page.rows.len(),
                    "Endpoint variant returned rows"
                );
                return Ok(page);
            }
            first_empty.get_or_insert(page);
        }

        match first_empty {
            Some(page) => Ok(page),
            None => Err(log.into_error()),
        }
    }

    /// First candidate answering 2xx with a JSON body, for single-object
    /// resources.
    pub async fn fetch_json(
        &self,
        resource: ResourceKind,
        endpoints: &[ResolvedEndpoint],
        token: &str,
    ) -> CampaignResult<(&'static str, Value)> {
        let mut log = FailureLog::new(resource);
        for endpoint in endpoints {
            match self.attempt(endpoint, token).await {
                Ok(response) => match serde_json::from_str::<Value>(&response.body) {
                    Ok(payload) => return Ok((endpoint.name, payload)),
                    Err(_) => log.record(EndpointFailure {
                        endpoint: endpoint.name,
                        url: endpoint.url.clone(),
                        status: Some(response.status),
                        message: "response body is not JSON".to_string(),
                    }),
                },
                Err(failure) => log.record(failure),
            }
        }
        Err(log.into_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;

    fn endpoints(n: usize) -> Vec<ResolvedEndpoint> {
        (0..n)
            .map(|i| ResolvedEndpoint {
                name: "variant",
                url: format!("https://esp.test/v{i}"),
            })
            .collect()
    }

    #[test]
    fn test_iam_message_is_not_authorization() {
        let failure = EndpointFailure {
            endpoint: "x",
            url: "u".into(),
            status: Some(401),
            message: "This route is not yet supported by the IAM Service".into(),
        };
        assert!(!failure.is_authorization());
        let real = EndpointFailure {
            message: "The token is not authorized for this scope.".into(),
            ..failure
        };
        assert!(real.is_authorization());
    }

    #[tokio::test]
    async fn test_first_variant_with_rows_wins() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://esp.test/v0", 404, r#"{"message":"Not Found"}"#);
        transport.respond("https://esp.test/v1", 200, r#"{"campaigns": []}"#);
        transport.respond("https://esp.test/v2", 200, r#"{"campaigns": [{"id": "a"}]}"#);
        transport.respond("https://esp.test/v3", 200, r#"{"campaigns": [{"id": "b"}]}"#);

        let fetcher = EndpointFallbackFetcher::new(transport.clone());
        let page = fetcher
            .fetch_rows(ResourceKind::CampaignList, &endpoints(4), "tok")
            .await
            .unwrap();
        assert_eq!(page.url, "https://esp.test/v2");
        assert_eq!(page.rows.len(), 1);
        assert_eq!(transport.call_count(), 3);
    }

    #[tokio::test]
    async fn test_empty_success_is_kept_as_fallback() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://esp.test/v0", 200, r#"{"campaigns": []}"#);
        transport.respond("https://esp.test/v1", 500, "oops");

        let fetcher = EndpointFallbackFetcher::new(transport);
        let page = fetcher
            .fetch_rows(ResourceKind::CampaignList, &endpoints(2), "tok")
            .await
            .unwrap();
        assert_eq!(page.url, "https://esp.test/v0");
        assert!(page.rows.is_empty());
    }

    #[tokio::test]
    async fn test_auth_failures_classified_as_missing_scope() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://esp.test/v0", 403, r#"{"message":"Forbidden"}"#);
        transport.respond("https://esp.test/v1", 404, r#"{"message":"Not Found"}"#);

        let fetcher = EndpointFallbackFetcher::new(transport);
        let err = fetcher
            .fetch_rows(ResourceKind::CampaignList, &endpoints(2), "tok")
            .await
            .unwrap_err();
        assert!(err.is_missing_scope());
        assert!(err.to_string().contains("HTTP 403: Forbidden"));
    }

    #[tokio::test]
    async fn test_generic_exhaustion_reports_last_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://esp.test/v0", 401, r#"{"message":"Route not yet supported by the IAM service"}"#);
        transport.respond("https://esp.test/v1", 502, "Bad Gateway");
        transport.fail("https://esp.test/v2", "connection reset");

        let fetcher = EndpointFallbackFetcher::new(transport);
        let err = fetcher
            .fetch_rows(ResourceKind::WorkflowList, &endpoints(3), "tok")
            .await
            .unwrap_err();
        match err {
            CampaignError::EndpointsExhausted { attempts, last, .. } => {
                assert_eq!(attempts, 3);
                assert!(last.starts_with("no response"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_json_success_is_a_shape_failure() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond("https://esp.test/v0", 200, "<html>login</html>");

        let fetcher = EndpointFallbackFetcher::new(transport);
        let err = fetcher
            .fetch_rows(ResourceKind::CampaignList, &endpoints(1), "tok")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not JSON"));
    }
}
