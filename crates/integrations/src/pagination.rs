//! Follows provider next-page pointers after the fallback cascade has found
//! a working endpoint variant.

use crate::endpoints::{ResolvedEndpoint, ResourceKind};
use crate::fetcher::EndpointFallbackFetcher;
use crate::payload::{extract_rows, next_page_signal, NextPage};
use campaign_core::CampaignResult;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

#[derive(Debug, Clone)]
pub struct PaginatedRows {
    pub endpoint: &'static str,
    pub rows: Vec<Value>,
    pub pages: usize,
}

#[derive(Clone)]
pub struct PaginatedResourceFetcher {
    fetcher: EndpointFallbackFetcher,
    max_pages: usize,
}

impl PaginatedResourceFetcher {
    pub fn new(fetcher: EndpointFallbackFetcher, max_pages: usize) -> Self {
        Self {
            fetcher,
            max_pages: max_pages.max(1),
        }
    }

    pub fn fetcher(&self) -> &EndpointFallbackFetcher {
        &self.fetcher
    }

    /// All rows across pages. Stops on: no next-page signal, an empty page,
    /// a pointer back to the current URL, a failed follow-up request, or the
    /// page cap.
    pub async fn fetch_all(
        &self,
        resource: ResourceKind,
        endpoints: &[ResolvedEndpoint],
        token: &str,
    ) -> CampaignResult<PaginatedRows> {
        let first = self.fetcher.fetch_rows(resource, endpoints, token).await?;
        let endpoint = first.endpoint;
        let mut rows = first.rows;
        let mut pages = 1;
        let mut current_url = first.url;
        let mut signal = if rows.is_empty() {
            None
        } else {
            next_page_signal(&first.payload)
        };

        while let Some(next) = signal.take() {
            if pages >= self.max_pages {
                warn!(
                    resource = resource.label(),
                    max_pages = self.max_pages,
                    "Page cap reached, stopping pagination"
                );
                break;
            }
            let Some(next_url) = resolve_next_url(&current_url, &next) else {
                break;
            };
            if next_url == current_url {
                debug!(url = %next_url, "Next page points at the current page");
                break;
            }

            let response = match self.fetcher.get(endpoint, &next_url, token).await {
                Ok(r) => r,
                Err(failure) => {
                    warn!(
                        resource = resource.label(),
                        url = %failure.url,
                        status = ?failure.status,
                        message = %failure.message,
                        "Follow-up page failed, keeping rows fetched so far"
                    );
                    break;
                }
            };
            let Ok(payload) = serde_json::from_str::<Value>(&response.body) else {
                warn!(url = %next_url, "Follow-up page is not JSON");
                break;
            };
            let page_rows = extract_rows(&payload);
            if page_rows.is_empty() {
                break;
            }

            metrics::counter!("esp.pages", "resource" => resource.label()).increment(1);
            pages += 1;
            rows.extend(page_rows);
            signal = next_page_signal(&payload);
            current_url = next_url;
        }

        debug!(
            resource = resource.label(),
            endpoint = endpoint,
            pages = pages,
            rows = rows.len(),
            "Pagination finished"
        );
        Ok(PaginatedRows {
            endpoint,
            rows,
            pages,
        })
    }
}

/// URL for the next page, relative to the page just fetched.
pub fn resolve_next_url(current: &str, next: &NextPage) -> Option<String> {
    let current = Url::parse(current).ok()?;
    match next {
        NextPage::Url(u) => current.join(u).ok().map(String::from),
        NextPage::Param { key, value } => Some(with_query_param(current, key, value)),
    }
}

fn with_query_param(mut url: Url, key: &str, value: &str) -> String {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);
    url.into()
}
