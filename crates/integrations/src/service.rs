//! Caller-facing API: campaign lists, single-campaign analytics, workflows
//! and per-contact summaries for one ESP location.

use crate::endpoints::{EndpointCatalog, EndpointContext, ResolvedEndpoint, ResourceKind};
use crate::fanout::BoundedConcurrencyRunner;
use crate::fetcher::{EndpointFallbackFetcher, FailureLog};
use crate::normalize::{campaign_from_row, dedup_campaigns, dedup_workflows, workflow_from_row};
use crate::pagination::PaginatedResourceFetcher;
use crate::transport::{EspTransport, ReqwestTransport};
use crate::webhook::{apply_counters, merge_webhook_stats, WebhookCounterStore};
use campaign_analytics::{finalize, reconcile, AnalyticsExtractor};
use campaign_cache::{CampaignCache, WorkflowCache};
use campaign_core::types::{
    AnalyticsQuery, AnalyticsRecord, CampaignRecord, FetchOptions, WebhookCounterRecord,
    WorkflowRecord,
};
use campaign_core::{AppConfig, CampaignError, CampaignResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Raw contact object returned by the first working contact endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSummary {
    pub contact_id: String,
    pub endpoint: &'static str,
    pub data: Value,
}

pub struct EspAnalyticsService {
    config: AppConfig,
    catalog: EndpointCatalog,
    paginator: PaginatedResourceFetcher,
    extractor: AnalyticsExtractor,
    campaigns: CampaignCache,
    workflows: WorkflowCache,
    webhooks: Option<Arc<dyn WebhookCounterStore>>,
    fanout: BoundedConcurrencyRunner,
}

impl EspAnalyticsService {
    /// Service over the production HTTP transport.
    pub fn new(config: AppConfig) -> CampaignResult<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config.esp)?);
        Ok(Self::with_transport(config, transport))
    }

    pub fn with_transport(config: AppConfig, transport: Arc<dyn EspTransport>) -> Self {
        let fetcher = EndpointFallbackFetcher::new(transport);
        Self {
            catalog: EndpointCatalog::default(),
            paginator: PaginatedResourceFetcher::new(fetcher, config.esp.max_pages),
            extractor: AnalyticsExtractor::new(config.extraction.max_depth),
            campaigns: CampaignCache::new("campaigns", config.cache.ttl_secs),
            workflows: WorkflowCache::new("workflows", config.cache.ttl_secs),
            webhooks: None,
            fanout: BoundedConcurrencyRunner::new(config.fanout.max_concurrent),
            config,
        }
    }

    pub fn with_webhook_store(mut self, store: Arc<dyn WebhookCounterStore>) -> Self {
        self.webhooks = Some(store);
        self
    }

    pub fn with_catalog(mut self, catalog: EndpointCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    fn resolve(&self, kind: ResourceKind, ctx: &EndpointContext) -> Vec<ResolvedEndpoint> {
        self.catalog.resolve(kind, &self.config.esp.base_url, ctx)
    }

    fn location_context(&self, location_id: &str) -> EndpointContext {
        EndpointContext::for_location(location_id, self.config.esp.page_size)
    }

    /// Deduplicated campaign list with webhook counters applied. Served from
    /// cache within the TTL unless `options.force_refresh` is set.
    pub async fn fetch_campaigns(
        &self,
        token: &str,
        location_id: &str,
        options: FetchOptions,
    ) -> CampaignResult<Vec<CampaignRecord>> {
        if let Some(cached) = self.campaigns.get(location_id, options.force_refresh) {
            return Ok(cached);
        }

        let endpoints = self.resolve(ResourceKind::CampaignList, &self.location_context(location_id));
        let paged = self
            .paginator
            .fetch_all(ResourceKind::CampaignList, &endpoints, token)
            .await?;

        let records: Vec<CampaignRecord> = paged
            .rows
            .iter()
            .filter_map(|row| campaign_from_row(row, &self.extractor))
            .collect();
        let fetched = records.len();
        let mut records = dedup_campaigns(records);

        let stats = self.webhook_stats(location_id).await;
        records = merge_webhook_stats(records, &stats);

        info!(
            location_id = %location_id,
            endpoint = paged.endpoint,
            pages = paged.pages,
            rows = paged.rows.len(),
            fetched = fetched,
            campaigns = records.len(),
            "Fetched campaigns"
        );
        self.campaigns.set(location_id, records.clone());
        Ok(records)
    }

    /// Analytics for one campaign. Analytics endpoint variants are tried in
    /// order until one yields a metric; when none does, the campaign list is
    /// searched for a row carrying any of the requested identifiers.
    pub async fn fetch_campaign_analytics(
        &self,
        token: &str,
        location_id: &str,
        query: &AnalyticsQuery,
    ) -> CampaignResult<AnalyticsRecord> {
        let ids = query.identifiers();
        if ids.is_empty() {
            return Err(CampaignError::InvalidRequest(
                "one of scheduleId, campaignId or recordId is required".to_string(),
            ));
        }

        let ctx = EndpointContext {
            schedule_id: query.schedule_id.clone().filter(|s| !s.trim().is_empty()),
            campaign_id: query.campaign_id.clone().filter(|s| !s.trim().is_empty()),
            record_id: query.record_id.clone().filter(|s| !s.trim().is_empty()),
            ..self.location_context(location_id)
        };
        let endpoints = self.resolve(ResourceKind::CampaignAnalytics, &ctx);
        let fetcher = self.paginator.fetcher();

        let mut log = FailureLog::new(ResourceKind::CampaignAnalytics);
        let mut any_success = false;
        let mut found: Option<AnalyticsRecord> = None;

        for endpoint in &endpoints {
            let response = match fetcher.attempt(endpoint, token).await {
                Ok(r) => r,
                Err(failure) => {
                    log.record(failure);
                    continue;
                }
            };
            any_success = true;

            let record = match serde_json::from_str::<Value>(&response.body) {
                Ok(payload) if payload.is_object() || payload.is_array() => {
                    let candidates = self.extractor.extract_candidates(&payload, &ids, endpoint.name);
                    let outcome = reconcile(&candidates);
                    debug!(
                        endpoint = endpoint.name,
                        candidates = candidates.len(),
                        winner = ?outcome.winner,
                        found = outcome.found,
                        "Reconciled analytics candidates"
                    );
                    outcome.found.then_some(outcome.record)
                }
                _ => Some(self.extractor.extract_body(&response.body, endpoint.name))
                    .filter(AnalyticsRecord::has_any_metric),
            };

            if let Some(record) = record {
                found = Some(finalize(&record));
                break;
            }
            debug!(endpoint = endpoint.name, "No metrics in response, trying next variant");
        }

        if found.is_none() {
            found = self.analytics_from_campaign_list(token, location_id, &ids).await;
        }

        let record = match found {
            Some(record) => record,
            None if any_success => {
                info!(
                    location_id = %location_id,
                    ids = ?ids,
                    failed_variants = log.attempts(),
                    "No analytics found for campaign"
                );
                AnalyticsRecord::default()
            }
            None => return Err(log.into_error()),
        };

        let stats = self.webhook_stats(location_id).await;
        let record = match ids.iter().find_map(|id| stats.get(*id)) {
            Some(counters) => apply_counters(&record, counters),
            None => record,
        };
        Ok(record)
    }

    async fn analytics_from_campaign_list(
        &self,
        token: &str,
        location_id: &str,
        ids: &[&str],
    ) -> Option<AnalyticsRecord> {
        match self.fetch_campaigns(token, location_id, FetchOptions::default()).await {
            Ok(campaigns) => {
                let hit = campaigns
                    .into_iter()
                    .filter(|c| c.analytics.has_any_metric())
                    .find(|c| c.matches_any(ids))?;
                debug!(campaign = %hit.id, "Analytics taken from campaign list");
                Some(hit.analytics)
            }
            Err(e) => {
                debug!(error = %e, "Campaign list fallback failed");
                None
            }
        }
    }

    /// Every workflow for the location, following pagination.
    pub async fn fetch_workflows(
        &self,
        token: &str,
        location_id: &str,
        options: FetchOptions,
    ) -> CampaignResult<Vec<WorkflowRecord>> {
        if let Some(cached) = self.workflows.get(location_id, options.force_refresh) {
            return Ok(cached);
        }

        let endpoints = self.resolve(ResourceKind::WorkflowList, &self.location_context(location_id));
        let paged = self
            .paginator
            .fetch_all(ResourceKind::WorkflowList, &endpoints, token)
            .await?;
        let workflows = dedup_workflows(paged.rows.iter().filter_map(workflow_from_row).collect());

        info!(
            location_id = %location_id,
            endpoint = paged.endpoint,
            pages = paged.pages,
            workflows = workflows.len(),
            "Fetched workflows"
        );
        self.workflows.set(location_id, workflows.clone());
        Ok(workflows)
    }

    /// Drops cached campaigns and workflows for one location, or for all.
    pub fn invalidate_cache(&self, location_id: Option<&str>) {
        self.campaigns.invalidate(location_id);
        self.workflows.invalidate(location_id);
    }

    /// One lookup per contact, at most `fanout.max_concurrent` in flight.
    /// Results line up with `contact_ids`.
    pub async fn fetch_contact_summaries(
        &self,
        token: &str,
        location_id: &str,
        contact_ids: &[String],
    ) -> Vec<CampaignResult<ContactSummary>> {
        let fetcher = self.paginator.fetcher();
        self.fanout
            .map(contact_ids.to_vec(), |contact_id| async move {
                let ctx = EndpointContext {
                    contact_id: Some(contact_id.clone()),
                    ..self.location_context(location_id)
                };
                let endpoints = self.resolve(ResourceKind::ContactSummary, &ctx);
                fetcher
                    .fetch_json(ResourceKind::ContactSummary, &endpoints, token)
                    .await
                    .map(|(endpoint, payload)| ContactSummary {
                        contact_id,
                        endpoint,
                        data: unwrap_contact(payload),
                    })
            })
            .await
    }

    /// Counters for the account; a failing store is logged and treated as empty.
    async fn webhook_stats(&self, account_id: &str) -> HashMap<String, WebhookCounterRecord> {
        let Some(store) = &self.webhooks else {
            return HashMap::new();
        };
        match store.stats_for_account(account_id).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!(account_id = %account_id, error = %e, "Webhook counter store failed, skipping merge");
                HashMap::new()
            }
        }
    }
}

/// Contact endpoints answer either with the contact itself or wrapped in
/// `{"contact": {...}}`.
fn unwrap_contact(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.get("contact").is_some_and(Value::is_object) => {
            map.remove("contact").unwrap_or_default()
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedTransport;
    use crate::webhook::InMemoryWebhookCounterStore;
    use serde_json::json;

    const BASE: &str = "https://esp.test";

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.esp.base_url = BASE.to_string();
        config
    }

    fn service(transport: &Arc<ScriptedTransport>) -> EspAnalyticsService {
        EspAnalyticsService::with_transport(config(), transport.clone())
    }

    #[tokio::test]
    async fn test_analytics_requires_an_identifier() {
        let transport = Arc::new(ScriptedTransport::new());
        let err = service(&transport)
            .fetch_campaign_analytics("t", "loc1", &AnalyticsQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CampaignError::InvalidRequest(_)));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_analytics_skips_variants_without_metrics() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(
            &format!("{BASE}/emails/schedule/s1/stats?locationId=loc1"),
            200,
            &json!({"status": "ok"}),
        );
        transport.respond_json(
            &format!("{BASE}/emails/schedule/s1?locationId=loc1"),
            200,
            &json!({"schedule": {"id": "s1", "stats": {"delivered": 80, "clicked": 8}}}),
        );
        let query = AnalyticsQuery {
            schedule_id: Some("s1".to_string()),
            ..Default::default()
        };
        let record = service(&transport)
            .fetch_campaign_analytics("t", "loc1", &query)
            .await
            .unwrap();
        assert_eq!(record.delivered, Some(80));
        assert_eq!(record.clicked, Some(8));
        assert_eq!(record.click_rate, Some(0.1));
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_analytics_text_body() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(
            &format!("{BASE}/emails/schedule/s1/stats?locationId=loc1"),
            200,
            "Delivered: 1,000\nOpened (250)",
        );
        let query = AnalyticsQuery {
            schedule_id: Some("s1".to_string()),
            ..Default::default()
        };
        let record = service(&transport)
            .fetch_campaign_analytics("t", "loc1", &query)
            .await
            .unwrap();
        assert_eq!(record.delivered, Some(1000));
        assert_eq!(record.opened, Some(250));
        assert_eq!(record.open_rate, Some(0.25));
        assert_eq!(record.source.as_deref(), Some("schedule-stats:text"));
    }

    #[tokio::test]
    async fn test_analytics_empty_when_upstream_has_nothing() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_any(200, r#"{"ok": true}"#);
        let query = AnalyticsQuery {
            campaign_id: Some("c9".to_string()),
            ..Default::default()
        };
        let record = service(&transport)
            .fetch_campaign_analytics("t", "loc1", &query)
            .await
            .unwrap();
        assert_eq!(record, AnalyticsRecord::default());
    }

    #[tokio::test]
    async fn test_failing_webhook_store_is_absorbed() {
        struct BrokenStore;

        #[async_trait::async_trait]
        impl WebhookCounterStore for BrokenStore {
            async fn stats_for_account(
                &self,
                _account_id: &str,
            ) -> anyhow::Result<HashMap<String, WebhookCounterRecord>> {
                anyhow::bail!("store offline")
            }
        }

        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(
            &format!("{BASE}/emails/schedule?locationId=loc1&limit=100"),
            200,
            &json!({"schedules": [{"id": "s1", "name": "A", "delivered": 5}]}),
        );
        let svc = service(&transport).with_webhook_store(Arc::new(BrokenStore));
        let campaigns = svc
            .fetch_campaigns("t", "loc1", FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(campaigns.len(), 1);
        assert_eq!(campaigns[0].analytics.delivered, Some(5));
    }

    #[tokio::test]
    async fn test_single_campaign_webhook_overlay() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(
            &format!("{BASE}/emails/campaigns/c1/stats?locationId=loc1"),
            200,
            &json!({"sent": 50, "opened": 10}),
        );
        let store = Arc::new(InMemoryWebhookCounterStore::new());
        store.upsert(
            "loc1",
            "c1",
            WebhookCounterRecord {
                opened_count: 12,
                clicked_count: 5,
                ..Default::default()
            },
        );
        let query = AnalyticsQuery {
            campaign_id: Some("c1".to_string()),
            ..Default::default()
        };
        let record = service(&transport)
            .with_webhook_store(store)
            .fetch_campaign_analytics("t", "loc1", &query)
            .await
            .unwrap();
        assert_eq!(record.opened, Some(12));
        assert_eq!(record.clicked, Some(5));
        assert_eq!(record.click_rate, Some(0.1));
        assert_eq!(record.source.as_deref(), Some("campaign-stats+webhook"));
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(
            &format!("{BASE}/workflows/?locationId=loc1"),
            200,
            &json!({"workflows": [{"id": "w1", "name": "Welcome"}]}),
        );
        let svc = service(&transport);
        svc.fetch_workflows("t", "loc1", FetchOptions::default()).await.unwrap();
        svc.fetch_workflows("t", "loc1", FetchOptions::default()).await.unwrap();
        assert_eq!(transport.call_count(), 1);
        svc.invalidate_cache(Some("loc1"));
        svc.fetch_workflows("t", "loc1", FetchOptions::default()).await.unwrap();
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test]
    async fn test_contact_summaries_keep_input_order() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond_json(
            &format!("{BASE}/contacts/ct1"),
            200,
            &json!({"contact": {"id": "ct1", "email": "a@example.com"}}),
        );
        transport.respond(&format!("{BASE}/contacts/ct2"), 404, "{}");
        transport.respond_json(
            &format!("{BASE}/contacts/ct2?locationId=loc1"),
            200,
            &json!({"id": "ct2"}),
        );
        let ids = vec!["ct1".to_string(), "missing".to_string(), "ct2".to_string()];
        let results = service(&transport)
            .fetch_contact_summaries("t", "loc1", &ids)
            .await;
        assert_eq!(results.len(), 3);
        let first = results[0].as_ref().unwrap();
        assert_eq!(first.data["email"], "a@example.com");
        assert_eq!(first.endpoint, "contact");
        assert!(results[1].as_ref().unwrap_err().is_exhausted());
        assert_eq!(results[2].as_ref().unwrap().endpoint, "contact-with-location");
    }
}
