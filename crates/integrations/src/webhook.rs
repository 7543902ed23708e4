//! Webhook counter overlay: push-delivered engagement counts merged over
//! polled analytics.

use async_trait::async_trait;
use campaign_analytics::finalize;
use campaign_core::types::{AnalyticsRecord, CampaignRecord, WebhookCounterRecord};
use dashmap::DashMap;
use std::collections::HashMap;

const WEBHOOK_SOURCE_SUFFIX: &str = "+webhook";

/// Read side of the webhook ingest pipeline. Keys of the returned map are
/// campaign identifiers (schedule, campaign or record id).
#[async_trait]
pub trait WebhookCounterStore: Send + Sync {
    async fn stats_for_account(
        &self,
        account_id: &str,
    ) -> anyhow::Result<HashMap<String, WebhookCounterRecord>>;
}

/// Process-local store, used by the CLI and in tests.
pub struct InMemoryWebhookCounterStore {
    accounts: DashMap<String, HashMap<String, WebhookCounterRecord>>,
}

impl InMemoryWebhookCounterStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    pub fn upsert(&self, account_id: &str, campaign_key: &str, counters: WebhookCounterRecord) {
        self.accounts
            .entry(account_id.to_string())
            .or_default()
            .insert(campaign_key.to_string(), counters);
    }

    pub fn remove_account(&self, account_id: &str) {
        self.accounts.remove(account_id);
    }
}

impl Default for InMemoryWebhookCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebhookCounterStore for InMemoryWebhookCounterStore {
    async fn stats_for_account(
        &self,
        account_id: &str,
    ) -> anyhow::Result<HashMap<String, WebhookCounterRecord>> {
        Ok(self
            .accounts
            .get(account_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default())
    }
}

fn max_count(polled: Option<u64>, pushed: u64) -> Option<u64> {
    match polled {
        Some(p) => Some(p.max(pushed)),
        None if pushed > 0 => Some(pushed),
        None => None,
    }
}

/// Polled values with webhook counts laid over them. Counts only ever go up;
/// `complained_count` has no polled counterpart and is not carried.
pub fn apply_counters(analytics: &AnalyticsRecord, counters: &WebhookCounterRecord) -> AnalyticsRecord {
    let mut merged = AnalyticsRecord {
        delivered: max_count(analytics.delivered, counters.delivered_count),
        opened: max_count(analytics.opened, counters.opened_count),
        clicked: max_count(analytics.clicked, counters.clicked_count),
        bounced: max_count(analytics.bounced, counters.bounced_count),
        unsubscribed: max_count(analytics.unsubscribed, counters.unsubscribed_count),
        ..analytics.clone()
    };
    if merged != *analytics {
        let base = analytics.source.as_deref().unwrap_or("webhook");
        merged.source = Some(if base.ends_with(WEBHOOK_SOURCE_SUFFIX) || base == "webhook" {
            base.to_string()
        } else {
            format!("{base}{WEBHOOK_SOURCE_SUFFIX}")
        });
    }
    finalize(&merged)
}

/// Counters for a campaign, looked up by schedule id, then campaign id, then
/// record id.
pub fn counters_for<'a>(
    record: &CampaignRecord,
    stats: &'a HashMap<String, WebhookCounterRecord>,
) -> Option<&'a WebhookCounterRecord> {
    record.lookup_ids().into_iter().find_map(|id| stats.get(id))
}

/// Overlays webhook counters onto every record that has some. A
/// `first_delivered_at` earlier than the polled send time replaces it.
pub fn merge_webhook_stats(
    records: Vec<CampaignRecord>,
    stats: &HashMap<String, WebhookCounterRecord>,
) -> Vec<CampaignRecord> {
    if stats.is_empty() {
        return records;
    }
    records
        .into_iter()
        .map(|mut record| {
            if let Some(counters) = counters_for(&record, stats) {
                record.analytics = apply_counters(&record.analytics, counters);
                record.sent_at = match (record.sent_at, counters.first_delivered_at) {
                    (Some(polled), Some(pushed)) => Some(polled.min(pushed)),
                    (polled, pushed) => polled.or(pushed),
                };
            }
            record
        })
        .collect()
}
