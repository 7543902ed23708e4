use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Engagement metrics for one sent campaign.
///
/// Every field is optional because the upstream rarely reports all of them.
/// Rates are unit fractions (`0.45`, not `45`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivered: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opened: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicked: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replied: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounced: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unsubscribed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub click_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_rate: Option<f64>,
    /// Which endpoint or extraction path produced the values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl AnalyticsRecord {
    pub fn counts(&self) -> [Option<u64>; 8] {
        [
            self.sent,
            self.delivered,
            self.opened,
            self.clicked,
            self.replied,
            self.bounced,
            self.failed,
            self.unsubscribed,
        ]
    }

    pub fn rates(&self) -> [Option<f64>; 3] {
        [self.open_rate, self.click_rate, self.reply_rate]
    }

    /// Number of metric fields holding a usable value.
    pub fn present_field_count(&self) -> usize {
        let counts = self.counts().iter().filter(|c| c.is_some()).count();
        let rates = self
            .rates()
            .iter()
            .filter(|r| r.is_some_and(f64::is_finite))
            .count();
        counts + rates
    }

    pub fn has_any_metric(&self) -> bool {
        self.present_field_count() > 0
    }

    /// Sum of every present count.
    pub fn count_volume(&self) -> u64 {
        self.counts()
            .iter()
            .flatten()
            .fold(0u64, |acc, c| acc.saturating_add(*c))
    }

    /// `(delivered ?? sent ?? 0) + opened + clicked`
    pub fn priority_signal(&self) -> u64 {
        self.delivered
            .or(self.sent)
            .unwrap_or(0)
            .saturating_add(self.opened.unwrap_or(0))
            .saturating_add(self.clicked.unwrap_or(0))
    }

    /// Returns `self` with every present field of `top` written over it.
    pub fn overlay(&self, top: &AnalyticsRecord) -> AnalyticsRecord {
        AnalyticsRecord {
            sent: top.sent.or(self.sent),
            delivered: top.delivered.or(self.delivered),
            opened: top.opened.or(self.opened),
            clicked: top.clicked.or(self.clicked),
            replied: top.replied.or(self.replied),
            bounced: top.bounced.or(self.bounced),
            failed: top.failed.or(self.failed),
            unsubscribed: top.unsubscribed.or(self.unsubscribed),
            open_rate: top.open_rate.or(self.open_rate),
            click_rate: top.click_rate.or(self.click_rate),
            reply_rate: top.reply_rate.or(self.reply_rate),
            source: top.source.clone().or_else(|| self.source.clone()),
        }
    }
}

/// One sent campaign as reported by the ESP, after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRecord {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bulk_request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub name: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub analytics: AnalyticsRecord,
}

/// Identity tuple used to collapse duplicate campaign rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CampaignIdentity {
    pub primary_id: String,
    pub campaign_id: String,
    pub name: String,
    pub status: String,
    pub timestamp: String,
}

impl CampaignRecord {
    pub fn identity(&self) -> CampaignIdentity {
        CampaignIdentity {
            primary_id: self.schedule_id.clone().unwrap_or_else(|| self.id.clone()),
            campaign_id: self.campaign_id.clone().unwrap_or_default(),
            name: self.name.to_lowercase(),
            status: self.status.to_lowercase(),
            timestamp: self
                .best_timestamp()
                .map(|t| t.to_rfc3339())
                .unwrap_or_default(),
        }
    }

    /// Most specific timestamp available: sent, scheduled, updated, created.
    pub fn best_timestamp(&self) -> Option<DateTime<Utc>> {
        self.sent_at
            .or(self.scheduled_at)
            .or(self.updated_at)
            .or(self.created_at)
    }

    /// Identifiers in webhook lookup order.
    pub fn lookup_ids(&self) -> Vec<&str> {
        [self.schedule_id.as_deref(), self.campaign_id.as_deref(), Some(self.id.as_str())]
            .into_iter()
            .flatten()
            .collect()
    }

    pub fn matches_any(&self, ids: &[&str]) -> bool {
        let own = [
            Some(self.id.as_str()),
            self.campaign_id.as_deref(),
            self.schedule_id.as_deref(),
            self.bulk_request_id.as_deref(),
        ];
        own.iter().flatten().any(|o| ids.contains(o))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRecord {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Push-driven counters for one campaign, maintained by the webhook ingest side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookCounterRecord {
    #[serde(default)]
    pub delivered_count: u64,
    #[serde(default)]
    pub opened_count: u64,
    #[serde(default)]
    pub clicked_count: u64,
    #[serde(default)]
    pub bounced_count: u64,
    #[serde(default)]
    pub complained_count: u64,
    #[serde(default)]
    pub unsubscribed_count: u64,
    #[serde(default)]
    pub first_delivered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_event_at: Option<DateTime<Utc>>,
}

/// Identifiers accepted by the single-campaign analytics lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsQuery {
    #[serde(default)]
    pub schedule_id: Option<String>,
    #[serde(default)]
    pub campaign_id: Option<String>,
    #[serde(default)]
    pub record_id: Option<String>,
}

impl AnalyticsQuery {
    pub fn identifiers(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for id in [&self.schedule_id, &self.campaign_id, &self.record_id]
            .into_iter()
            .flatten()
        {
            let id = id.trim();
            if !id.is_empty() && !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers().is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchOptions {
    #[serde(default)]
    pub force_refresh: bool,
}

impl FetchOptions {
    pub fn refresh() -> Self {
        Self { force_refresh: true }
    }
}
