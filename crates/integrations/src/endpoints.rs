//! Ordered endpoint variants per logical resource.
//!
//! The ESP API is undocumented and differs by account and plan, so every
//! resource is reachable through several URL shapes. The order below is the
//! order they are tried in; add or reorder variants here, not in the fetchers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    CampaignList,
    CampaignAnalytics,
    WorkflowList,
    ContactSummary,
}

impl ResourceKind {
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::CampaignList => "campaign list",
            ResourceKind::CampaignAnalytics => "campaign analytics",
            ResourceKind::WorkflowList => "workflow list",
            ResourceKind::ContactSummary => "contact summary",
        }
    }
}

/// One named URL template. Placeholders: `{locationId}`, `{scheduleId}`,
/// `{campaignId}`, `{recordId}`, `{contactId}`, `{limit}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCandidate {
    pub name: &'static str,
    pub template: &'static str,
}

const fn candidate(name: &'static str, template: &'static str) -> EndpointCandidate {
    EndpointCandidate { name, template }
}

pub const CAMPAIGN_LIST_CANDIDATES: &[EndpointCandidate] = &[
    candidate("schedule", "/emails/schedule?locationId={locationId}&limit={limit}"),
    candidate("schedule-slash", "/emails/schedule/?locationId={locationId}&limit={limit}"),
    candidate("schedule-snake", "/emails/schedule?location_id={locationId}&limit={limit}"),
    candidate("schedule-list", "/emails/schedule/list?locationId={locationId}"),
    candidate("email-campaigns", "/emails/campaigns?locationId={locationId}&limit={limit}"),
    candidate("email-campaigns-slash", "/emails/campaigns/?locationId={locationId}"),
    candidate("email-campaigns-snake", "/emails/campaigns?location_id={locationId}"),
    candidate("bulk-requests", "/emails/bulk-requests?locationId={locationId}"),
    candidate("campaign-stats", "/emails/stats/campaigns?locationId={locationId}"),
    candidate("campaigns-slash", "/campaigns/?locationId={locationId}"),
    candidate("campaigns", "/campaigns?locationId={locationId}&limit={limit}"),
    candidate("campaigns-snake", "/campaigns?location_id={locationId}"),
    candidate("location-campaigns", "/locations/{locationId}/campaigns"),
    candidate("location-email-campaigns", "/locations/{locationId}/emails/campaigns"),
];

pub const CAMPAIGN_ANALYTICS_CANDIDATES: &[EndpointCandidate] = &[
    candidate("schedule-stats", "/emails/schedule/{scheduleId}/stats?locationId={locationId}"),
    candidate("schedule-detail", "/emails/schedule/{scheduleId}?locationId={locationId}"),
    candidate(
        "schedule-statistics",
        "/emails/schedule/{scheduleId}/statistics?locationId={locationId}",
    ),
    candidate("stats-by-schedule", "/emails/stats/{scheduleId}?locationId={locationId}"),
    candidate("campaign-stats", "/emails/campaigns/{campaignId}/stats?locationId={locationId}"),
    candidate("campaign-detail", "/emails/campaigns/{campaignId}?locationId={locationId}"),
    candidate("legacy-campaign-stats", "/campaigns/{campaignId}/stats?locationId={locationId}"),
    candidate("bulk-request", "/emails/bulk-requests/{recordId}?locationId={locationId}"),
    candidate(
        "bulk-request-stats",
        "/emails/bulk-requests/{recordId}/stats?locationId={locationId}",
    ),
    candidate(
        "stats-query-campaign",
        "/emails/stats?locationId={locationId}&campaignId={campaignId}",
    ),
    candidate(
        "stats-query-schedule",
        "/emails/stats?locationId={locationId}&scheduleId={scheduleId}",
    ),
];

pub const WORKFLOW_LIST_CANDIDATES: &[EndpointCandidate] = &[
    candidate("workflows-slash", "/workflows/?locationId={locationId}"),
    candidate("workflows", "/workflows?locationId={locationId}&limit={limit}"),
    candidate("workflows-snake", "/workflows?location_id={locationId}"),
    candidate("location-workflows", "/locations/{locationId}/workflows"),
];

pub const CONTACT_SUMMARY_CANDIDATES: &[EndpointCandidate] = &[
    candidate("contact", "/contacts/{contactId}"),
    candidate("contact-with-location", "/contacts/{contactId}?locationId={locationId}"),
    candidate("location-contact", "/locations/{locationId}/contacts/{contactId}"),
];

/// Values available for placeholder substitution.
#[derive(Debug, Clone, Default)]
pub struct EndpointContext {
    pub location_id: String,
    pub schedule_id: Option<String>,
    pub campaign_id: Option<String>,
    pub record_id: Option<String>,
    pub contact_id: Option<String>,
    pub limit: u32,
}

impl EndpointContext {
    pub fn for_location(location_id: &str, limit: u32) -> Self {
        Self {
            location_id: location_id.to_string(),
            limit,
            ..Default::default()
        }
    }

    fn lookup(&self, placeholder: &str) -> Option<String> {
        match placeholder {
            "locationId" => Some(self.location_id.clone()).filter(|v| !v.is_empty()),
            "scheduleId" => self.schedule_id.clone(),
            "campaignId" => self.campaign_id.clone(),
            "recordId" => self.record_id.clone(),
            "contactId" => self.contact_id.clone(),
            "limit" => Some(self.limit.to_string()),
            _ => None,
        }
    }
}

/// A candidate with every placeholder filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub name: &'static str,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct EndpointCatalog {
    candidates: HashMap<ResourceKind, Vec<EndpointCandidate>>,
}

impl Default for EndpointCatalog {
    fn default() -> Self {
        let mut candidates = HashMap::new();
        candidates.insert(ResourceKind::CampaignList, CAMPAIGN_LIST_CANDIDATES.to_vec());
        candidates.insert(
            ResourceKind::CampaignAnalytics,
            CAMPAIGN_ANALYTICS_CANDIDATES.to_vec(),
        );
        candidates.insert(ResourceKind::WorkflowList, WORKFLOW_LIST_CANDIDATES.to_vec());
        candidates.insert(ResourceKind::ContactSummary, CONTACT_SUMMARY_CANDIDATES.to_vec());
        Self { candidates }
    }
}

impl EndpointCatalog {
    /// Replace the variant list for one resource.
    pub fn with_candidates(mut self, kind: ResourceKind, list: Vec<EndpointCandidate>) -> Self {
        self.candidates.insert(kind, list);
        self
    }

    pub fn candidates(&self, kind: ResourceKind) -> &[EndpointCandidate] {
        self.candidates.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fills templates in catalog order. Candidates needing a value the
    /// context does not have are skipped.
    pub fn resolve(
        &self,
        kind: ResourceKind,
        base_url: &str,
        ctx: &EndpointContext,
    ) -> Vec<ResolvedEndpoint> {
        let base = base_url.trim_end_matches('/');
        self.candidates(kind)
            .iter()
            .filter_map(|c| {
                fill_template(c.template, ctx).map(|path| ResolvedEndpoint {
                    name: c.name,
                    url: format!("{base}{path}"),
                })
            })
            .collect()
    }
}

fn fill_template(template: &str, ctx: &EndpointContext) -> Option<String> {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let end = start + rest[start..].find('}')?;
        out.push_str(&rest[..start]);
        let value = ctx.lookup(&rest[start + 1..end])?;
        out.extend(url::form_urlencoded::byte_serialize(value.as_bytes()));
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}
