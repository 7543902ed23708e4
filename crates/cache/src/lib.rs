#![warn(clippy::unwrap_used)]

pub mod local;

use campaign_core::types::{CampaignRecord, WorkflowRecord};

pub use local::{CacheEntry, LocalCache};

/// Reconciled campaign lists keyed by location id.
pub type CampaignCache = LocalCache<Vec<CampaignRecord>>;

/// Workflow lists keyed by location id.
pub type WorkflowCache = LocalCache<Vec<WorkflowRecord>>;
