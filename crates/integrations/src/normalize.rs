//! Turns untyped list rows into [`CampaignRecord`] / [`WorkflowRecord`] and
//! collapses duplicates.

use campaign_analytics::deep_field::get_field;
use campaign_analytics::numeric::parse_timestamp;
use campaign_analytics::scorer::compare;
use campaign_analytics::{finalize, AnalyticsExtractor};
use campaign_core::types::{CampaignIdentity, CampaignRecord, WorkflowRecord};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

const ID_ALIASES: &[&str] = &["id", "_id"];
const CAMPAIGN_ID_ALIASES: &[&str] = &["campaignId", "campaign_id"];
const SCHEDULE_ID_ALIASES: &[&str] = &["scheduleId", "schedule_id"];
const BULK_REQUEST_ID_ALIASES: &[&str] = &["bulkRequestId", "bulkReqId", "bulk_request_id"];
const PARENT_ID_ALIASES: &[&str] = &["parentId", "parent_id", "folderId"];
const NAME_ALIASES: &[&str] = &["name", "title", "campaignName", "subject"];
const STATUS_ALIASES: &[&str] = &["status", "state"];
const CREATED_ALIASES: &[&str] = &["createdAt", "created_at", "dateAdded", "created"];
const UPDATED_ALIASES: &[&str] = &["updatedAt", "updated_at", "dateUpdated", "updated"];
const SCHEDULED_ALIASES: &[&str] = &["scheduledAt", "scheduled_at", "scheduleTime", "sendAt"];
const SENT_ALIASES: &[&str] = &["sentAt", "sent_at", "sendDate", "completedAt"];

const UNTITLED: &str = "Untitled";
const UNKNOWN_STATUS: &str = "unknown";

fn string_field(map: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    match get_field(map, aliases)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn nested_id(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_object)
        .and_then(|inner| string_field(inner, ID_ALIASES))
}

fn time_field(map: &Map<String, Value>, aliases: &[&str]) -> Option<DateTime<Utc>> {
    get_field(map, aliases).and_then(parse_timestamp)
}

/// `None` for rows with no usable identifier.
pub fn campaign_from_row(row: &Value, extractor: &AnalyticsExtractor) -> Option<CampaignRecord> {
    let map = row.as_object()?;
    let campaign_id =
        string_field(map, CAMPAIGN_ID_ALIASES).or_else(|| nested_id(map, "campaign"));
    let schedule_id =
        string_field(map, SCHEDULE_ID_ALIASES).or_else(|| nested_id(map, "schedule"));
    let bulk_request_id = string_field(map, BULK_REQUEST_ID_ALIASES);
    let id = string_field(map, ID_ALIASES)
        .or_else(|| schedule_id.clone())
        .or_else(|| campaign_id.clone())
        .or_else(|| bulk_request_id.clone())?;

    Some(CampaignRecord {
        id,
        campaign_id,
        schedule_id,
        bulk_request_id,
        parent_id: string_field(map, PARENT_ID_ALIASES),
        name: string_field(map, NAME_ALIASES).unwrap_or_else(|| UNTITLED.to_string()),
        status: string_field(map, STATUS_ALIASES).unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
        created_at: time_field(map, CREATED_ALIASES),
        updated_at: time_field(map, UPDATED_ALIASES),
        scheduled_at: time_field(map, SCHEDULED_ALIASES),
        sent_at: time_field(map, SENT_ALIASES),
        analytics: finalize(&extractor.extract(row, "campaign-list")),
    })
}

pub fn workflow_from_row(row: &Value) -> Option<WorkflowRecord> {
    let map = row.as_object()?;
    Some(WorkflowRecord {
        id: string_field(map, ID_ALIASES)?,
        name: string_field(map, NAME_ALIASES).unwrap_or_else(|| UNTITLED.to_string()),
        status: string_field(map, STATUS_ALIASES).unwrap_or_else(|| UNKNOWN_STATUS.to_string()),
        created_at: time_field(map, CREATED_ALIASES),
        updated_at: time_field(map, UPDATED_ALIASES),
    })
}

/// One record per identity tuple, in first-seen order. On a collision the
/// record with the better analytics survives; the earlier one wins ties.
pub fn dedup_campaigns(records: Vec<CampaignRecord>) -> Vec<CampaignRecord> {
    let mut out: Vec<CampaignRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<CampaignIdentity, usize> = HashMap::new();
    for record in records {
        match index.get(&record.identity()) {
            Some(&i) => {
                if compare(&record.analytics, &out[i].analytics) == Ordering::Greater {
                    out[i] = record;
                }
            }
            None => {
                index.insert(record.identity(), out.len());
                out.push(record);
            }
        }
    }
    out
}

pub fn dedup_workflows(records: Vec<WorkflowRecord>) -> Vec<WorkflowRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|w| seen.insert(w.id.clone()))
        .collect()
}
