//! Builds [`AnalyticsRecord`] candidates from one upstream response.

use crate::aliases::MetricField;
use crate::deep_field::{bucket_totals, find_number, KeySet, DEFAULT_MAX_DEPTH};
use crate::numeric::{normalize_rate, to_count};
use crate::text::extract_from_text;
use campaign_core::types::AnalyticsRecord;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Keys that carry a campaign, schedule or record identifier on a row.
const ID_KEYS: [&str; 8] = [
    "id",
    "_id",
    "campaignId",
    "scheduleId",
    "bulkRequestId",
    "bulkReqId",
    "recordId",
    "emailId",
];

/// Where in the payload a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// The whole response body.
    Payload,
    /// One array element carrying a requested identifier.
    Row,
    /// Per-field sum over every matched row, present when more than one matched.
    RowAggregate,
    /// An object keyed by, or otherwise bound to, a requested identifier.
    IdentifierBound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub record: AnalyticsRecord,
}

enum IdMatch<'a> {
    Row(&'a Value),
    Bound(&'a Value),
}

#[derive(Debug, Clone)]
pub struct AnalyticsExtractor {
    max_depth: usize,
}

impl Default for AnalyticsExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl AnalyticsExtractor {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Alias search per metric, then bucket arrays for whatever is still missing.
    pub fn extract(&self, payload: &Value, source: &str) -> AnalyticsRecord {
        let mut raw = BTreeMap::new();
        for field in MetricField::ALL {
            if let Some(n) = find_number(payload, field.aliases(), self.max_depth) {
                raw.insert(field, n);
            }
        }
        for (field, n) in bucket_totals(payload, self.max_depth) {
            raw.entry(field).or_insert(n);
        }
        build_record(&raw, source)
    }

    /// Extracts from a raw response body, falling back to regex scanning when
    /// the body is not a JSON object or array.
    pub fn extract_body(&self, body: &str, source: &str) -> AnalyticsRecord {
        match serde_json::from_str::<Value>(body) {
            Ok(payload) if payload.is_object() || payload.is_array() => {
                self.extract(&payload, source)
            }
            _ => {
                debug!(source = source, "Body is not structured JSON, using text extraction");
                build_record(&extract_from_text(body), &format!("{source}:text"))
            }
        }
    }

    /// Whole-payload candidate followed by one candidate per region of the
    /// payload bound to any of `ids`.
    pub fn extract_candidates(&self, payload: &Value, ids: &[&str], source: &str) -> Vec<Candidate> {
        let mut candidates = vec![Candidate {
            kind: CandidateKind::Payload,
            record: self.extract(payload, source),
        }];
        if ids.is_empty() {
            return candidates;
        }

        let mut matches = Vec::new();
        self.scan_for_ids(payload, ids, 0, false, &mut matches);

        let mut rows = Vec::new();
        let mut bound = Vec::new();
        for m in matches {
            match m {
                IdMatch::Row(v) => rows.push(self.extract(v, &format!("{source}#row"))),
                IdMatch::Bound(v) => bound.push(self.extract(v, &format!("{source}#id"))),
            }
        }

        if rows.len() > 1 {
            let aggregate = sum_records(&rows, &format!("{source}#rows"));
            candidates.extend(rows.into_iter().map(|record| Candidate {
                kind: CandidateKind::Row,
                record,
            }));
            candidates.push(Candidate {
                kind: CandidateKind::RowAggregate,
                record: aggregate,
            });
        } else {
            candidates.extend(rows.into_iter().map(|record| Candidate {
                kind: CandidateKind::Row,
                record,
            }));
        }
        candidates.extend(bound.into_iter().map(|record| Candidate {
            kind: CandidateKind::IdentifierBound,
            record,
        }));
        candidates
    }

    fn scan_for_ids<'a>(
        &self,
        value: &'a Value,
        ids: &[&str],
        depth: usize,
        in_array: bool,
        out: &mut Vec<IdMatch<'a>>,
    ) {
        if depth > self.max_depth {
            return;
        }
        match value {
            Value::Object(map) => {
                // Array elements may nest their id one level down ({"campaign": {"id": ..}});
                // elsewhere only the innermost object holding the id is bound.
                if in_array && carries_identifier(map, ids) {
                    out.push(IdMatch::Row(value));
                    return;
                }
                if !in_array && direct_identifier(map, ids) {
                    out.push(IdMatch::Bound(value));
                    return;
                }
                for (key, child) in map {
                    if ids.contains(&key.as_str()) && (child.is_object() || child.is_array()) {
                        out.push(IdMatch::Bound(child));
                    } else {
                        self.scan_for_ids(child, ids, depth + 1, false, out);
                    }
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.scan_for_ids(item, ids, depth + 1, true, out);
                }
            }
            _ => {}
        }
    }
}

/// True when `map`, or an object directly under it, has an identifier key
/// whose value equals one of `ids`.
fn carries_identifier(map: &Map<String, Value>, ids: &[&str]) -> bool {
    direct_identifier(map, ids)
        || map
            .values()
            .filter_map(Value::as_object)
            .any(|child| direct_identifier(child, ids))
}

fn direct_identifier(map: &Map<String, Value>, ids: &[&str]) -> bool {
    let id_keys = KeySet::new(ID_KEYS);
    map.iter().any(|(key, value)| {
        if !id_keys.matches(key) {
            return false;
        }
        match value {
            Value::String(s) => ids.contains(&s.trim()),
            Value::Number(n) => ids.contains(&n.to_string().as_str()),
            _ => false,
        }
    })
}

fn build_record(raw: &BTreeMap<MetricField, f64>, source: &str) -> AnalyticsRecord {
    let count = |field: MetricField| raw.get(&field).copied().and_then(to_count);
    let rate = |field: MetricField| {
        raw.get(&field)
            .copied()
            .filter(|r| r.is_finite() && *r >= 0.0)
            .map(normalize_rate)
    };
    let mut record = AnalyticsRecord {
        sent: count(MetricField::Sent),
        delivered: count(MetricField::Delivered),
        opened: count(MetricField::Opened),
        clicked: count(MetricField::Clicked),
        replied: count(MetricField::Replied),
        bounced: count(MetricField::Bounced),
        failed: count(MetricField::Failed),
        unsubscribed: count(MetricField::Unsubscribed),
        open_rate: rate(MetricField::OpenRate),
        click_rate: rate(MetricField::ClickRate),
        reply_rate: rate(MetricField::ReplyRate),
        source: None,
    };
    if record.has_any_metric() {
        record.source = Some(source.to_string());
    }
    record
}

fn sum_records(records: &[AnalyticsRecord], source: &str) -> AnalyticsRecord {
    fn sum(values: impl Iterator<Item = Option<u64>>) -> Option<u64> {
        values
            .flatten()
            .fold(None, |acc: Option<u64>, v| Some(acc.unwrap_or(0).saturating_add(v)))
    }
    let mut total = AnalyticsRecord {
        sent: sum(records.iter().map(|r| r.sent)),
        delivered: sum(records.iter().map(|r| r.delivered)),
        opened: sum(records.iter().map(|r| r.opened)),
        clicked: sum(records.iter().map(|r| r.clicked)),
        replied: sum(records.iter().map(|r| r.replied)),
        bounced: sum(records.iter().map(|r| r.bounced)),
        failed: sum(records.iter().map(|r| r.failed)),
        unsubscribed: sum(records.iter().map(|r| r.unsubscribed)),
        ..Default::default()
    };
    if total.has_any_metric() {
        total.source = Some(source.to_string());
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_flat_payload() {
        let payload = json!({
            "stats": {
                "Sent Count": 1000,
                "delivered": "980",
                "uniqueOpens": 245,
                "clicks": 31,
                "open_rate": "25%",
                "unsubscribes": 2
            }
        });
        let record = AnalyticsExtractor::default().extract(&payload, "schedule-stats");
        assert_eq!(record.sent, Some(1000));
        assert_eq!(record.delivered, Some(980));
        assert_eq!(record.opened, Some(245));
        assert_eq!(record.clicked, Some(31));
        assert_eq!(record.unsubscribed, Some(2));
        assert_eq!(record.open_rate, Some(0.25));
        assert_eq!(record.source.as_deref(), Some("schedule-stats"));
    }

    #[test]
    fn test_bucket_only_fills_gaps() {
        let payload = json!({
            "openedCount": 40,
            "breakdown": [
                {"status": "opened", "count": 99},
                {"status": "bounced", "count": 5}
            ]
        });
        let record = AnalyticsExtractor::default().extract(&payload, "p");
        assert_eq!(record.opened, Some(40));
        assert_eq!(record.bounced, Some(5));
    }

    #[test]
    fn test_empty_payload_has_no_source() {
        let record = AnalyticsExtractor::default().extract(&json!({"name": "x"}), "p");
        assert!(!record.has_any_metric());
        assert_eq!(record.source, None);
    }

    #[test]
    fn test_extract_body_falls_back_to_text() {
        let record = AnalyticsExtractor::default()
            .extract_body("sent: 50, opened (10), open rate 20%", "stats");
        assert_eq!(record.sent, Some(50));
        assert_eq!(record.opened, Some(10));
        assert_eq!(record.open_rate, Some(0.2));
        assert_eq!(record.source.as_deref(), Some("stats:text"));
    }

    #[test]
    fn test_candidates_bind_rows_by_identifier() {
        let payload = json!({
            "campaigns": [
                {"id": "c0", "sentCount": 500, "openedCount": 50},
                {"id": "c1", "sentCount": 100, "openedCount": 25}
            ]
        });
        let candidates = AnalyticsExtractor::default().extract_candidates(&payload, &["c1"], "list");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].kind, CandidateKind::Payload);
        assert_eq!(candidates[0].record.sent, Some(500));
        assert_eq!(candidates[1].kind, CandidateKind::Row);
        assert_eq!(candidates[1].record.sent, Some(100));
        assert_eq!(candidates[1].record.source.as_deref(), Some("list#row"));
    }

    #[test]
    fn test_multiple_rows_produce_aggregate() {
        let payload = json!([
            {"scheduleId": "s1", "sent": 10, "opened": 2},
            {"scheduleId": "s1", "sent": 5, "clicked": 1},
            {"scheduleId": "s2", "sent": 99}
        ]);
        let candidates = AnalyticsExtractor::default().extract_candidates(&payload, &["s1"], "p");
        let aggregate = candidates
            .iter()
            .find(|c| c.kind == CandidateKind::RowAggregate)
            .unwrap();
        assert_eq!(aggregate.record.sent, Some(15));
        assert_eq!(aggregate.record.opened, Some(2));
        assert_eq!(aggregate.record.clicked, Some(1));
        assert_eq!(
            candidates.iter().filter(|c| c.kind == CandidateKind::Row).count(),
            2
        );
    }

    #[test]
    fn test_object_keyed_by_identifier() {
        let payload = json!({"stats": {"c9": {"delivered": 70}, "c8": {"delivered": 1}}});
        let candidates = AnalyticsExtractor::default().extract_candidates(&payload, &["c9"], "p");
        let bound: Vec<_> = candidates
            .iter()
            .filter(|c| c.kind == CandidateKind::IdentifierBound)
            .collect();
        assert_eq!(bound.len(), 1);
        assert_eq!(bound[0].record.delivered, Some(70));
    }

    #[test]
    fn test_identifier_binds_innermost_object() {
        let payload = json!({
            "meta": {"requestId": "r-1", "total": 900},
            "result": {"id": "c1", "delivered": 5}
        });
        let candidates = AnalyticsExtractor::default().extract_candidates(&payload, &["c1"], "p");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].kind, CandidateKind::IdentifierBound);
        assert_eq!(candidates[1].record.delivered, Some(5));
        assert_eq!(candidates[1].record.source.as_deref(), Some("p#id"));
    }

    #[test]
    fn test_nested_identifier_binds_enclosing_row() {
        let payload = json!({
            "data": [
                {"campaign": {"id": 42}, "metrics": {"clicks": 8}},
                {"campaign": {"id": 43}, "metrics": {"clicks": 1}}
            ]
        });
        let candidates = AnalyticsExtractor::default().extract_candidates(&payload, &["42"], "p");
        let row = candidates.iter().find(|c| c.kind == CandidateKind::Row).unwrap();
        assert_eq!(row.record.clicked, Some(8));
    }
}
