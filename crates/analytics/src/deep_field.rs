//! Bounded-depth search for numeric fields inside untyped JSON.
//!
//! The root value sits at depth 0; every object or array entered adds one.
//! Containers deeper than `max_depth` are never inspected.

use crate::aliases::{MetricField, BUCKET_LABEL_RULES};
use crate::numeric::value_to_number;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};

pub const DEFAULT_MAX_DEPTH: usize = 6;

const BUCKET_LABEL_KEYS: [&str; 4] = ["status", "type", "event", "name"];
const BUCKET_COUNT_KEYS: [&str; 3] = ["count", "total", "value"];

/// Lowercases and strips everything that is not a letter or digit, so
/// `"Opened Count"`, `"opened_count"` and `"openedCount"` compare equal.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Normalized alias set for one lookup.
#[derive(Debug, Clone)]
pub struct KeySet(HashSet<String>);

impl KeySet {
    pub fn new<'a>(aliases: impl IntoIterator<Item = &'a str>) -> Self {
        Self(aliases.into_iter().map(normalize_key).collect())
    }

    pub fn matches(&self, key: &str) -> bool {
        self.0.contains(&normalize_key(key))
    }
}

/// Depth-first search for the first field whose key matches one of `aliases`
/// and whose value is, or contains, a number. Traversal follows object key
/// order, then array index order.
pub fn find_number(value: &Value, aliases: &[&str], max_depth: usize) -> Option<f64> {
    let keys = KeySet::new(aliases.iter().copied());
    find_with_keys(value, &keys, 0, max_depth)
}

fn find_with_keys(value: &Value, keys: &KeySet, depth: usize, max_depth: usize) -> Option<f64> {
    if depth > max_depth {
        return None;
    }
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                if keys.matches(key) {
                    if let Some(n) = first_numeric_leaf(child, depth + 1, max_depth) {
                        return Some(n);
                    }
                }
            }
            map.values()
                .find_map(|child| find_with_keys(child, keys, depth + 1, max_depth))
        }
        Value::Array(items) => items
            .iter()
            .find_map(|item| find_with_keys(item, keys, depth + 1, max_depth)),
        _ => None,
    }
}

/// First number at or below `value`. Scalars parse directly; containers are
/// searched in order while within the depth cap.
pub fn first_numeric_leaf(value: &Value, depth: usize, max_depth: usize) -> Option<f64> {
    match value {
        Value::Object(map) if depth <= max_depth => map
            .values()
            .find_map(|child| first_numeric_leaf(child, depth + 1, max_depth)),
        Value::Array(items) if depth <= max_depth => items
            .iter()
            .find_map(|item| first_numeric_leaf(item, depth + 1, max_depth)),
        Value::Object(_) | Value::Array(_) => None,
        scalar => value_to_number(scalar),
    }
}

/// First value (not necessarily numeric) stored directly on `map` under a
/// key matching one of `aliases`.
pub fn get_field<'a>(
    map: &'a serde_json::Map<String, Value>,
    aliases: &[&str],
) -> Option<&'a Value> {
    let keys = KeySet::new(aliases.iter().copied());
    map.iter()
        .find(|(key, value)| keys.matches(key) && !value.is_null())
        .map(|(_, value)| value)
}

/// Maps a bucket label such as `"Hard Bounce"` to its metric. `None` when no
/// rule matches or the first matching rule is an untracked category.
pub fn classify_label(label: &str) -> Option<MetricField> {
    let normalized = normalize_key(label);
    if normalized.is_empty() {
        return None;
    }
    BUCKET_LABEL_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| normalized.contains(k)))
        .and_then(|(_, field)| *field)
}

/// Scans arrays of `{label, count}` objects anywhere under `value` and keeps
/// the largest count seen per metric.
pub fn bucket_totals(value: &Value, max_depth: usize) -> BTreeMap<MetricField, f64> {
    let mut totals = BTreeMap::new();
    collect_buckets(value, 0, max_depth, &mut totals);
    totals
}

fn collect_buckets(
    value: &Value,
    depth: usize,
    max_depth: usize,
    totals: &mut BTreeMap<MetricField, f64>,
) {
    if depth > max_depth {
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                if let Some((field, count)) = bucket_entry(item) {
                    totals
                        .entry(field)
                        .and_modify(|current| *current = current.max(count))
                        .or_insert(count);
                }
                collect_buckets(item, depth + 1, max_depth, totals);
            }
        }
        Value::Object(map) => {
            for child in map.values() {
                collect_buckets(child, depth + 1, max_depth, totals);
            }
        }
        _ => {}
    }
}

fn bucket_entry(item: &Value) -> Option<(MetricField, f64)> {
    let map = item.as_object()?;
    let label = get_field(map, &BUCKET_LABEL_KEYS)?.as_str()?;
    let count = get_field(map, &BUCKET_COUNT_KEYS).and_then(value_to_number)?;
    let field = classify_label(label)?;
    Some((field, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn nest(levels: usize, leaf: Value) -> Value {
        (0..levels).fold(leaf, |inner, i| json!({ format!("level{i}"): inner }))
    }

    #[test]
    fn test_normalize_key_variants() {
        assert_eq!(normalize_key("Opened Count"), "openedcount");
        assert_eq!(normalize_key("opened_count"), "openedcount");
        assert_eq!(normalize_key("openedCount"), "openedcount");
    }

    #[test]
    fn test_finds_direct_and_string_values() {
        let payload = json!({"stats": {"Opened Count": "1,200"}});
        assert_eq!(find_number(&payload, &["openedCount"], 6), Some(1200.0));
    }

    #[test]
    fn test_matched_object_yields_first_numeric_leaf() {
        let payload = json!({"opens": {"label": "Opens", "value": 17}});
        assert_eq!(find_number(&payload, &["opens"], 6), Some(17.0));
    }

    #[test]
    fn test_non_numeric_match_keeps_searching() {
        let payload = json!({"opened": "n/a", "detail": {"openedCount": 4}});
        assert_eq!(find_number(&payload, &["opened", "openedCount"], 6), Some(4.0));
    }

    #[test]
    fn test_traversal_order_is_key_order() {
        let payload = json!({"a": {"sent": 1}, "b": {"sent": 2}});
        assert_eq!(find_number(&payload, &["sent"], 6), Some(1.0));
        let rows = json!([{"sent": 5}, {"sent": 9}]);
        assert_eq!(find_number(&rows, &["sent"], 6), Some(5.0));
    }

    #[test]
    fn test_respects_depth_cap() {
        // the object holding the key sits at depth 5 and 7 respectively
        let shallow = nest(5, json!({"deliveredCount": 12}));
        assert_eq!(find_number(&shallow, &["deliveredCount"], 6), Some(12.0));
        let deep = nest(7, json!({"deliveredCount": 12}));
        assert_eq!(find_number(&deep, &["deliveredCount"], 6), None);
        assert_eq!(find_number(&deep, &["deliveredCount"], 7), Some(12.0));
    }

    #[test]
    fn test_missing_field() {
        assert_eq!(find_number(&json!({"x": 1}), &["sent"], 6), None);
        assert_eq!(find_number(&json!(42), &["sent"], 6), None);
    }

    #[test]
    fn test_classify_label_precedence() {
        assert_eq!(classify_label("Unsubscribed"), Some(MetricField::Unsubscribed));
        assert_eq!(classify_label("spam_complaint"), None);
        assert_eq!(classify_label("Soft Bounce"), Some(MetricField::Bounced));
        assert_eq!(classify_label("failed"), Some(MetricField::Failed));
        assert_eq!(classify_label("replied"), Some(MetricField::Replied));
        assert_eq!(classify_label("link_click"), Some(MetricField::Clicked));
        assert_eq!(classify_label("opened"), Some(MetricField::Opened));
        assert_eq!(classify_label("read"), Some(MetricField::Opened));
        assert_eq!(classify_label("delivered"), Some(MetricField::Delivered));
        assert_eq!(classify_label("sent"), Some(MetricField::Sent));
        assert_eq!(classify_label("queued"), None);
        // "bounce" is checked before "deliver"
        assert_eq!(classify_label("delivery_bounce"), Some(MetricField::Bounced));
    }

    #[test]
    fn test_bucket_totals_keep_maximum() {
        let payload = json!({
            "events": [
                {"status": "opened", "count": 10},
                {"type": "Opened", "total": "25"},
                {"event": "clicked", "value": 3},
                {"name": "spam", "count": 99},
                {"status": "queued", "count": 1000}
            ]
        });
        let totals = bucket_totals(&payload, 6);
        assert_eq!(totals.get(&MetricField::Opened), Some(&25.0));
        assert_eq!(totals.get(&MetricField::Clicked), Some(&3.0));
        assert_eq!(totals.len(), 2);
    }
}
