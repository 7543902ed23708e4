//! Regex extraction for bodies that are not valid JSON: truncated payloads,
//! HTML error pages with embedded stats, or plain-language reports.

use crate::aliases::MetricField;
use crate::deep_field::KeySet;
use crate::numeric::parse_number;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// `"key": value`, `key: value` and `key=value` with any key spelling. The key
/// is resolved against the alias table after normalization.
static KEY_VALUE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|[^A-Za-z0-9_])["']?([A-Za-z][A-Za-z0-9 _-]*)["']?\s*[:=]\s*["']?([-+]?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?\s*%?)"#,
    )
    .ok()
});

static METRIC_KEYS: LazyLock<Vec<(MetricField, KeySet)>> = LazyLock::new(|| {
    MetricField::ALL
        .iter()
        .map(|field| (*field, KeySet::new(field.aliases().iter().copied())))
        .collect()
});

/// Metric named by `key`. Unquoted prose can run into the key ("report total
/// opened"), so shorter space-separated suffixes are tried after the full key.
fn metric_for_key(key: &str) -> Option<MetricField> {
    let key = key.trim();
    let lookup = |candidate: &str| {
        METRIC_KEYS
            .iter()
            .find(|(_, keys)| keys.matches(candidate))
            .map(|(field, _)| *field)
    };
    lookup(key).or_else(|| {
        key.match_indices(' ')
            .find_map(|(at, _)| lookup(&key[at + 1..]))
    })
}

/// Phrases such as "opened (123)", "click rate 4.5%" or "Delivered: 1,020".
static LABEL_PATTERNS: LazyLock<Vec<(MetricField, Regex)>> = LazyLock::new(|| {
    const NUM: &str = r"([-+]?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?\s*%?)";
    let rules: [(MetricField, &str); 11] = [
        (MetricField::OpenRate, r"\bopen(?:ed)?\s*rate"),
        (MetricField::ClickRate, r"\bclick(?:ed)?(?:\s*-?\s*through)?\s*rate"),
        (MetricField::ReplyRate, r"\brepl(?:y|ied)\s*rate"),
        (MetricField::Sent, r"\b(?:sent|processed)"),
        (MetricField::Delivered, r"\bdelivered"),
        (MetricField::Opened, r"\bopen(?:ed|s)"),
        (MetricField::Clicked, r"\bclick(?:ed|s)"),
        (MetricField::Replied, r"\brepl(?:ied|ies)"),
        (MetricField::Bounced, r"\bbounce[ds]?"),
        (MetricField::Failed, r"\bfail(?:ed|ures?)"),
        (MetricField::Unsubscribed, r"\bunsubscribe[ds]?"),
    ];
    rules
        .iter()
        .filter_map(|(field, label)| {
            let pattern = format!(r"(?i){label}\s*(?:[:=(\-]\s*)?{NUM}\)?");
            Regex::new(&pattern).ok().map(|re| (*field, re))
        })
        .collect()
});

/// Raw numbers per metric found in `body`. Key/value matches win over
/// natural-language labels; within each pass the first match per metric wins.
pub fn extract_from_text(body: &str) -> BTreeMap<MetricField, f64> {
    let mut found = BTreeMap::new();
    if let Some(re) = KEY_VALUE_PATTERN.as_ref() {
        for caps in re.captures_iter(body) {
            let (Some(key), Some(raw)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let Some(field) = metric_for_key(key.as_str()) else {
                continue;
            };
            if found.contains_key(&field) {
                continue;
            }
            if let Some(n) = parse_number(raw.as_str()) {
                found.insert(field, n);
            }
        }
    }
    for (field, re) in LABEL_PATTERNS.iter() {
        if found.contains_key(field) {
            continue;
        }
        if let Some(n) = first_capture(re, body) {
            found.insert(*field, n);
        }
    }
    found
}

fn first_capture(re: &Regex, body: &str) -> Option<f64> {
    re.captures_iter(body)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| parse_number(m.as_str()))
}
