//! Lenient number parsing for values the ESP reports as strings.

use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

/// Whole-string match: optional sign, grouped or plain digits, optional
/// percent sign, optional short trailing label ("42 opens").
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([-+]?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?|[-+]?\.\d+)\s*%?(?:\s+[A-Za-z][A-Za-z_-]{0,23}(?:\s+[A-Za-z][A-Za-z_-]{0,23})?)?$",
    )
    .expect("number pattern is valid")
});

/// Epoch values at or above this are milliseconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

/// Parses `"1,234.5%"`, `"42 opens"`, `"0.45"`. Returns `None` for anything else.
pub fn parse_number(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    let caps = NUMBER_RE.captures(trimmed)?;
    let digits = caps.get(1)?.as_str().replace(',', "");
    digits.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Numeric view of a JSON scalar. Objects, arrays, booleans and null yield `None`.
pub fn value_to_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|n| n.is_finite()),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

/// Converts an extracted number to a count. Negative values are not counts.
pub fn to_count(value: f64) -> Option<u64> {
    if value.is_finite() && value >= 0.0 {
        Some(value.round() as u64)
    } else {
        None
    }
}

/// Values above 1 are whole percentages; 1 and below are already fractions.
pub fn normalize_rate(value: f64) -> f64 {
    if value > 1.0 { value / 100.0 } else { value }
}

/// Reads a timestamp from an ISO-8601 string, a numeric string, or an
/// epoch number in seconds or milliseconds.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(Utc.from_utc_datetime(&naive));
            }
            s.parse::<f64>().ok().and_then(epoch_to_datetime)
        }
        Value::Number(n) => n.as_f64().and_then(epoch_to_datetime),
        _ => None,
    }
}

fn epoch_to_datetime(epoch: f64) -> Option<DateTime<Utc>> {
    if !epoch.is_finite() || epoch <= 0.0 {
        return None;
    }
    let millis = if epoch >= EPOCH_MILLIS_THRESHOLD {
        epoch
    } else {
        epoch * 1000.0
    };
    Utc.timestamp_millis_opt(millis as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_grouped_percent() {
        assert_eq!(parse_number("1,234.5%"), Some(1234.5));
    }

    #[test]
    fn test_parse_labeled_number() {
        assert_eq!(parse_number("42 opens"), Some(42.0));
        assert_eq!(parse_number(" 7 unique clicks "), Some(7.0));
    }

    #[test]
    fn test_rejects_non_numbers() {
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("42abc99"), None);
        assert_eq!(parse_number("12,34"), None);
        assert_eq!(parse_number("opens 42"), None);
    }

    #[test]
    fn test_plain_and_signed() {
        assert_eq!(parse_number("0.45"), Some(0.45));
        assert_eq!(parse_number("-3"), Some(-3.0));
        assert_eq!(parse_number(".5"), Some(0.5));
        assert_eq!(parse_number("45 %"), Some(45.0));
    }

    #[test]
    fn test_value_to_number() {
        assert_eq!(value_to_number(&json!(12)), Some(12.0));
        assert_eq!(value_to_number(&json!("12,000")), Some(12000.0));
        assert_eq!(value_to_number(&json!(true)), None);
        assert_eq!(value_to_number(&json!({"n": 1})), None);
    }

    #[test]
    fn test_normalize_rate() {
        assert_eq!(normalize_rate(45.0), 0.45);
        assert_eq!(normalize_rate(0.45), 0.45);
        assert_eq!(normalize_rate(1.0), 1.0);
    }

    #[test]
    fn test_to_count() {
        assert_eq!(to_count(3.6), Some(4));
        assert_eq!(to_count(-1.0), None);
        assert_eq!(to_count(f64::NAN), None);
    }

    #[test]
    fn test_timestamps_from_seconds_and_millis() {
        let secs = parse_timestamp(&json!(1_700_000_000)).unwrap();
        let millis = parse_timestamp(&json!(1_700_000_000_000u64)).unwrap();
        assert_eq!(secs, millis);
        let iso = parse_timestamp(&json!("2023-11-14T22:13:20Z")).unwrap();
        assert_eq!(iso, secs);
        assert_eq!(parse_timestamp(&json!("1700000000")), Some(secs));
        assert_eq!(parse_timestamp(&json!("not a date")), None);
    }
}
