//! Shape detection for list responses: where the rows are, where the
//! next-page pointer is, and what the error message says.

use serde_json::Value;

/// Keys under which list endpoints have been seen to return their rows.
const ROW_KEYS: [&str; 10] = [
    "campaigns",
    "schedules",
    "emails",
    "bulkRequests",
    "workflows",
    "data",
    "items",
    "results",
    "records",
    "rows",
];

/// Wrapper objects that sometimes hold the row array one level down.
const WRAPPER_KEYS: [&str; 2] = ["data", "result"];

/// Next-page pointer locations, in lookup order, with the query parameter a
/// non-URL token is sent back under. `None` picks `page=` for numbers and
/// `cursor=` for anything else.
const NEXT_PAGE_PATHS: [(&[&str], Option<&str>); 13] = [
    (&["meta", "nextPageUrl"], None),
    (&["meta", "nextPage"], None),
    (&["meta", "next"], None),
    (&["meta", "startAfterId"], Some("startAfterId")),
    (&["pagination", "nextPageUrl"], None),
    (&["pagination", "nextPage"], None),
    (&["pagination", "next"], None),
    (&["pagination", "nextCursor"], Some("cursor")),
    (&["links", "next"], None),
    (&["nextPageUrl"], None),
    (&["nextPage"], None),
    (&["nextCursor"], Some("cursor")),
    (&["next"], None),
];

const MESSAGE_KEYS: [&str; 5] = ["message", "error_description", "error", "msg", "detail"];

const MAX_MESSAGE_LEN: usize = 200;

/// Object rows of a list payload. A bare array is its own row list.
pub fn extract_rows(payload: &Value) -> Vec<Value> {
    find_row_array(payload)
        .map(|items| items.iter().filter(|v| v.is_object()).cloned().collect())
        .unwrap_or_default()
}

fn find_row_array(payload: &Value) -> Option<&Vec<Value>> {
    match payload {
        Value::Array(items) => Some(items),
        Value::Object(map) => {
            for key in ROW_KEYS {
                if let Some(Value::Array(items)) = map.get(key) {
                    return Some(items);
                }
            }
            WRAPPER_KEYS
                .iter()
                .filter_map(|k| map.get(*k))
                .filter(|v| v.is_object())
                .find_map(find_row_array)
        }
        _ => None,
    }
}

/// What the upstream offered as the way to the next page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Absolute or root-relative URL to fetch as-is.
    Url(String),
    /// Token sent back as `key=value` on the current URL.
    Param { key: &'static str, value: String },
}

pub fn next_page_signal(payload: &Value) -> Option<NextPage> {
    NEXT_PAGE_PATHS.iter().find_map(|(path, param)| {
        lookup_path(payload, path).and_then(|value| classify_signal(value, *param))
    })
}

fn lookup_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |current, key| current.get(key))
}

fn classify_signal(value: &Value, param: Option<&'static str>) -> Option<NextPage> {
    let token = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    if token.is_empty() {
        return None;
    }
    if token.starts_with("http://") || token.starts_with("https://") || token.starts_with('/') {
        return Some(NextPage::Url(token));
    }
    let key = match param {
        Some(key) => key,
        None => match token.parse::<u64>() {
            Ok(0) => return None,
            Ok(_) => "page",
            // Fractional or negative numbers are not page numbers
            Err(_) if value.is_number() => return None,
            Err(_) => "cursor",
        },
    };
    Some(NextPage::Param { key, value: token })
}

/// Best-effort human-readable error from a failed response body.
pub fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| json_message(&v))
        .unwrap_or_else(|| body.trim().to_string());
    truncate(&message, MAX_MESSAGE_LEN)
}

fn json_message(value: &Value) -> Option<String> {
    let map = value.as_object()?;
    for key in MESSAGE_KEYS {
        match map.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return Some(s.trim().to_string()),
            Some(Value::Array(items)) => {
                let parts: Vec<String> = items
                    .iter()
                    .filter_map(|i| match i {
                        Value::String(s) => Some(s.clone()),
                        other => json_message(other),
                    })
                    .collect();
                if !parts.is_empty() {
                    return Some(parts.join("; "));
                }
            }
            Some(nested @ Value::Object(_)) => {
                if let Some(m) = json_message(nested) {
                    return Some(m);
                }
            }
            _ => {}
        }
    }
    map.get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.iter().find_map(json_message))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}
