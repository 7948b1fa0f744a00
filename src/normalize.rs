use serde_json::Value;

use crate::time;
use crate::types::{BrowserHistoryEntry, LocationData, LogRecord};

/// Map a raw backend record into the canonical [`LogRecord`].
///
/// This is the only place raw backend shapes are inspected. Fields may be
/// missing, null, or renamed across revisions (`device_key` vs `device_id`,
/// `screenshot` vs `screenshot_url`); all of that is resolved here with
/// explicit fallbacks. Pure, never fails: a malformed timestamp yields
/// `timestamp: None` and the display layer shows a placeholder.
pub fn normalize(raw: &Value) -> LogRecord {
    let raw_timestamp = str_field(raw, &["timestamp"]).unwrap_or_default();
    let timestamp = time::parse_timestamp(&raw_timestamp);

    LogRecord {
        id: id_field(raw),
        timestamp,
        raw_timestamp,
        device_id: str_field(raw, &["device_key", "device_id"])
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        active_app: str_field(raw, &["active_app"])
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown".to_string()),
        browser_url: str_field(raw, &["browser_url"])
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        is_suspicious: bool_field(raw, "is_suspicious"),
        suspicious_reasons: string_list(raw.get("suspicious_reasons")),
        is_low_risk: bool_field(raw, "is_low_risk") || bool_field(raw, "low_risk"),
        location: location(raw.get("location_data")),
        screenshot_url: str_field(raw, &["screenshot", "screenshot_url"]).unwrap_or_default(),
        browser_history: history(raw.get("browser_history")),
    }
}

/// Record ids arrive as strings or numbers depending on the table revision.
fn id_field(raw: &Value) -> String {
    match raw.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn str_field(raw: &Value, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| raw.get(*name))
        .find_map(|v| v.as_str())
        .map(|s| s.to_string())
}

fn bool_field(raw: &Value, name: &str) -> bool {
    raw.get(name).and_then(Value::as_bool).unwrap_or(false)
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default()
}

fn location(v: Option<&Value>) -> Option<LocationData> {
    let obj = v?.as_object()?;
    let num = |name: &str| obj.get(name).and_then(Value::as_f64).unwrap_or(0.0);
    let text = |name: &str| {
        obj.get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown")
            .to_string()
    };
    Some(LocationData {
        latitude: num("latitude"),
        longitude: num("longitude"),
        city: text("city"),
        country: text("country"),
    })
}

fn history(v: Option<&Value>) -> Vec<BrowserHistoryEntry> {
    v.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|entry| BrowserHistoryEntry {
                    title: entry
                        .get("title")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    url: entry
                        .get("url")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    visit_count: entry
                        .get("visit_count")
                        .and_then(Value::as_u64)
                        .unwrap_or(0) as u32,
                    last_visit_time: entry
                        .get("last_visit_time")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
                .collect()
        })
        .unwrap_or_default()
}
