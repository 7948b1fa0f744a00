use std::collections::HashMap;

use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::time;
use crate::types::LogRecord;

/// How many entries the app-usage chart shows.
pub const TOP_APPS: usize = 6;

/// How many entries the website-usage chart shows.
pub const TOP_DOMAINS: usize = 8;

static RE_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.-]*://(?P<host>[^/:?#]+)").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCount {
    pub name: String,
    pub count: u64,
}

/// Bucket records into 24 hour-of-day buckets in the given timezone.
/// Records with unparseable timestamps are skipped.
pub fn hourly_histogram(records: &[LogRecord], tz: &Tz) -> [u64; 24] {
    let mut buckets = [0u64; 24];
    for record in records {
        if let Some(ts) = record.timestamp {
            buckets[time::hour_in_tz(&ts, tz) as usize] += 1;
        }
    }
    buckets
}

fn top_counts(counts: HashMap<String, u64>, limit: usize) -> Vec<UsageCount> {
    let mut entries: Vec<UsageCount> = counts
        .into_iter()
        .map(|(name, count)| UsageCount { name, count })
        .collect();
    // ties broken by name so chart order is stable across refreshes
    entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    entries.truncate(limit);
    entries
}

/// Most-used apps by record count, descending.
pub fn top_apps(records: &[LogRecord], limit: usize) -> Vec<UsageCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in records {
        *counts.entry(record.active_app.clone()).or_insert(0) += 1;
    }
    top_counts(counts, limit)
}

/// Most-visited domains by record count, descending.
///
/// The domain is the URL hostname minus a leading `www.`; values that don't
/// parse as URLs (including the `"unknown"` placeholder) are excluded
/// rather than counted under a catch-all.
pub fn top_domains(records: &[LogRecord], limit: usize) -> Vec<UsageCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();
    for record in records {
        if let Some(domain) = domain_of(&record.browser_url) {
            *counts.entry(domain).or_insert(0) += 1;
        }
    }
    top_counts(counts, limit)
}

fn domain_of(url: &str) -> Option<String> {
    let caps = RE_HOST.captures(url)?;
    let host = caps["host"].to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}
