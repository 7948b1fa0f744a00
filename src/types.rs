use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time;

/// One observed device-activity event in canonical shape.
///
/// Produced exclusively by [`crate::normalize::normalize`]; every optional
/// backend field has an explicit fallback so downstream code never branches
/// on missing data. `location` stays an `Option` because its absence carries
/// meaning (the record is excluded from map aggregation but still listed).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    pub id: String,
    /// Parsed event time; `None` when the raw value was unparseable.
    pub timestamp: Option<DateTime<Utc>>,
    /// Original timestamp text as the backend sent it.
    pub raw_timestamp: String,
    pub device_id: String,
    pub active_app: String,
    pub browser_url: String,
    pub is_suspicious: bool,
    pub suspicious_reasons: Vec<String>,
    pub is_low_risk: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationData>,
    pub screenshot_url: String,
    pub browser_history: Vec<BrowserHistoryEntry>,
}

impl LogRecord {
    /// Display form of the event time; `"—"` when unparseable.
    pub fn display_time(&self) -> String {
        time::format_display(self.timestamp.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LocationData {
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BrowserHistoryEntry {
    pub title: String,
    pub url: String,
    pub visit_count: u32,
    pub last_visit_time: String,
}

/// Derived severity of a record, never stored upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    High,
    Medium,
    Low,
    Normal,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::High => "high",
            RiskLevel::Medium => "medium",
            RiskLevel::Low => "low",
            RiskLevel::Normal => "normal",
        }
    }
}

/// User-chosen query constraints. `None` means "no constraint for that
/// dimension". Changing any field resets pagination to page 1.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub device_id: Option<String>,
    pub date_start: Option<String>,
    pub date_end: Option<String>,
    pub search_query: Option<String>,
    pub risk_level: Option<RiskLevel>,
}

/// Current page number (1-based) and fixed page size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageWindow {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 10,
        }
    }
}

/// One row of the security-alerts feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityAlert {
    pub id: String,
    pub title: String,
    pub device_id: String,
    pub timestamp: String,
    pub severity: RiskLevel,
}

/// One pin on the device map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceLocation {
    pub device_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub city: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryStats {
    pub total_logs: u64,
    pub unique_devices: u64,
    pub last_updated: String,
}

/// Authenticated session as reported by the auth collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub email: String,
}

/// Outcome of a magic-link sign-in request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInOutcome {
    pub success: bool,
    pub message: String,
}
