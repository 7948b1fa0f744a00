use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::backend::TableClient;
use crate::live::LiveUpdateBridge;
use crate::metrics::classify_risk;
use crate::normalize::normalize;
use crate::query::search::matches_search;
use crate::query::{build_log_query, LogQueryPlan, PageRange, Pager, Predicate, QuerySpec};
use crate::time::TIME_PLACEHOLDER;
use crate::types::{
    DeviceLocation, FilterSpec, LogRecord, RiskLevel, SecurityAlert, SummaryStats,
};

/// How many rows the device-id scan inspects.
const DEVICE_SCAN_LIMIT: u64 = 500;

/// Result of one log fetch after normalization and client-side residue.
///
/// `total_count: None` means the count is unknown (failed fetch), never a
/// confirmed zero. `count_is_exact` is false whenever client-side filtering
/// made the backend count approximate.
#[derive(Debug, Clone, Default)]
pub struct LogPage {
    pub records: Vec<LogRecord>,
    pub total_count: Option<u64>,
    pub count_is_exact: bool,
    pub error: Option<String>,
}

/// Execute a built query plan: backend query, normalize, apply residue.
///
/// Failures are converted into an empty page carrying the error text; the
/// caller decides how to surface it.
pub fn fetch_logs(client: &dyn TableClient, plan: &LogQueryPlan) -> LogPage {
    match client.query(&plan.spec) {
        Ok(table_page) => {
            let mut records: Vec<LogRecord> =
                table_page.rows.iter().map(normalize).collect();
            if let Some(query) = &plan.client_search {
                records.retain(|r| matches_search(r, query));
            }
            if let Some(risk) = plan.client_risk {
                records.retain(|r| classify_risk(r) == risk);
            }
            LogPage {
                records,
                total_count: table_page.count,
                count_is_exact: plan.count_is_exact && table_page.count.is_some(),
                error: None,
            }
        }
        Err(e) => {
            log::warn!("log fetch failed: {}", e);
            LogPage {
                records: Vec::new(),
                total_count: None,
                count_is_exact: false,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Snapshot the view layer renders.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct LogViewState {
    pub records: Vec<LogRecord>,
    pub page: u32,
    pub page_size: u32,
    pub total_count: Option<u64>,
    pub total_pages: u32,
    pub count_is_exact: bool,
    pub error: Option<String>,
}

/// A fetch that has been stamped but not yet applied.
#[derive(Debug)]
pub struct PendingFetch {
    pub generation: u64,
    pub plan: LogQueryPlan,
}

/// Owns the filter and pagination state and orchestrates the fetch path.
///
/// Every fetch is stamped with a generation from a monotonic counter; filter
/// changes advance the counter, so a result that resolves after a newer
/// change is rejected in [`apply_fetch`](Self::apply_fetch) instead of
/// clobbering the fresher view. Within one generation the last stamped
/// fetch wins.
pub struct DashboardController {
    client: Arc<dyn TableClient>,
    filter: FilterSpec,
    pager: Pager,
    generation: AtomicU64,
    view: LogViewState,
}

impl DashboardController {
    pub fn new(client: Arc<dyn TableClient>, page_size: u32) -> Self {
        let pager = Pager::new(page_size);
        let view = LogViewState {
            page: pager.page(),
            page_size: pager.page_size(),
            total_pages: pager.total_pages(),
            ..Default::default()
        };
        Self {
            client,
            filter: FilterSpec::default(),
            pager,
            generation: AtomicU64::new(0),
            view,
        }
    }

    pub fn filter(&self) -> &FilterSpec {
        &self.filter
    }

    pub fn view(&self) -> &LogViewState {
        &self.view
    }

    pub fn set_device_filter(&mut self, device_id: Option<String>) {
        let mut next = self.filter.clone();
        next.device_id = device_id;
        self.apply_filter(next);
    }

    pub fn set_date_range(&mut self, start: Option<String>, end: Option<String>) {
        let mut next = self.filter.clone();
        next.date_start = start;
        next.date_end = end;
        self.apply_filter(next);
    }

    pub fn set_search_query(&mut self, query: Option<String>) {
        let mut next = self.filter.clone();
        next.search_query = query;
        self.apply_filter(next);
    }

    pub fn set_risk_filter(&mut self, risk: Option<RiskLevel>) {
        let mut next = self.filter.clone();
        next.risk_level = risk;
        self.apply_filter(next);
    }

    /// Changing any filter dimension resets pagination to page 1 and
    /// invalidates in-flight fetches.
    fn apply_filter(&mut self, next: FilterSpec) {
        if next == self.filter {
            return;
        }
        self.filter = next;
        self.pager.reset();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Stamp a new fetch for the current filter and page. The stamped
    /// generation supersedes every earlier one.
    pub fn begin_fetch(&self) -> PendingFetch {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        PendingFetch {
            generation,
            plan: build_log_query(&self.filter, &self.pager.window()),
        }
    }

    /// Apply a resolved fetch. Returns false (leaving the view untouched)
    /// when a newer filter change or fetch superseded it.
    pub fn apply_fetch(&mut self, generation: u64, page: LogPage) -> bool {
        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("dropping stale fetch result (generation {})", generation);
            return false;
        }

        if page.total_count.is_some() {
            self.pager.set_total_count(page.total_count);
        }

        self.view = LogViewState {
            records: page.records,
            page: self.pager.page(),
            page_size: self.pager.page_size(),
            total_count: page.total_count,
            total_pages: self.pager.total_pages(),
            count_is_exact: page.count_is_exact,
            error: page.error,
        };
        true
    }

    /// Synchronous fetch path: stamp, execute, apply.
    pub fn refresh(&mut self) -> &LogViewState {
        let pending = self.begin_fetch();
        let page = fetch_logs(self.client.as_ref(), &pending.plan);
        self.apply_fetch(pending.generation, page);
        &self.view
    }

    /// Move to a page and re-fetch. Out-of-range pages are a no-op.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        if !self.pager.go_to(page) {
            return false;
        }
        self.refresh();
        true
    }

    /// Wire the realtime feed to this controller's fetch path. The caller
    /// owns the bridge; dropping it releases the subscription.
    pub fn live_bridge<F>(&self, window: Duration, refresh: F) -> LiveUpdateBridge
    where
        F: Fn() + Send + Sync + 'static,
    {
        LiveUpdateBridge::new(self.client.as_ref(), "logs", window, refresh)
    }

    pub fn device_ids(&self) -> crate::error::Result<Vec<String>> {
        fetch_device_ids(self.client.as_ref())
    }

    pub fn device_locations(&self, limit: u64) -> crate::error::Result<Vec<DeviceLocation>> {
        fetch_device_locations(self.client.as_ref(), limit)
    }

    pub fn suspicious_alerts(&self, limit: u64) -> crate::error::Result<Vec<SecurityAlert>> {
        fetch_suspicious_alerts(self.client.as_ref(), limit)
    }

    pub fn summary_stats(&self) -> crate::error::Result<SummaryStats> {
        fetch_summary_stats(self.client.as_ref())
    }
}

/// Distinct device ids, newest activity first, capped scan.
pub fn fetch_device_ids(client: &dyn TableClient) -> crate::error::Result<Vec<String>> {
    let mut spec = QuerySpec::logs();
    spec.columns = vec!["device_key".to_string()];
    spec.predicates.push(Predicate::Neq {
        column: "device_key".to_string(),
        value: json!(""),
    });
    spec.range = Some(PageRange {
        offset: 0,
        limit: DEVICE_SCAN_LIMIT,
    });

    let page = client.query(&spec)?;
    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for row in &page.rows {
        if let Some(id) = row.get("device_key").and_then(|v| v.as_str()) {
            if !id.is_empty() && seen.insert(id.to_string()) {
                ids.push(id.to_string());
            }
        }
    }
    Ok(ids)
}

/// Most recent located records, one map pin each.
pub fn fetch_device_locations(
    client: &dyn TableClient,
    limit: u64,
) -> crate::error::Result<Vec<DeviceLocation>> {
    let mut spec = QuerySpec::logs();
    spec.predicates.push(Predicate::NotNull {
        column: "location_data".to_string(),
    });
    spec.range = Some(PageRange { offset: 0, limit });

    let page = client.query(&spec)?;
    Ok(page
        .rows
        .iter()
        .map(normalize)
        .filter_map(|record| {
            record.location.as_ref().map(|loc| DeviceLocation {
                device_id: record.device_id.clone(),
                latitude: loc.latitude,
                longitude: loc.longitude,
                city: loc.city.clone(),
            })
        })
        .collect())
}

/// Latest suspicious records shaped for the alerts feed.
pub fn fetch_suspicious_alerts(
    client: &dyn TableClient,
    limit: u64,
) -> crate::error::Result<Vec<SecurityAlert>> {
    let mut spec = QuerySpec::logs();
    spec.predicates.push(Predicate::Eq {
        column: "is_suspicious".to_string(),
        value: json!(true),
    });
    spec.range = Some(PageRange { offset: 0, limit });

    let page = client.query(&spec)?;
    Ok(page
        .rows
        .iter()
        .map(normalize)
        .map(|record| {
            let title = if record.suspicious_reasons.is_empty() {
                "Suspicious activity".to_string()
            } else {
                record.suspicious_reasons.join(", ")
            };
            SecurityAlert {
                id: record.id.clone(),
                title,
                device_id: record.device_id.clone(),
                timestamp: record.display_time(),
                severity: classify_risk(&record),
            }
        })
        .collect())
}

/// Header-card numbers: total logs, distinct devices, newest event time.
pub fn fetch_summary_stats(client: &dyn TableClient) -> crate::error::Result<SummaryStats> {
    let mut spec = QuerySpec::logs();
    spec.range = Some(PageRange {
        offset: 0,
        limit: 1,
    });
    let page = client.query(&spec)?;

    let last_updated = page
        .rows
        .first()
        .map(normalize)
        .map(|record| record.display_time())
        .unwrap_or_else(|| TIME_PLACEHOLDER.to_string());

    let unique_devices = fetch_device_ids(client)?.len() as u64;

    Ok(SummaryStats {
        total_logs: page.count.unwrap_or(0),
        unique_devices,
        last_updated,
    })
}
