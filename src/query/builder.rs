use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::time::{self, RangeBound};
use crate::types::{FilterSpec, PageWindow, RiskLevel};

pub const LOGS_TABLE: &str = "logs";

/// One declarative constraint a backend client can push down.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "op")]
pub enum Predicate {
    Eq { column: String, value: Value },
    Neq { column: String, value: Value },
    Gte { column: String, value: Value },
    Lte { column: String, value: Value },
    NotNull { column: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Sort {
    pub column: String,
    pub ascending: bool,
}

impl Sort {
    pub fn timestamp_desc() -> Self {
        Self {
            column: "timestamp".to_string(),
            ascending: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageRange {
    pub offset: u64,
    pub limit: u64,
}

/// Opaque query description consumable by any [`crate::backend::TableClient`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub table: String,
    /// Column projection; empty means all columns.
    pub columns: Vec<String>,
    pub predicates: Vec<Predicate>,
    pub sort: Sort,
    pub range: Option<PageRange>,
}

impl QuerySpec {
    pub fn logs() -> Self {
        Self {
            table: LOGS_TABLE.to_string(),
            columns: Vec::new(),
            predicates: Vec::new(),
            sort: Sort::timestamp_desc(),
            range: None,
        }
    }
}

/// A built log query: the pushed-down spec plus the residue that has to be
/// applied client-side after normalization.
///
/// Free-text search (an OR across two columns) and the risk level (a derived
/// field) cannot be expressed as backend predicates. When either is present
/// the backend count no longer matches the visible rows, so
/// `count_is_exact` is false: a known limitation of the pipeline, surfaced
/// rather than silently corrected.
#[derive(Debug, Clone)]
pub struct LogQueryPlan {
    pub spec: QuerySpec,
    pub client_search: Option<String>,
    pub client_risk: Option<RiskLevel>,
    pub count_is_exact: bool,
}

/// Translate a [`FilterSpec`] and [`PageWindow`] into a backend query.
///
/// Equality on device, inclusive timestamp range (unparseable bounds are
/// skipped, matching the permissive filter handling of the log table), sort
/// by timestamp descending, and an `[offset, offset+page_size)` window.
pub fn build_log_query(filter: &FilterSpec, window: &PageWindow) -> LogQueryPlan {
    let mut spec = QuerySpec::logs();

    if let Some(device) = filter.device_id.as_deref().filter(|d| !d.is_empty()) {
        spec.predicates.push(Predicate::Eq {
            column: "device_key".to_string(),
            value: json!(device),
        });
    }

    if let Some(start) = filter.date_start.as_deref().filter(|s| !s.is_empty()) {
        match time::bound_epoch_ms(start, RangeBound::Start) {
            Ok(ms) => spec.predicates.push(Predicate::Gte {
                column: "timestamp".to_string(),
                value: json!(ms),
            }),
            Err(e) => log::warn!("ignoring unparseable start bound '{}': {}", start, e),
        }
    }

    if let Some(end) = filter.date_end.as_deref().filter(|s| !s.is_empty()) {
        match time::bound_epoch_ms(end, RangeBound::End) {
            Ok(ms) => spec.predicates.push(Predicate::Lte {
                column: "timestamp".to_string(),
                value: json!(ms),
            }),
            Err(e) => log::warn!("ignoring unparseable end bound '{}': {}", end, e),
        }
    }

    let page = window.page.max(1) as u64;
    let page_size = window.page_size.max(1) as u64;
    spec.range = Some(PageRange {
        offset: (page - 1) * page_size,
        limit: page_size,
    });

    let client_search = filter
        .search_query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);
    let client_risk = filter.risk_level;
    let count_is_exact = client_search.is_none() && client_risk.is_none();

    LogQueryPlan {
        spec,
        client_search,
        client_risk,
        count_is_exact,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter_builds_window_only() {
        let plan = build_log_query(&FilterSpec::default(), &PageWindow::default());
        assert!(plan.spec.predicates.is_empty());
        assert_eq!(
            plan.spec.range,
            Some(PageRange {
                offset: 0,
                limit: 10
            })
        );
        assert!(!plan.spec.sort.ascending);
        assert!(plan.count_is_exact);
    }

    #[test]
    fn test_device_filter_pushed_down() {
        let filter = FilterSpec {
            device_id: Some("dev-a".to_string()),
            ..Default::default()
        };
        let plan = build_log_query(&filter, &PageWindow::default());
        assert_eq!(
            plan.spec.predicates,
            vec![Predicate::Eq {
                column: "device_key".to_string(),
                value: json!("dev-a"),
            }]
        );
    }

    #[test]
    fn test_date_range_inclusive() {
        let filter = FilterSpec {
            date_start: Some("2024-08-01".to_string()),
            date_end: Some("2024-08-31".to_string()),
            ..Default::default()
        };
        let plan = build_log_query(&filter, &PageWindow::default());
        assert_eq!(plan.spec.predicates.len(), 2);
        let (lo, hi) = match (&plan.spec.predicates[0], &plan.spec.predicates[1]) {
            (Predicate::Gte { value: lo, .. }, Predicate::Lte { value: hi, .. }) => {
                (lo.as_i64().unwrap(), hi.as_i64().unwrap())
            }
            other => panic!("unexpected predicates: {:?}", other),
        };
        // the end bound covers the whole last day
        let late = crate::time::parse_timestamp("2024-08-31T23:30:00")
            .unwrap()
            .timestamp_millis();
        assert!(lo < late && late <= hi);
    }

    #[test]
    fn test_unparseable_bound_skipped() {
        let filter = FilterSpec {
            date_start: Some("last tuesday".to_string()),
            ..Default::default()
        };
        let plan = build_log_query(&filter, &PageWindow::default());
        assert!(plan.spec.predicates.is_empty());
    }

    #[test]
    fn test_search_becomes_client_residue() {
        let filter = FilterSpec {
            search_query: Some("github".to_string()),
            ..Default::default()
        };
        let plan = build_log_query(&filter, &PageWindow::default());
        assert!(plan.spec.predicates.is_empty());
        assert_eq!(plan.client_search.as_deref(), Some("github"));
        assert!(!plan.count_is_exact);
    }

    #[test]
    fn test_blank_search_is_no_constraint() {
        let filter = FilterSpec {
            search_query: Some("   ".to_string()),
            ..Default::default()
        };
        let plan = build_log_query(&filter, &PageWindow::default());
        assert!(plan.client_search.is_none());
        assert!(plan.count_is_exact);
    }

    #[test]
    fn test_page_window_offset() {
        let window = PageWindow {
            page: 3,
            page_size: 25,
        };
        let plan = build_log_query(&FilterSpec::default(), &window);
        assert_eq!(
            plan.spec.range,
            Some(PageRange {
                offset: 50,
                limit: 25
            })
        );
    }
}
