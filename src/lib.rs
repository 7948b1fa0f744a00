//! View-independent core of the SilentAudit activity dashboard.
//!
//! Everything the rendering layer needs sits behind plain data structures:
//! raw backend rows are normalized once at [`normalize::normalize`], queries
//! are described declaratively and executed by a [`backend::TableClient`],
//! and the [`dashboard::DashboardController`] owns filter/pagination state
//! and the fetch path, including the realtime re-fetch bridge.

pub mod backend;
pub mod dashboard;
pub mod devices;
pub mod error;
pub mod export;
pub mod live;
pub mod metrics;
pub mod normalize;
pub mod query;
pub mod state;
pub mod time;
pub mod types;

pub use backend::{AuthClient, SqliteTableStore, Subscription, TableClient};
pub use dashboard::{fetch_logs, DashboardController, LogPage, LogViewState};
pub use error::{AuditError, Result};
pub use live::LiveUpdateBridge;
pub use normalize::normalize;
pub use query::{build_log_query, Pager};
pub use state::{AppState, Preferences, Theme};
pub use types::{FilterSpec, LogRecord, PageWindow, RiskLevel};
