pub mod sqlite;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::query::QuerySpec;
use crate::types::{Session, SignInOutcome};

pub use sqlite::SqliteTableStore;

/// A change pushed by the backend's realtime feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub record_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One page of raw rows plus the backend's total match count.
///
/// `count` is `None` when the backend did not (or could not) report one;
/// callers must treat that as "unknown", never as a confirmed zero.
#[derive(Debug, Clone, Default)]
pub struct TablePage {
    pub rows: Vec<Value>,
    pub count: Option<u64>,
}

pub type ChangeCallback = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Scoped hold on a realtime subscription or session watch.
///
/// Releases on drop, so a view that owns one cannot leak its subscription
/// on teardown. `release` exists for callers that want the unsubscribe to
/// read explicitly.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new<F: FnOnce() + Send + 'static>(release: F) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn release(mut self) {
        if let Some(f) = self.release.take() {
            f();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(f) = self.release.take() {
            f();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// The hosted data collaborator: declarative queries plus a change feed.
///
/// The production implementation talks to the managed service; the in-repo
/// [`SqliteTableStore`] backs tests and local runs.
pub trait TableClient: Send + Sync {
    fn query(&self, spec: &QuerySpec) -> Result<TablePage>;

    fn subscribe(
        &self,
        table: &str,
        kinds: &[ChangeKind],
        callback: ChangeCallback,
    ) -> Subscription;
}

pub type SessionCallback = Box<dyn Fn(Option<Session>) + Send + Sync>;

/// The hosted auth collaborator. Session presence gates all dashboard
/// rendering; the crate only consumes it.
pub trait AuthClient: Send + Sync {
    fn get_session(&self) -> Result<Option<Session>>;

    fn on_session_change(&self, callback: SessionCallback) -> Subscription;

    fn sign_in_with_email(&self, email: &str) -> Result<SignInOutcome>;

    fn sign_out(&self) -> Result<()>;
}
