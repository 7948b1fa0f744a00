use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::backend::{ChangeKind, Subscription, TableClient};

/// All change kinds; the bridge re-fetches on any of them.
const ALL_KINDS: &[ChangeKind] = &[ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete];

struct BridgeState {
    window: Duration,
    last_fired: Mutex<Option<Instant>>,
    pending: AtomicUsize,
    refresh: Box<dyn Fn() + Send + Sync>,
}

impl BridgeState {
    fn notify_at(&self, now: Instant) {
        let mut last = match self.last_fired.lock() {
            Ok(guard) => guard,
            Err(_) => return,
        };
        let due = last
            .map(|at| now.duration_since(at) >= self.window)
            .unwrap_or(true);
        if due {
            *last = Some(now);
            self.pending.store(0, Ordering::SeqCst);
            drop(last);
            (self.refresh)();
        } else {
            self.pending.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn flush_at(&self, now: Instant) -> bool {
        if self.pending.load(Ordering::SeqCst) == 0 {
            return false;
        }
        let mut last = match self.last_fired.lock() {
            Ok(guard) => guard,
            Err(_) => return false,
        };
        let due = last
            .map(|at| now.duration_since(at) >= self.window)
            .unwrap_or(true);
        if !due {
            return false;
        }
        *last = Some(now);
        self.pending.store(0, Ordering::SeqCst);
        drop(last);
        (self.refresh)();
        true
    }
}

/// Bridges the backend change feed to the dashboard's fetch path.
///
/// Every insert/update/delete on the log table triggers the registered
/// refresh, the same path a manual filter change takes, instead of
/// incremental patching, so the derived metrics stay trivially consistent.
/// Notification bursts are coalesced into at most one refresh per debounce
/// window; a burst that lands inside the window is caught up by
/// [`flush_pending`](Self::flush_pending). The subscription is released
/// when the bridge drops.
pub struct LiveUpdateBridge {
    state: Arc<BridgeState>,
    subscription: Option<Subscription>,
}

impl LiveUpdateBridge {
    pub fn new<F>(client: &dyn TableClient, table: &str, window: Duration, refresh: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        let state = Arc::new(BridgeState {
            window,
            last_fired: Mutex::new(None),
            pending: AtomicUsize::new(0),
            refresh: Box::new(refresh),
        });

        let handler = Arc::clone(&state);
        let subscription = client.subscribe(
            table,
            ALL_KINDS,
            Box::new(move |event| {
                log::debug!("change event on {}: {:?}", event.table, event.kind);
                handler.notify_at(Instant::now());
            }),
        );

        Self {
            state,
            subscription: Some(subscription),
        }
    }

    /// Fire the refresh for notifications suppressed inside the debounce
    /// window. Returns whether a refresh ran.
    pub fn flush_pending(&self) -> bool {
        self.state.flush_at(Instant::now())
    }

    /// Number of notifications coalesced since the last refresh.
    pub fn suppressed(&self) -> usize {
        self.state.pending.load(Ordering::SeqCst)
    }

    /// Release the subscription explicitly; dropping the bridge does the
    /// same.
    pub fn release(mut self) {
        if let Some(sub) = self.subscription.take() {
            sub.release();
        }
    }
}
