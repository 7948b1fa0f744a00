use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use serde_json::{json, Value};

use crate::backend::{ChangeEvent, ChangeKind, Subscription, TableClient, TablePage};
use crate::error::{AuditError, Result};
use crate::query::{Predicate, QuerySpec};
use crate::time;

/// Columns of the local `logs` table, keyed by their wire names.
const LOG_COLUMNS: &[&str] = &[
    "id",
    "timestamp",
    "device_key",
    "active_app",
    "browser_url",
    "is_suspicious",
    "is_low_risk",
    "suspicious_reasons",
    "location_data",
    "screenshot",
    "browser_history",
];

type Subscriber = (String, Vec<ChangeKind>, Arc<dyn Fn(&ChangeEvent) + Send + Sync>);

/// SQLite-backed stand-in for the hosted table service.
///
/// Serves the same `QuerySpec` contract the managed backend would and
/// dispatches change events to subscribers on every write, so the full
/// fetch/normalize/subscribe pipeline runs against it in tests and local
/// sessions.
pub struct SqliteTableStore {
    conn: Mutex<Connection>,
    subscribers: Arc<Mutex<HashMap<u64, Subscriber>>>,
    next_subscriber: AtomicU64,
    next_row: AtomicU64,
}

impl SqliteTableStore {
    /// Create a fresh store at the given path, replacing any existing file.
    pub fn create(db_path: &Path) -> Result<Self> {
        if db_path.exists() {
            std::fs::remove_file(db_path).map_err(AuditError::Io)?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| AuditError::Database(e.to_string()))?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            "#,
        )
        .map_err(|e| AuditError::Database(e.to_string()))?;

        Self::init_schema(&conn)?;
        Ok(Self::wrap(conn))
    }

    /// In-memory store, the usual choice in tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AuditError::Database(e.to_string()))?;
        Self::init_schema(&conn)?;
        Ok(Self::wrap(conn))
    }

    fn wrap(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            next_subscriber: AtomicU64::new(1),
            next_row: AtomicU64::new(1),
        }
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS logs (
                id TEXT PRIMARY KEY,
                ts_unix INTEGER NOT NULL,
                timestamp TEXT NOT NULL,
                device_key TEXT NOT NULL DEFAULT '',
                active_app TEXT,
                browser_url TEXT,
                is_suspicious INTEGER NOT NULL DEFAULT 0,
                is_low_risk INTEGER NOT NULL DEFAULT 0,
                suspicious_reasons TEXT,
                location_data TEXT,
                screenshot TEXT,
                browser_history TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_logs_ts ON logs(ts_unix);
            CREATE INDEX IF NOT EXISTS idx_logs_device ON logs(device_key);
            CREATE INDEX IF NOT EXISTS idx_logs_suspicious ON logs(is_suspicious);
            "#,
        )
        .map_err(|e| AuditError::Database(e.to_string()))
    }

    /// Insert one raw record as the ingestion side would write it, then
    /// notify subscribers. Returns the record id (generated when absent).
    pub fn insert_log(&self, raw: &Value) -> Result<String> {
        let id = match raw.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => format!("log-{}", self.next_row.fetch_add(1, Ordering::SeqCst)),
        };

        let raw_ts = raw
            .get("timestamp")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let ts_unix = time::parse_timestamp(&raw_ts)
            .map(|dt| time::epoch_ms(&dt))
            .unwrap_or(0);

        let device = raw
            .get("device_key")
            .or_else(|| raw.get("device_id"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let text = |name: &str| -> Option<String> {
            raw.get(name)
                .and_then(Value::as_str)
                .map(|s| s.to_string())
        };
        let flag = |name: &str| -> i64 {
            raw.get(name).and_then(Value::as_bool).unwrap_or(false) as i64
        };
        let json_text = |name: &str| -> Option<String> {
            raw.get(name)
                .filter(|v| !v.is_null())
                .map(|v| v.to_string())
        };

        {
            let conn = self.conn.lock().map_err(|_| AuditError::StatePoisoned)?;
            conn.execute(
                "INSERT INTO logs (id, ts_unix, timestamp, device_key, active_app, browser_url, \
                 is_suspicious, is_low_risk, suspicious_reasons, location_data, screenshot, browser_history) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                rusqlite::params![
                    id,
                    ts_unix,
                    raw_ts,
                    device,
                    text("active_app"),
                    text("browser_url"),
                    flag("is_suspicious"),
                    flag("is_low_risk"),
                    json_text("suspicious_reasons"),
                    json_text("location_data"),
                    text("screenshot").or_else(|| text("screenshot_url")),
                    json_text("browser_history"),
                ],
            )
            .map_err(|e| AuditError::Database(e.to_string()))?;
        }

        self.notify(ChangeKind::Insert, Some(id.clone()));
        Ok(id)
    }

    /// Delete one record by id, notifying subscribers when a row went away.
    pub fn delete_log(&self, id: &str) -> Result<bool> {
        let removed = {
            let conn = self.conn.lock().map_err(|_| AuditError::StatePoisoned)?;
            conn.execute("DELETE FROM logs WHERE id = ?1", rusqlite::params![id])
                .map_err(|e| AuditError::Database(e.to_string()))?
        };
        if removed > 0 {
            self.notify(ChangeKind::Delete, Some(id.to_string()));
        }
        Ok(removed > 0)
    }

    /// Total rows, unfiltered.
    pub fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().map_err(|_| AuditError::StatePoisoned)?;
        conn.query_row("SELECT COUNT(*) FROM logs", [], |r| r.get::<_, i64>(0))
            .map(|n| n as u64)
            .map_err(|e| AuditError::Database(e.to_string()))
    }

    fn notify(&self, kind: ChangeKind, record_id: Option<String>) {
        let event = ChangeEvent {
            table: "logs".to_string(),
            kind,
            record_id,
        };
        // Clone callbacks out so handlers can query or re-subscribe without
        // deadlocking on the registry lock.
        let callbacks: Vec<Arc<dyn Fn(&ChangeEvent) + Send + Sync>> = match self.subscribers.lock()
        {
            Ok(subs) => subs
                .values()
                .filter(|(table, kinds, _)| table == &event.table && kinds.contains(&kind))
                .map(|(_, _, cb)| Arc::clone(cb))
                .collect(),
            Err(_) => return,
        };
        for cb in callbacks {
            cb(&event);
        }
    }

    fn build_conditions(
        predicates: &[Predicate],
    ) -> Result<(Vec<String>, Vec<Box<dyn rusqlite::ToSql>>)> {
        let mut conditions: Vec<String> = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        for predicate in predicates {
            match predicate {
                Predicate::Eq { column, value } => {
                    Self::push_comparison(&mut conditions, &mut params, column, "=", value)?;
                }
                Predicate::Neq { column, value } => {
                    Self::push_comparison(&mut conditions, &mut params, column, "!=", value)?;
                }
                Predicate::Gte { column, value } => {
                    Self::push_comparison(&mut conditions, &mut params, column, ">=", value)?;
                }
                Predicate::Lte { column, value } => {
                    Self::push_comparison(&mut conditions, &mut params, column, "<=", value)?;
                }
                Predicate::NotNull { column } => {
                    let column = Self::resolve_column(column)?;
                    conditions.push(format!("{} IS NOT NULL", column));
                }
            }
        }

        Ok((conditions, params))
    }

    fn push_comparison(
        conditions: &mut Vec<String>,
        params: &mut Vec<Box<dyn rusqlite::ToSql>>,
        column: &str,
        op: &str,
        value: &Value,
    ) -> Result<()> {
        // Timestamp bounds compare against the numeric sort key.
        if column == "timestamp" {
            let ms = match value {
                Value::Number(n) => n
                    .as_i64()
                    .ok_or_else(|| AuditError::InvalidFilter("non-integer timestamp".into()))?,
                Value::String(s) => time::parse_timestamp(s)
                    .map(|dt| time::epoch_ms(&dt))
                    .ok_or_else(|| {
                        AuditError::InvalidFilter(format!("unparseable timestamp bound '{}'", s))
                    })?,
                other => {
                    return Err(AuditError::InvalidFilter(format!(
                        "unsupported timestamp bound: {}",
                        other
                    )))
                }
            };
            conditions.push(format!("ts_unix {} ?", op));
            params.push(Box::new(ms));
            return Ok(());
        }

        let column = Self::resolve_column(column)?;
        conditions.push(format!("{} {} ?", column, op));
        match value {
            Value::String(s) => params.push(Box::new(s.clone())),
            Value::Bool(b) => params.push(Box::new(*b as i64)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    params.push(Box::new(i));
                } else {
                    params.push(Box::new(n.as_f64().unwrap_or(0.0)));
                }
            }
            other => {
                return Err(AuditError::InvalidFilter(format!(
                    "unsupported predicate value: {}",
                    other
                )))
            }
        }
        Ok(())
    }

    /// Column names come from query plans, never verbatim from users, but
    /// they are still interpolated into SQL, so the whitelist stays strict.
    fn resolve_column(column: &str) -> Result<&'static str> {
        let canonical = if column == "device_id" {
            "device_key"
        } else {
            column
        };
        LOG_COLUMNS
            .iter()
            .find(|c| **c == canonical)
            .copied()
            .ok_or_else(|| AuditError::InvalidFilter(format!("unknown column '{}'", column)))
    }

    fn row_to_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<Value> {
        let parse_json = |text: Option<String>| -> Value {
            text.and_then(|t| serde_json::from_str(&t).ok())
                .unwrap_or(Value::Null)
        };
        let opt_text = |v: Option<String>| -> Value {
            v.map(Value::String).unwrap_or(Value::Null)
        };

        Ok(json!({
            "id": row.get::<_, String>(0)?,
            "timestamp": row.get::<_, String>(2)?,
            "device_key": row.get::<_, String>(3)?,
            "active_app": opt_text(row.get::<_, Option<String>>(4)?),
            "browser_url": opt_text(row.get::<_, Option<String>>(5)?),
            "is_suspicious": row.get::<_, i64>(6)? != 0,
            "is_low_risk": row.get::<_, i64>(7)? != 0,
            "suspicious_reasons": parse_json(row.get::<_, Option<String>>(8)?),
            "location_data": parse_json(row.get::<_, Option<String>>(9)?),
            "screenshot": opt_text(row.get::<_, Option<String>>(10)?),
            "browser_history": parse_json(row.get::<_, Option<String>>(11)?),
        }))
    }
}

impl TableClient for SqliteTableStore {
    fn query(&self, spec: &QuerySpec) -> Result<TablePage> {
        if spec.table != "logs" {
            return Err(AuditError::InvalidFilter(format!(
                "unknown table '{}'",
                spec.table
            )));
        }

        let (conditions, params) = Self::build_conditions(&spec.predicates)?;
        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let conn = self.conn.lock().map_err(|_| AuditError::StatePoisoned)?;

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p.as_ref()).collect();

        let count: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM logs {}", where_clause),
                param_refs.as_slice(),
                |r| r.get(0),
            )
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let order = if spec.sort.ascending { "ASC" } else { "DESC" };
        let order_column = if spec.sort.column == "timestamp" {
            "ts_unix"
        } else {
            Self::resolve_column(&spec.sort.column)?
        };

        let mut sql = format!(
            "SELECT * FROM logs {} ORDER BY {} {}, id {}",
            where_clause, order_column, order, order
        );

        let mut all_params = params;
        if let Some(range) = spec.range {
            sql.push_str(" LIMIT ? OFFSET ?");
            all_params.push(Box::new(range.limit as i64));
            all_params.push(Box::new(range.offset as i64));
        }

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AuditError::Database(e.to_string()))?;

        let all_refs: Vec<&dyn rusqlite::ToSql> =
            all_params.iter().map(|p| p.as_ref()).collect();

        let mut rows: Vec<Value> = stmt
            .query_map(all_refs.as_slice(), Self::row_to_json)
            .map_err(|e| AuditError::Database(e.to_string()))?
            .filter_map(|r| r.ok())
            .collect();

        if !spec.columns.is_empty() {
            for row in rows.iter_mut() {
                if let Value::Object(map) = row {
                    map.retain(|k, _| spec.columns.iter().any(|c| c == k));
                }
            }
        }

        Ok(TablePage {
            rows,
            count: Some(count as u64),
        })
    }

    fn subscribe(
        &self,
        table: &str,
        kinds: &[ChangeKind],
        callback: crate::backend::ChangeCallback,
    ) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.insert(id, (table.to_string(), kinds.to_vec(), Arc::from(callback)));
        }

        let registry = Arc::clone(&self.subscribers);
        Subscription::new(move || {
            if let Ok(mut subs) = registry.lock() {
                subs.remove(&id);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{PageRange, Sort};
    use std::sync::atomic::AtomicUsize;

    fn store_with_rows() -> SqliteTableStore {
        let store = SqliteTableStore::open_in_memory().unwrap();
        store
            .insert_log(&json!({
                "id": "a1",
                "timestamp": "2024-08-24T10:00:00Z",
                "device_key": "dev-a",
                "active_app": "vscode",
                "browser_url": "https://github.com",
            }))
            .unwrap();
        store
            .insert_log(&json!({
                "id": "a2",
                "timestamp": "2024-08-24T11:00:00Z",
                "device_key": "dev-a",
                "active_app": "youtube",
                "is_suspicious": true,
                "suspicious_reasons": ["unusual timing"],
            }))
            .unwrap();
        store
            .insert_log(&json!({
                "id": "b1",
                "timestamp": "2024-08-24T12:00:00Z",
                "device_key": "dev-b",
                "location_data": {"latitude": 19.0, "longitude": 72.8, "city": "Mumbai"},
            }))
            .unwrap();
        store
    }

    #[test]
    fn test_query_all_sorted_desc() {
        let store = store_with_rows();
        let page = store.query(&QuerySpec::logs()).unwrap();
        assert_eq!(page.count, Some(3));
        let ids: Vec<&str> = page
            .rows
            .iter()
            .map(|r| r["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["b1", "a2", "a1"]);
    }

    #[test]
    fn test_device_equality_predicate() {
        let store = store_with_rows();
        let mut spec = QuerySpec::logs();
        spec.predicates.push(Predicate::Eq {
            column: "device_key".to_string(),
            value: json!("dev-a"),
        });
        let page = store.query(&spec).unwrap();
        assert_eq!(page.count, Some(2));
    }

    #[test]
    fn test_timestamp_range_predicates() {
        let store = store_with_rows();
        let mut spec = QuerySpec::logs();
        spec.predicates.push(Predicate::Gte {
            column: "timestamp".to_string(),
            value: json!("2024-08-24T10:30:00Z"),
        });
        spec.predicates.push(Predicate::Lte {
            column: "timestamp".to_string(),
            value: json!("2024-08-24T11:30:00Z"),
        });
        let page = store.query(&spec).unwrap();
        assert_eq!(page.count, Some(1));
        assert_eq!(page.rows[0]["id"], "a2");
    }

    #[test]
    fn test_not_null_predicate() {
        let store = store_with_rows();
        let mut spec = QuerySpec::logs();
        spec.predicates.push(Predicate::NotNull {
            column: "location_data".to_string(),
        });
        let page = store.query(&spec).unwrap();
        assert_eq!(page.count, Some(1));
        assert_eq!(page.rows[0]["location_data"]["city"], "Mumbai");
    }

    #[test]
    fn test_range_window_with_exact_count() {
        let store = store_with_rows();
        let mut spec = QuerySpec::logs();
        spec.range = Some(PageRange {
            offset: 1,
            limit: 1,
        });
        let page = store.query(&spec).unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0]["id"], "a2");
        // count stays the full match count, not the window size
        assert_eq!(page.count, Some(3));
    }

    #[test]
    fn test_column_projection() {
        let store = store_with_rows();
        let mut spec = QuerySpec::logs();
        spec.columns = vec!["device_key".to_string()];
        let page = store.query(&spec).unwrap();
        let row = page.rows[0].as_object().unwrap();
        assert_eq!(row.len(), 1);
        assert!(row.contains_key("device_key"));
    }

    #[test]
    fn test_unknown_table_and_column_rejected() {
        let store = store_with_rows();
        let mut spec = QuerySpec::logs();
        spec.table = "users".to_string();
        assert!(store.query(&spec).is_err());

        let mut spec = QuerySpec::logs();
        spec.predicates.push(Predicate::Eq {
            column: "password; DROP TABLE logs".to_string(),
            value: json!("x"),
        });
        assert!(store.query(&spec).is_err());
    }

    #[test]
    fn test_ascending_sort_override() {
        let store = store_with_rows();
        let mut spec = QuerySpec::logs();
        spec.sort = Sort {
            column: "timestamp".to_string(),
            ascending: true,
        };
        let page = store.query(&spec).unwrap();
        assert_eq!(page.rows[0]["id"], "a1");
    }

    #[test]
    fn test_insert_notifies_subscribers() {
        let store = store_with_rows();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let sub = store.subscribe(
            "logs",
            &[ChangeKind::Insert],
            Box::new(move |event| {
                assert_eq!(event.kind, ChangeKind::Insert);
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        store
            .insert_log(&json!({"timestamp": "2024-08-24T13:00:00Z"}))
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        // deletes are not in this subscriber's kinds
        store.delete_log("a1").unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        drop(sub);
        store
            .insert_log(&json!({"timestamp": "2024-08-24T14:00:00Z"}))
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let store = SqliteTableStore::open_in_memory().unwrap();
        let a = store
            .insert_log(&json!({"timestamp": "2024-08-24T10:00:00Z"}))
            .unwrap();
        let b = store
            .insert_log(&json!({"timestamp": "2024-08-24T11:00:00Z"}))
            .unwrap();
        assert_ne!(a, b);
        assert_eq!(store.count().unwrap(), 2);
    }

    #[test]
    fn test_file_backed_store() {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!("test_audit_{}.db", nanos));

        let store = SqliteTableStore::create(&path).unwrap();
        store
            .insert_log(&json!({"id": "x", "timestamp": "2024-08-24T10:00:00Z"}))
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);

        std::fs::remove_file(&path).ok();
    }
}
