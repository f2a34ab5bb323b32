//! In-process table store.

use std::{
    cmp::Ordering,
    collections::HashMap,
    sync::{Arc, RwLock},
};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;

use super::{Filter, FilterOp, Query, StoreError, TableStore};

/// Keeps every table as a vector of JSON rows.
///
/// Writes to a table can be made to fail with [`MemoryStore::fail_writes_to`],
/// which is how tests exercise rollback paths.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Vec<Value>>>>,
    failing_tables: Arc<RwLock<HashMap<String, StoreError>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write to `table` fail with `error`.
    pub fn fail_writes_to(&self, table: &str, error: StoreError) {
        self.failing_tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(table.to_string(), error);
    }

    pub fn clear_failures(&self) {
        self.failing_tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(table)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn check_writable(&self, table: &str) -> Result<(), StoreError> {
        match self
            .failing_tables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(table)
        {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(s).ok()
}

/// Orders two JSON scalars the way the backend's column types would:
/// numbers numerically, timestamps chronologically, other strings lexically.
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => match (parse_timestamp(x), parse_timestamp(y)) {
            (Some(tx), Some(ty)) => Some(tx.cmp(&ty)),
            _ => Some(x.cmp(y)),
        },
        _ => None,
    }
}

fn field<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&Value::Null)
}

fn matches_filter(row: &Value, filter: &Filter) -> bool {
    let actual = field(row, &filter.column);
    let ord = compare_values(actual, &filter.value);
    match filter.op {
        FilterOp::Eq => ord == Some(Ordering::Equal),
        // SQL semantics: NULL <> x is not true
        FilterOp::Neq => !actual.is_null() && ord != Some(Ordering::Equal),
        FilterOp::Gt => ord == Some(Ordering::Greater),
        FilterOp::Gte => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
        FilterOp::Lt => ord == Some(Ordering::Less),
        FilterOp::Lte => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        FilterOp::In => match &filter.value {
            Value::Array(candidates) => candidates
                .iter()
                .any(|c| compare_values(actual, c) == Some(Ordering::Equal)),
            _ => false,
        },
        FilterOp::IsNull => actual.is_null(),
    }
}

fn matches_query(row: &Value, query: &Query) -> bool {
    query.filters.iter().all(|f| matches_filter(row, f))
}

fn merge_into(row: &mut Value, patch: &Value) {
    if let (Value::Object(target), Value::Object(changes)) = (row, patch) {
        for (key, value) in changes {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn sort_rows(rows: &mut [Value], query: &Query) {
    rows.sort_by(|a, b| {
        for order in &query.order {
            let (va, vb) = (field(a, &order.column), field(b, &order.column));
            // nulls sort last regardless of direction
            let ord = match (va.is_null(), vb.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) => return Ordering::Greater,
                (false, true) => return Ordering::Less,
                (false, false) => compare_values(va, vb).unwrap_or(Ordering::Equal),
            };
            let ord = if order.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read().unwrap_or_else(|e| e.into_inner());
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| matches_query(row, query))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        sort_rows(&mut rows, query);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        self.check_writable(table)?;
        if !row.is_object() {
            return Err(StoreError::Remote {
                status: 400,
                body: "row must be a JSON object".to_string(),
            });
        }
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        self.check_writable(table)?;
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let Some(rows) = tables.get_mut(table) else {
            return Ok(Vec::new());
        };

        let mut updated = Vec::new();
        for row in rows.iter_mut().filter(|row| matches_query(row, query)) {
            merge_into(row, &patch);
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> Result<Value, StoreError> {
        self.check_writable(table)?;
        let key = field(&row, on_conflict).clone();
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let rows = tables.entry(table.to_string()).or_default();

        if let Some(existing) = rows
            .iter_mut()
            .find(|r| compare_values(field(r, on_conflict), &key) == Some(Ordering::Equal))
        {
            merge_into(existing, &row);
            return Ok(existing.clone());
        }

        rows.push(row.clone());
        Ok(row)
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<u64, StoreError> {
        self.check_writable(table)?;
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|row| !matches_query(row, query));
        Ok((before - rows.len()) as u64)
    }

    async fn health(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, pos, due) in [
            ("a", 2, "2025-03-01T10:00:00Z"),
            ("b", 0, "2025-03-01T09:00:00.500Z"),
            ("c", 1, "2025-03-02T00:00:00+02:00"),
        ] {
            store
                .insert("tasks", json!({"id": id, "position": pos, "due": due, "column_id": null}))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_select_orders_and_limits() {
        let store = seeded().await;
        let rows = store
            .select("tasks", &Query::new().order_by("position", true).limit(2))
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_timestamps_compare_chronologically() {
        let store = seeded().await;
        // 09:00:00.500Z sorts before 10:00:00Z even though '.' < 'Z' lexically
        let rows = store
            .select(
                "tasks",
                &Query::new()
                    .lt("due", "2025-03-01T09:30:00Z")
                    .order_by("due", true),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "b");

        // +02:00 midnight is 22:00Z the previous day
        let rows = store
            .select("tasks", &Query::new().gte("due", "2025-03-01T21:00:00Z"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "c");
    }

    #[tokio::test]
    async fn test_update_merges_and_returns_rows() {
        let store = seeded().await;
        let updated = store
            .update(
                "tasks",
                &Query::new().is_in("id", &["a", "c"]),
                json!({"column_id": "col-1"}),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);

        let rows = store
            .select("tasks", &Query::new().is_null("column_id"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "b");
    }

    #[tokio::test]
    async fn test_upsert_merges_on_conflict_column() {
        let store = MemoryStore::new();
        store
            .upsert("profiles", json!({"id": "u1", "username": "old"}), "id")
            .await
            .unwrap();
        let merged = store
            .upsert("profiles", json!({"id": "u1", "full_name": "Ada"}), "id")
            .await
            .unwrap();
        assert_eq!(merged["username"], "old");
        assert_eq!(merged["full_name"], "Ada");
        assert_eq!(store.row_count("profiles"), 1);
    }

    #[tokio::test]
    async fn test_delete_counts_rows() {
        let store = seeded().await;
        let deleted = store
            .delete("tasks", &Query::new().neq("id", "a"))
            .await
            .unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.row_count("tasks"), 1);
    }

    #[tokio::test]
    async fn test_neq_skips_null_columns() {
        let store = seeded().await;
        store
            .update("tasks", &Query::new().eq("id", "a"), json!({"column_id": "col-1"}))
            .await
            .unwrap();

        let rows = store
            .select("tasks", &Query::new().neq("column_id", "col-2"))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], "a");
    }

    #[tokio::test]
    async fn test_failing_table_rejects_writes_but_not_reads() {
        let store = seeded().await;
        store.fail_writes_to("tasks", StoreError::Timeout);

        let err = store
            .update("tasks", &Query::new(), json!({"position": 9}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout));
        assert_eq!(store.select("tasks", &Query::new()).await.unwrap().len(), 3);

        store.clear_failures();
        assert!(store.delete("tasks", &Query::new()).await.is_ok());
    }
}
