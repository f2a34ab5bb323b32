//! Row access to the managed backend's tables.
//!
//! Every table is reached through [`TableStore`], which speaks JSON rows and a
//! small filter language mirroring what the backend's REST layer accepts.
//! [`RestStore`] talks to the real backend; [`MemoryStore`] keeps rows in
//! process with the same filter semantics.

mod memory;
mod rest;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryStore;
pub use rest::{RestStore, RestStoreConfig};

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Backend request timed out")]
    Timeout,
    #[error("Backend request failed: {0}")]
    Transport(String),
    #[error("Backend returned error: HTTP {status} - {body}")]
    Remote { status: u16, body: String },
    #[error("Failed to decode backend response: {0}")]
    Decode(String),
    #[error("Backend returned no row for {0}")]
    MissingRow(String),
}

impl StoreError {
    /// Returns true if the request may succeed when repeated unchanged.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) => true,
            Self::Remote { status, .. } => matches!(status, 429 | 502 | 503 | 504),
            Self::Decode(_) | Self::MissingRow(_) => false,
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Decode(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    IsNull,
}

impl FilterOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::In => "in",
            FilterOp::IsNull => "is",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub op: FilterOp,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

/// Row selection: filters are ANDed together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub order: Vec<Order>,
    pub limit: Option<usize>,
}

fn to_value<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    fn filter(mut self, column: &str, op: FilterOp, value: Value) -> Self {
        self.filters.push(Filter {
            column: column.to_string(),
            op,
            value,
        });
        self
    }

    pub fn eq<T: Serialize>(self, column: &str, value: T) -> Self {
        self.filter(column, FilterOp::Eq, to_value(value))
    }

    pub fn neq<T: Serialize>(self, column: &str, value: T) -> Self {
        self.filter(column, FilterOp::Neq, to_value(value))
    }

    pub fn gt<T: Serialize>(self, column: &str, value: T) -> Self {
        self.filter(column, FilterOp::Gt, to_value(value))
    }

    pub fn gte<T: Serialize>(self, column: &str, value: T) -> Self {
        self.filter(column, FilterOp::Gte, to_value(value))
    }

    pub fn lt<T: Serialize>(self, column: &str, value: T) -> Self {
        self.filter(column, FilterOp::Lt, to_value(value))
    }

    pub fn lte<T: Serialize>(self, column: &str, value: T) -> Self {
        self.filter(column, FilterOp::Lte, to_value(value))
    }

    pub fn is_in<T: Serialize>(self, column: &str, values: &[T]) -> Self {
        let list = values.iter().map(to_value).collect();
        self.filter(column, FilterOp::In, Value::Array(list))
    }

    pub fn is_null(self, column: &str) -> Self {
        self.filter(column, FilterOp::IsNull, Value::Null)
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push(Order {
            column: column.to_string(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Table-level operations against the managed backend.
///
/// `insert`, `update` and `upsert` return the stored representation of the
/// affected rows so callers never re-read after a write.
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError>;

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError>;

    async fn update(&self, table: &str, query: &Query, patch: Value)
    -> Result<Vec<Value>, StoreError>;

    /// Insert, or merge into the row whose `on_conflict` column matches.
    async fn upsert(&self, table: &str, row: Value, on_conflict: &str)
    -> Result<Value, StoreError>;

    async fn delete(&self, table: &str, query: &Query) -> Result<u64, StoreError>;

    async fn health(&self) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_query_builder_collects_filters_in_order() {
        let id = Uuid::new_v4();
        let query = Query::new()
            .eq("project_id", id)
            .is_in("status", &["todo", "done"])
            .order_by("position", true)
            .limit(5);

        assert_eq!(query.filters.len(), 2);
        assert_eq!(query.filters[0].value, Value::String(id.to_string()));
        assert_eq!(query.filters[1].op, FilterOp::In);
        assert_eq!(query.order[0].column, "position");
        assert_eq!(query.limit, Some(5));
    }

    #[test]
    fn test_transient_errors() {
        assert!(StoreError::Timeout.is_transient());
        assert!(StoreError::Transport("reset".into()).is_transient());
        assert!(
            StoreError::Remote {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !StoreError::Remote {
                status: 409,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!StoreError::Decode("bad".into()).is_transient());
    }
}
