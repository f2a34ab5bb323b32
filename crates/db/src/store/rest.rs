//! Table store backed by the managed backend's REST interface.
//!
//! Rows are addressed as `{base_url}/rest/v1/{table}` with filters encoded as
//! `column=op.value` query parameters.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use super::{FilterOp, Query, StoreError, TableStore};

const RETURN_REPRESENTATION: &str = "return=representation";

#[derive(Clone)]
pub struct RestStoreConfig {
    /// Project URL, e.g. `https://abc.backend.example`
    pub base_url: String,
    /// Service-role key; sent as both `apikey` and bearer token.
    pub service_key: SecretString,
    pub timeout: Duration,
}

impl std::fmt::Debug for RestStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStoreConfig")
            .field("base_url", &self.base_url)
            .field("service_key", &"<secret>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct RestStore {
    http: Client,
    config: RestStoreConfig,
}

impl std::fmt::Debug for RestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStore")
            .field("http", &"<reqwest::Client>")
            .field("config", &self.config)
            .finish()
    }
}

impl RestStore {
    pub fn new(config: RestStoreConfig) -> Result<Self, StoreError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("workdesk/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self { http, config })
    }

    fn table_url(&self, table: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            table
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let key = self.config.service_key.expose_secret();
        builder.header("apikey", key).bearer_auth(key)
    }

    async fn send(&self, builder: RequestBuilder, table: &str) -> Result<Response, StoreError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            table = table,
            status = status.as_u16(),
            body = %body,
            "Backend returned error"
        );
        Err(StoreError::Remote {
            status: status.as_u16(),
            body,
        })
    }

    async fn rows(&self, response: Response) -> Result<Vec<Value>, StoreError> {
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))
    }
}

fn map_reqwest_error(e: reqwest::Error) -> StoreError {
    if e.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::Transport(e.to_string())
    }
}

fn scalar_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn list_param(values: &Value) -> String {
    let items: Vec<String> = match values {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                // quoted so commas and parentheses inside values survive
                Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
                other => scalar_param(other),
            })
            .collect(),
        other => vec![scalar_param(other)],
    };
    format!("({})", items.join(","))
}

/// Encode a [`Query`] as REST query parameters.
pub(crate) fn encode_query(query: &Query) -> Vec<(String, String)> {
    let mut params = Vec::with_capacity(query.filters.len() + 2);

    for filter in &query.filters {
        let value = match filter.op {
            FilterOp::IsNull => "is.null".to_string(),
            FilterOp::In => format!("in.{}", list_param(&filter.value)),
            op => format!("{}.{}", op.as_str(), scalar_param(&filter.value)),
        };
        params.push((filter.column.clone(), value));
    }

    if !query.order.is_empty() {
        let order = query
            .order
            .iter()
            .map(|o| {
                format!(
                    "{}.{}.nullslast",
                    o.column,
                    if o.ascending { "asc" } else { "desc" }
                )
            })
            .collect::<Vec<_>>()
            .join(",");
        params.push(("order".to_string(), order));
    }

    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }

    params
}

#[async_trait]
impl TableStore for RestStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let builder = self
            .http
            .get(self.table_url(table))
            .query(&[("select", "*")])
            .query(&encode_query(query));

        tracing::debug!(table = table, "Selecting rows");
        let response = self.send(builder, table).await?;
        self.rows(response).await
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        let builder = self
            .http
            .post(self.table_url(table))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&row);

        let response = self.send(builder, table).await?;
        self.rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::MissingRow(format!("insert into {table}")))
    }

    async fn update(
        &self,
        table: &str,
        query: &Query,
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let builder = self
            .http
            .patch(self.table_url(table))
            .query(&encode_query(query))
            .header("Prefer", RETURN_REPRESENTATION)
            .json(&patch);

        let response = self.send(builder, table).await?;
        self.rows(response).await
    }

    async fn upsert(&self, table: &str, row: Value, on_conflict: &str) -> Result<Value, StoreError> {
        let builder = self
            .http
            .post(self.table_url(table))
            .query(&[("on_conflict", on_conflict)])
            .header(
                "Prefer",
                format!("{RETURN_REPRESENTATION},resolution=merge-duplicates"),
            )
            .json(&row);

        let response = self.send(builder, table).await?;
        self.rows(response)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::MissingRow(format!("upsert into {table}")))
    }

    async fn delete(&self, table: &str, query: &Query) -> Result<u64, StoreError> {
        let builder = self
            .http
            .delete(self.table_url(table))
            .query(&encode_query(query))
            .header("Prefer", RETURN_REPRESENTATION);

        let response = self.send(builder, table).await?;
        Ok(self.rows(response).await?.len() as u64)
    }

    async fn health(&self) -> Result<(), StoreError> {
        let builder = self.http.get(format!(
            "{}/rest/v1/",
            self.config.base_url.trim_end_matches('/')
        ));
        self.send(builder, "<root>").await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_query_filters() {
        let query = Query::new()
            .eq("project_id", "p1")
            .gte("start", "2025-01-01T00:00:00Z")
            .is_null("column_id")
            .is_in("status", &["To Do", "a,b"])
            .order_by("position", true)
            .order_by("created_at", false)
            .limit(10);

        let params = encode_query(&query);
        assert_eq!(
            params,
            vec![
                ("project_id".to_string(), "eq.p1".to_string()),
                ("start".to_string(), "gte.2025-01-01T00:00:00Z".to_string()),
                ("column_id".to_string(), "is.null".to_string()),
                ("status".to_string(), r#"in.("To Do","a,b")"#.to_string()),
                (
                    "order".to_string(),
                    "position.asc.nullslast,created_at.desc.nullslast".to_string()
                ),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_numbers_and_bools_are_unquoted() {
        let params = encode_query(&Query::new().eq("position", 3).eq("read", false));
        assert_eq!(params[0].1, "eq.3");
        assert_eq!(params[1].1, "eq.false");
    }

    #[test]
    fn test_debug_hides_service_key() {
        let config = RestStoreConfig {
            base_url: "https://example.test".to_string(),
            service_key: SecretString::from("super-secret"),
            timeout: Duration::from_secs(5),
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
    }
}
