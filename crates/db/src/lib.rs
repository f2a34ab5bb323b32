use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::info;

pub mod models;
pub mod retry;
pub mod store;
pub mod validation;

pub use retry::{RetryConfig, with_retry};
pub use store::{MemoryStore, Query, RestStore, RestStoreConfig, StoreError, TableStore};

/// Typed access to the managed backend.
///
/// Cheap to clone; every clone shares the same underlying store.
#[derive(Clone)]
pub struct DBService {
    store: Arc<dyn TableStore>,
    retry: RetryConfig,
}

impl std::fmt::Debug for DBService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DBService")
            .field("store", &"<dyn TableStore>")
            .field("retry", &self.retry)
            .finish()
    }
}

impl DBService {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            store,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn rest(config: RestStoreConfig) -> Result<Self, StoreError> {
        info!(base_url = %config.base_url, "Using REST backend");
        Ok(Self::new(Arc::new(RestStore::new(config)?)))
    }

    /// Backend kept entirely in process.
    pub fn memory(store: MemoryStore) -> Self {
        Self::new(Arc::new(store)).with_retry_config(RetryConfig::disabled())
    }

    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Query,
    ) -> Result<Vec<T>, StoreError> {
        let rows = with_retry(&self.retry, table, || self.store.select(table, &query)).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }

    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Query,
    ) -> Result<Option<T>, StoreError> {
        Ok(self.select(table, query.limit(1)).await?.into_iter().next())
    }

    pub async fn insert<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        row: &B,
    ) -> Result<T, StoreError> {
        let row = self.store.insert(table, serde_json::to_value(row)?).await?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn update<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Query,
        patch: Value,
    ) -> Result<Vec<T>, StoreError> {
        let rows = self.store.update(table, &query, patch).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(StoreError::from))
            .collect()
    }

    pub async fn update_one<T: DeserializeOwned>(
        &self,
        table: &str,
        query: Query,
        patch: Value,
    ) -> Result<Option<T>, StoreError> {
        Ok(self.update(table, query, patch).await?.into_iter().next())
    }

    pub async fn upsert<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        row: &B,
        on_conflict: &str,
    ) -> Result<T, StoreError> {
        let row = self
            .store
            .upsert(table, serde_json::to_value(row)?, on_conflict)
            .await?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn delete(&self, table: &str, query: Query) -> Result<u64, StoreError> {
        self.store.delete(table, &query).await
    }

    pub async fn is_healthy(&self) -> bool {
        match self.store.health().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Backend health check failed");
                false
            }
        }
    }
}
