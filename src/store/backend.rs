use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::filter::{Filter, Query};
use super::{StoreError, StoreResult};

/// Generic row-store contract: filtered select, bulk insert, patch by filter.
/// Implemented by the PostgREST client (production), SQLite (local dev)
/// and an in-memory store (tests).
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Select rows from `table` matching the query, in store order.
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Value>>;

    /// Insert rows in a single request. Returns the inserted rows
    /// (with store-assigned columns such as `id`).
    async fn insert(&self, table: &str, rows: Vec<Value>) -> StoreResult<Vec<Value>>;

    /// Merge `changes` into every row of `table` matching `filter`.
    async fn patch(&self, table: &str, filter: &Filter, changes: Value) -> StoreResult<()>;
}

/// Select rows and decode them into typed records.
pub async fn select_as<T: DeserializeOwned>(
    store: &dyn RowStore,
    table: &str,
    query: &Query,
) -> StoreResult<Vec<T>> {
    store
        .select(table, query)
        .await?
        .into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|source| StoreError::Decode {
                table: table.to_string(),
                source,
            })
        })
        .collect()
}

/// Serialize typed drafts and insert them in one request.
pub async fn insert_as<T: Serialize>(
    store: &dyn RowStore,
    table: &str,
    records: &[T],
) -> StoreResult<Vec<Value>> {
    let rows = records
        .iter()
        .map(|r| {
            serde_json::to_value(r).map_err(|source| StoreError::Decode {
                table: table.to_string(),
                source,
            })
        })
        .collect::<StoreResult<Vec<_>>>()?;
    store.insert(table, rows).await
}

/// Insert a single record and return the stored row.
pub async fn insert_one<T: Serialize>(
    store: &dyn RowStore,
    table: &str,
    record: &T,
) -> StoreResult<Value> {
    insert_as(store, table, std::slice::from_ref(record))
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| StoreError::Rejected {
            table: table.to_string(),
            reason: "insert returned no rows".to_string(),
        })
}
