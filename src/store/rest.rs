use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use super::backend::RowStore;
use super::filter::{Filter, Query};
use super::{StoreError, StoreResult};

/// Row store reached over a PostgREST-style HTTP interface
/// (`{base}/rest/v1/{table}?column=eq.value`).
pub struct RestStore {
    http: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl RestStore {
    pub fn new(base_url: &str, service_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        }
    }

    /// Endpoint URL for a table.
    pub fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn headers(&self) -> StoreResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(&self.service_key)
            .map_err(|e| StoreError::Unavailable(format!("invalid service key: {}", e)))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.service_key))
            .map_err(|e| StoreError::Unavailable(format!("invalid service key: {}", e)))?;
        headers.insert("apikey", key);
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

/// Turn a non-2xx response into a `StoreError::Http` carrying the raw body.
async fn check(resp: reqwest::Response) -> StoreResult<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::Http {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl RowStore for RestStore {
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Value>> {
        tracing::debug!(table, "select");
        let resp = self
            .http
            .get(self.table_url(table))
            .headers(self.headers()?)
            .query(&query.to_query_pairs())
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }
        tracing::debug!(table, rows = rows.len(), "insert");
        let resp = self
            .http
            .post(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "return=representation")
            .json(&rows)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn patch(&self, table: &str, filter: &Filter, changes: Value) -> StoreResult<()> {
        tracing::debug!(table, "patch");
        let resp = self
            .http
            .patch(self.table_url(table))
            .headers(self.headers()?)
            .header("Prefer", "return=minimal")
            .query(&filter.to_query_pairs())
            .json(&changes)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}
