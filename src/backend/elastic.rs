//! Elasticsearch passage search.
//!
//! `ElasticClient` sends phrase queries to `POST {host}/{index}/_search` and
//! turns the returned hits into [`SearchHit`]s.

use std::time::Duration;

use serde_json::Value;

use super::client::{BackendError, RetryPolicy, check_status, http_client, retry_with_backoff};
use crate::capability::{SearchCapability, SearchHit};
use crate::models::Query;

const DEFAULT_HOST: &str = "http://localhost:9200";
const DEFAULT_INDEX: &str = "elastic_index";

/// Builder for constructing `ElasticClient` instances.
///
/// # Examples
///
/// ```
/// use qapipe::ElasticClientBuilder;
///
/// let client = ElasticClientBuilder::new()
///     .base_url("http://localhost:9200")
///     .index("passages")
///     .build()
///     .expect("Failed to create client");
/// assert_eq!(client.index(), "passages");
/// ```
#[derive(Debug, Default)]
pub struct ElasticClientBuilder {
    base_url: Option<String>,
    index: Option<String>,
    retry: Option<RetryPolicy>,
    timeout: Option<Duration>,
}

impl ElasticClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cluster URL (e.g., "http://localhost:9200").
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the index to search.
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Builds the client.
    ///
    /// # Environment Variables
    ///
    /// Unset values fall back to `ELASTIC_HOST` and `ELASTIC_INDEX`, then to
    /// `http://localhost:9200` and `elastic_index`.
    pub fn build(self) -> Result<ElasticClient, BackendError> {
        let base_url = self
            .base_url
            .or_else(|| std::env::var("ELASTIC_HOST").ok())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let base_url = base_url.trim_end_matches('/').to_string();

        let index = self
            .index
            .or_else(|| std::env::var("ELASTIC_INDEX").ok())
            .unwrap_or_else(|| DEFAULT_INDEX.to_string());
        if index.trim().is_empty() {
            return Err(BackendError::api("index name must not be empty"));
        }

        let client = http_client(
            &base_url,
            self.timeout.unwrap_or(Duration::from_secs(30)),
        )?;

        Ok(ElasticClient {
            client,
            base_url,
            index,
            retry: self.retry.unwrap_or_default(),
        })
    }
}

/// Synchronous Elasticsearch client implementing [`SearchCapability`].
pub struct ElasticClient {
    client: reqwest::blocking::Client,
    base_url: String,
    index: String,
    retry: RetryPolicy,
}

impl ElasticClient {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.base_url, self.index)
    }
}

impl SearchCapability for ElasticClient {
    /// Checks that the configured index exists.
    fn init(&self) -> Result<(), BackendError> {
        let url = format!("{}/{}", self.base_url, self.index);
        retry_with_backoff(&self.retry, || {
            let response = self
                .client
                .head(&url)
                .send()
                .map_err(BackendError::from_reqwest)?;

            match response.status().as_u16() {
                404 => Err(BackendError::api(format!(
                    "index `{}` does not exist",
                    self.index
                ))),
                _ => check_status(response).map(|_| ()),
            }
        })
    }

    fn find(&self, query: &Query) -> Result<Vec<SearchHit>, BackendError> {
        let url = self.search_url();
        let body = query.to_search_body();
        tracing::debug!(%url, phrase = query.match_text(), "searching passages");

        let json: Value = retry_with_backoff(&self.retry, || {
            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .map_err(BackendError::from_reqwest)?;

            check_status(response)?
                .json()
                .map_err(BackendError::from_reqwest)
        })?;

        parse_hits(&json, query.field())
    }
}

/// Extracts `(text, score)` pairs from a `_search` response, keeping hit order.
///
/// Hits whose `_source` lacks `field` are skipped.
pub fn parse_hits(json: &Value, field: &str) -> Result<Vec<SearchHit>, BackendError> {
    let hits = json
        .get("hits")
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .ok_or_else(|| BackendError::api("Missing 'hits.hits' in search response"))?;

    let results = hits
        .iter()
        .filter_map(|hit| {
            let text = hit.get("_source")?.get(field)?.as_str()?;
            let score = hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0);
            Some(SearchHit::new(text, score))
        })
        .collect();

    Ok(results)
}
