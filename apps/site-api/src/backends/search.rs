//! Web search upstream used by the chat assistant

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_status, BackendError, Unconfigured};

/// Results requested per query
const MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchDepth {
    Basic,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[async_trait]
pub trait WebSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        depth: SearchDepth,
    ) -> Result<Vec<SearchHit>, BackendError>;
}

/// Tavily search API
pub struct TavilySearch {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct SearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: SearchDepth,
    max_results: usize,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

impl TavilySearch {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[async_trait]
impl WebSearch for TavilySearch {
    async fn search(
        &self,
        query: &str,
        depth: SearchDepth,
    ) -> Result<Vec<SearchHit>, BackendError> {
        let response = self
            .http
            .post(format!("{}/search", self.base_url))
            .json(&SearchRequest {
                api_key: &self.api_key,
                query,
                search_depth: depth,
                max_results: MAX_RESULTS,
            })
            .send()
            .await?;

        let reply: SearchResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        tracing::debug!(query, hits = reply.results.len(), ?depth, "Web search");
        Ok(reply.results)
    }
}

#[async_trait]
impl WebSearch for Unconfigured {
    async fn search(
        &self,
        _query: &str,
        _depth: SearchDepth,
    ) -> Result<Vec<SearchHit>, BackendError> {
        Err(BackendError::NotConfigured(self.0))
    }
}
