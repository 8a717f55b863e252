//! Hosted key-value store

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{check_status, segment_url, BackendError};

/// Write-only record store; submissions are never read back by the site
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn set(&self, key: &str, value: &Value) -> Result<(), BackendError>;
}

/// Redis-over-REST key-value store (`KV_REST_API_URL` / `KV_REST_API_TOKEN`)
pub struct HttpKvStore {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Deserialize)]
struct RestReply {
    error: Option<String>,
}

impl HttpKvStore {
    pub fn new(http: reqwest::Client, base_url: &str, token: &str) -> Self {
        Self {
            http,
            base_url: base_url.to_string(),
            token: token.to_string(),
        }
    }

    /// Run one REST command; every argument travels as its own path segment
    async fn command(&self, args: &[&str], body: String) -> Result<(), BackendError> {
        let url = segment_url(&self.base_url, args)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .body(body)
            .send()
            .await?;

        let reply: RestReply = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        match reply.error {
            Some(error) => Err(BackendError::Decode(error)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl KvStore for HttpKvStore {
    async fn set(&self, key: &str, value: &Value) -> Result<(), BackendError> {
        let body = serde_json::to_string(value).map_err(|e| BackendError::Decode(e.to_string()))?;
        self.command(&["set", key], body).await?;
        tracing::debug!(key, "KV set");
        Ok(())
    }
}

/// Process-local store for development and tests
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    #[cfg(test)]
    pub async fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn set(&self, key: &str, value: &Value) -> Result<(), BackendError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::http::Uri;
    use serde_json::json;

    #[tokio::test]
    async fn memory_store_overwrites() {
        let kv = MemoryKvStore::new();
        kv.set("k", &json!({"a": 1})).await.unwrap();
        kv.set("k", &json!({"a": 2})).await.unwrap();
        assert_eq!(kv.get("k").await, Some(json!({"a": 2})));
        assert_eq!(kv.keys().await, vec!["k".to_string()]);
        assert!(kv.get("missing").await.is_none());
    }

    #[tokio::test]
    async fn keys_reach_the_upstream_as_one_segment() {
        let seen = Arc::new(Mutex::new(Vec::<String>::new()));
        let recorder = seen.clone();
        let upstream = axum::Router::new().fallback(move |uri: Uri| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(uri.path().to_string());
                axum::Json(json!({"result": "OK"}))
            }
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, upstream).await.unwrap();
        });

        let kv = HttpKvStore::new(reqwest::Client::new(), &format!("http://{}", addr), "token");
        kv.set("feedback:evil/EX/1:123", &json!({"a": 1})).await.unwrap();
        kv.set("submission:a?b#c", &json!({"a": 2})).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "/set/feedback:evil%2FEX%2F1:123".to_string(),
                "/set/submission:a%3Fb%23c".to_string(),
            ]
        );
    }
}
