//! Blob storage for uploaded files

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{check_status, segment_url, BackendError};

/// Stored object as reported back to the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobObject {
    pub url: String,
    pub download_url: String,
    pub pathname: String,
    pub content_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `body` under `pathname`.
    ///
    /// Without `overwrite`, an existing pathname is never replaced; the
    /// store picks a unique name instead.
    async fn put(
        &self,
        pathname: &str,
        body: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<BlobObject, BackendError>;

    /// Content type and body stored under `pathname`.
    ///
    /// Hosted stores serve objects at their own URLs and report nothing here.
    async fn get(&self, _pathname: &str) -> Result<Option<(String, Bytes)>, BackendError> {
        Ok(None)
    }
}

/// Hosted blob store (`BLOB_READ_WRITE_TOKEN`)
pub struct HttpBlobStore {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl HttpBlobStore {
    pub fn new(http: reqwest::Client, api_url: &str, token: &str) -> Self {
        Self {
            http,
            api_url: api_url.to_string(),
            token: token.to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn put(
        &self,
        pathname: &str,
        body: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<BlobObject, BackendError> {
        let size = body.len();
        let segments: Vec<&str> = pathname.split('/').collect();
        let response = self
            .http
            .put(segment_url(&self.api_url, &segments)?)
            .bearer_auth(&self.token)
            .header("x-api-version", "7")
            .header("x-content-type", content_type)
            .header("x-add-random-suffix", if overwrite { "0" } else { "1" })
            .header("x-allow-overwrite", if overwrite { "1" } else { "0" })
            .body(body)
            .send()
            .await?;

        let object: BlobObject = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        tracing::info!(pathname = %object.pathname, size, "Blob stored");
        Ok(object)
    }
}

/// Process-local blob store; URLs point below `public_base`, which the site
/// serves from `GET /blobs/*pathname`
pub struct MemoryBlobStore {
    public_base: String,
    objects: RwLock<HashMap<String, (String, Bytes)>>,
    suffix: AtomicU64,
}

impl MemoryBlobStore {
    pub fn new(public_base: &str) -> Self {
        Self {
            public_base: public_base.trim_end_matches('/').to_string(),
            objects: RwLock::new(HashMap::new()),
            suffix: AtomicU64::new(1),
        }
    }

    #[cfg(test)]
    pub async fn contains(&self, pathname: &str) -> bool {
        self.objects.read().await.contains_key(pathname)
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    fn suffixed(&self, pathname: &str) -> String {
        let n = self.suffix.fetch_add(1, Ordering::Relaxed);
        match pathname.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !ext.contains('/') => {
                format!("{}-{}.{}", stem, n, ext)
            }
            _ => format!("{}-{}", pathname, n),
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        pathname: &str,
        body: Bytes,
        content_type: &str,
        overwrite: bool,
    ) -> Result<BlobObject, BackendError> {
        let mut objects = self.objects.write().await;

        let mut stored_as = pathname.to_string();
        while !overwrite && objects.contains_key(&stored_as) {
            stored_as = self.suffixed(pathname);
        }
        objects.insert(stored_as.clone(), (content_type.to_string(), body));

        let segments: Vec<&str> = stored_as.split('/').collect();
        let url = segment_url(&self.public_base, &segments)?.to_string();
        Ok(BlobObject {
            download_url: format!("{}?download=1", url),
            url,
            pathname: stored_as,
            content_type: content_type.to_string(),
        })
    }

    async fn get(&self, pathname: &str) -> Result<Option<(String, Bytes)>, BackendError> {
        Ok(self.objects.read().await.get(pathname).cloned())
    }
}
