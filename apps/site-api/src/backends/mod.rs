//! Upstream services the API proxies to
//!
//! Each collaborator sits behind a trait with an HTTP adapter for the hosted
//! service and a local stand-in used in development and tests.

pub mod blob;
pub mod chat;
pub mod kv;
pub mod rates;
pub mod search;

use thiserror::Error;

pub use blob::{BlobObject, BlobStore, HttpBlobStore, MemoryBlobStore};
pub use chat::{ChatCompletion, ChatMessage, DeepSeekChat, Role};
pub use kv::{HttpKvStore, KvStore, MemoryKvStore};
pub use rates::{ExchangeRates, OpenExchangeRates, RateTable};
pub use search::{SearchDepth, SearchHit, TavilySearch, WebSearch};

/// Failure talking to an upstream service
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Unexpected upstream response: {0}")]
    Decode(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
}

/// `base` extended by `segments`, each percent-encoded as a single path
/// segment
pub(crate) fn segment_url(base: &str, segments: &[&str]) -> Result<reqwest::Url, BackendError> {
    let mut url = reqwest::Url::parse(base)
        .map_err(|e| BackendError::InvalidUrl(format!("{}: {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| BackendError::InvalidUrl(base.to_string()))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Turn a non-success reply into [`BackendError::Upstream`]
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Upstream {
        status: status.as_u16(),
        body,
    })
}

/// Stand-in for an upstream whose credentials are missing
#[derive(Debug, Clone, Copy)]
pub struct Unconfigured(pub &'static str);
