//! Application state for the site API

use std::sync::Arc;
use std::time::Duration;

use intake_core::{SchemaRegistry, CATALOG};
use tracing::{info, warn};

use crate::backends::{
    BlobStore, ChatCompletion, DeepSeekChat, ExchangeRates, HttpBlobStore, HttpKvStore, KvStore,
    MemoryBlobStore, MemoryKvStore, OpenExchangeRates, TavilySearch, Unconfigured, WebSearch,
};
use crate::config::Args;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub kv: Arc<dyn KvStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub chat: Arc<dyn ChatCompletion>,
    pub search: Arc<dyn WebSearch>,
    pub rates: Arc<dyn ExchangeRates>,
    pub registry: &'static SchemaRegistry,
}

impl AppState {
    /// Wire upstream adapters from configuration
    pub fn from_args(args: &Args) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(args.upstream_timeout_secs))
            .build()?;

        let kv: Arc<dyn KvStore> = match (&args.kv_url, &args.kv_token) {
            (Some(url), Some(token)) => {
                info!("Using hosted KV store at {}", url);
                Arc::new(HttpKvStore::new(http.clone(), url, token))
            }
            _ => {
                warn!("KV_REST_API_URL/KV_REST_API_TOKEN not set, submissions stay in memory");
                Arc::new(MemoryKvStore::new())
            }
        };

        let blobs: Arc<dyn BlobStore> = match &args.blob_token {
            Some(token) => Arc::new(HttpBlobStore::new(http.clone(), &args.blob_api_url, token)),
            None => {
                warn!("BLOB_READ_WRITE_TOKEN not set, uploads stay in memory");
                Arc::new(MemoryBlobStore::new(&args.public_blob_base))
            }
        };

        let chat: Arc<dyn ChatCompletion> = match &args.deepseek_api_key {
            Some(key) => Arc::new(DeepSeekChat::new(http.clone(), &args.deepseek_base_url, key)),
            None => {
                warn!("DEEPSEEK_API_KEY not set, chat assistant disabled");
                Arc::new(Unconfigured("DEEPSEEK_API_KEY"))
            }
        };

        let search: Arc<dyn WebSearch> = match &args.tavily_api_key {
            Some(key) => Arc::new(TavilySearch::new(http.clone(), &args.tavily_base_url, key)),
            None => {
                warn!("TAVILY_API_KEY not set, web search disabled");
                Arc::new(Unconfigured("TAVILY_API_KEY"))
            }
        };

        let rates: Arc<dyn ExchangeRates> =
            Arc::new(OpenExchangeRates::new(http, &args.exchange_rate_url));

        Ok(Self {
            kv,
            blobs,
            chat,
            search,
            rates,
            registry: &CATALOG,
        })
    }
}
