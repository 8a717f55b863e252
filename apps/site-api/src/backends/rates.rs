//! Exchange-rate lookup for the currency converter

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_status, BackendError};

/// Rates relative to one base currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateTable {
    pub base: String,
    pub updated_at: Option<String>,
    pub rates: BTreeMap<String, f64>,
}

#[async_trait]
pub trait ExchangeRates: Send + Sync {
    async fn latest(&self, base: &str) -> Result<RateTable, BackendError>;
}

/// Open exchange-rate API (`GET <url>/<BASE>`)
pub struct OpenExchangeRates {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct LatestResponse {
    result: String,
    base_code: Option<String>,
    time_last_update_utc: Option<String>,
    #[serde(default)]
    rates: BTreeMap<String, f64>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
}

impl OpenExchangeRates {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl LatestResponse {
    fn into_table(self, requested: &str) -> Result<RateTable, BackendError> {
        if self.result != "success" {
            return Err(BackendError::Decode(
                self.error_type.unwrap_or_else(|| "exchange-rate lookup failed".into()),
            ));
        }
        Ok(RateTable {
            base: self.base_code.unwrap_or_else(|| requested.to_string()),
            updated_at: self.time_last_update_utc,
            rates: self.rates,
        })
    }
}

#[async_trait]
impl ExchangeRates for OpenExchangeRates {
    async fn latest(&self, base: &str) -> Result<RateTable, BackendError> {
        let response = self
            .http
            .get(format!("{}/{}", self.base_url, base))
            .send()
            .await?;

        let reply: LatestResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;
        reply.into_table(base)
    }
}
