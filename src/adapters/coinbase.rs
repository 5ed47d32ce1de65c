//! Coinbase adapter: spot prices from the public v2 prices API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::traits::SpotFeed;

const API_BASE: &str = "https://api.coinbase.com";

const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Response from `/v2/prices/{product}/spot`:
/// `{"data":{"base":"BTC","currency":"USD","amount":"43250.50"}}`
#[derive(Debug, Deserialize)]
struct SpotResponse {
    data: SpotData,
}

#[derive(Debug, Deserialize)]
struct SpotData {
    amount: String,
}

pub struct CoinbaseAdapter {
    client: Client,
    base_url: String,
}

impl CoinbaseAdapter {
    pub fn new() -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            base_url: API_BASE.to_string(),
        })
    }

    /// Override the base URL (used by tests against a local mock server).
    pub fn with_base_url(base_url: impl Into<String>) -> ExchangeResult<Self> {
        let mut adapter = Self::new()?;
        adapter.base_url = base_url.into();
        Ok(adapter)
    }
}

#[async_trait]
impl SpotFeed for CoinbaseAdapter {
    fn exchange_name(&self) -> &'static str {
        "coinbase"
    }

    async fn fetch_spot(&self, product: &str) -> ExchangeResult<f64> {
        let url = format!("{}/v2/prices/{}/spot", self.base_url, product);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExchangeError::Api(format!("HTTP {status}: {body}")));
        }

        let parsed: SpotResponse =
            serde_json::from_str(&body).map_err(|e| ExchangeError::Parse(e.to_string()))?;

        let price: f64 = parsed
            .data
            .amount
            .parse()
            .map_err(|_| ExchangeError::Parse(format!("not a number: {}", parsed.data.amount)))?;
        if !price.is_finite() || price <= 0.0 {
            return Err(ExchangeError::InvalidPrice(price));
        }

        debug!(product, price, "[COINBASE] spot price");
        Ok(price)
    }
}
