//! Binance adapter: spot prices from the spot API, funding rates from the
//! futures API. Both endpoints are public and unauthenticated.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::traits::{FundingFeed, SpotFeed};

const SPOT_API_BASE: &str = "https://api.binance.com";
const FUTURES_API_BASE: &str = "https://fapi.binance.com";

/// Per-request timeout; a hung exchange must not stall the polling cycle.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Response from `/api/v3/ticker/price`: `{"symbol":"BTCUSDT","price":"43250.50"}`
#[derive(Debug, Deserialize)]
struct SpotTicker {
    symbol: String,
    price: String,
}

/// One entry of the `/fapi/v1/fundingRate` array response.
#[derive(Debug, Deserialize)]
struct FundingEntry {
    symbol: String,
    #[serde(rename = "fundingRate")]
    funding_rate: String,
}

pub struct BinanceAdapter {
    client: Client,
    spot_base: String,
    futures_base: String,
}

impl BinanceAdapter {
    pub fn new() -> ExchangeResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            spot_base: SPOT_API_BASE.to_string(),
            futures_base: FUTURES_API_BASE.to_string(),
        })
    }

    /// Override both base URLs (used by tests against a local mock server).
    pub fn with_base_urls(spot_base: impl Into<String>, futures_base: impl Into<String>) -> ExchangeResult<Self> {
        let mut adapter = Self::new()?;
        adapter.spot_base = spot_base.into();
        adapter.futures_base = futures_base.into();
        Ok(adapter)
    }

    async fn get_text(&self, url: &str) -> ExchangeResult<String> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ExchangeError::Api(format!("HTTP {status}: {body}")));
        }
        Ok(body)
    }
}

fn parse_positive_price(raw: &str) -> ExchangeResult<f64> {
    let price: f64 = raw
        .parse()
        .map_err(|_| ExchangeError::Parse(format!("not a number: {raw}")))?;
    if !price.is_finite() || price <= 0.0 {
        return Err(ExchangeError::InvalidPrice(price));
    }
    Ok(price)
}

#[async_trait]
impl SpotFeed for BinanceAdapter {
    fn exchange_name(&self) -> &'static str {
        "binance"
    }

    async fn fetch_spot(&self, symbol: &str) -> ExchangeResult<f64> {
        let url = format!("{}/api/v3/ticker/price?symbol={}", self.spot_base, symbol);
        let body = self.get_text(&url).await?;

        let ticker: SpotTicker =
            serde_json::from_str(&body).map_err(|e| ExchangeError::Parse(e.to_string()))?;

        if ticker.symbol != symbol {
            return Err(ExchangeError::SymbolMismatch {
                expected: symbol.to_string(),
                got: ticker.symbol,
            });
        }

        let price = parse_positive_price(&ticker.price)?;
        debug!(symbol, price, "[BINANCE] spot price");
        Ok(price)
    }
}

#[async_trait]
impl FundingFeed for BinanceAdapter {
    async fn fetch_funding(&self, symbol: &str) -> ExchangeResult<f64> {
        let url = format!(
            "{}/fapi/v1/fundingRate?symbol={}&limit=1",
            self.futures_base, symbol
        );
        let body = self.get_text(&url).await?;

        let entries: Vec<FundingEntry> =
            serde_json::from_str(&body).map_err(|e| ExchangeError::Parse(e.to_string()))?;

        let entry = entries
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::Api("empty funding rate array".to_string()))?;

        if entry.symbol != symbol {
            return Err(ExchangeError::SymbolMismatch {
                expected: symbol.to_string(),
                got: entry.symbol,
            });
        }

        let rate: f64 = entry
            .funding_rate
            .parse()
            .map_err(|_| ExchangeError::Parse(format!("not a number: {}", entry.funding_rate)))?;
        if !rate.is_finite() {
            return Err(ExchangeError::Parse(format!("non-finite rate: {rate}")));
        }

        debug!(symbol, rate, "[BINANCE] funding rate");
        Ok(rate)
    }
}
