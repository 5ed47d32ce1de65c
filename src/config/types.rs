//! Configuration types for the dashboard
//!
//! Loaded from YAML and shared across tasks as `Arc<RwLock<AppConfig>>`.
//! The scheduler and alert engine read the shared config live every cycle,
//! so runtime changes apply without restart.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::AppError;

/// Type alias for shared configuration access across async tasks
pub type SharedConfig = Arc<RwLock<AppConfig>>;

/// One tracked symbol with its per-exchange codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolConfig {
    /// Display name (e.g. "BTC/USDT")
    pub display_name: String,
    /// Binance symbol code (e.g. "BTCUSDT")
    pub binance_symbol: String,
    /// Coinbase product code (e.g. "BTC-USD")
    pub coinbase_product: String,
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Tracked symbols; the order fixes symbol indices for the process lifetime
    pub symbols: Vec<SymbolConfig>,

    /// Spot price refresh interval (milliseconds)
    #[serde(default = "default_price_refresh_ms")]
    pub price_refresh_ms: u32,

    /// Funding rate refresh interval (milliseconds)
    #[serde(default = "default_funding_refresh_ms")]
    pub funding_refresh_ms: u32,

    /// Alert when |spread| exceeds this percentage
    #[serde(default = "default_spread_alert_pct")]
    pub spread_alert_pct: f64,

    /// Alert when |funding rate| exceeds this value (rate, not percent)
    #[serde(default = "default_funding_alert_pct")]
    pub funding_alert_pct: f64,

    /// Mark data stale after this duration without a successful fetch
    #[serde(default = "default_stale_ms")]
    pub stale_ms: u32,

    /// Minimum time between repeated alerts per symbol per kind
    #[serde(default = "default_alert_cooldown_ms")]
    pub alert_cooldown_ms: u32,
}

fn default_price_refresh_ms() -> u32 {
    5000
}

fn default_funding_refresh_ms() -> u32 {
    60_000
}

fn default_spread_alert_pct() -> f64 {
    0.5
}

fn default_funding_alert_pct() -> f64 {
    0.01
}

fn default_stale_ms() -> u32 {
    15_000
}

fn default_alert_cooldown_ms() -> u32 {
    30_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            symbols: vec![
                SymbolConfig {
                    display_name: "BTC/USDT".to_string(),
                    binance_symbol: "BTCUSDT".to_string(),
                    coinbase_product: "BTC-USD".to_string(),
                },
                SymbolConfig {
                    display_name: "ETH/USDT".to_string(),
                    binance_symbol: "ETHUSDT".to_string(),
                    coinbase_product: "ETH-USD".to_string(),
                },
                SymbolConfig {
                    display_name: "SOL/USDT".to_string(),
                    binance_symbol: "SOLUSDT".to_string(),
                    coinbase_product: "SOL-USD".to_string(),
                },
            ],
            price_refresh_ms: default_price_refresh_ms(),
            funding_refresh_ms: default_funding_refresh_ms(),
            spread_alert_pct: default_spread_alert_pct(),
            funding_alert_pct: default_funding_alert_pct(),
            stale_ms: default_stale_ms(),
            alert_cooldown_ms: default_alert_cooldown_ms(),
        }
    }
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.symbols.is_empty() {
            return Err(AppError::Config(
                "Configuration must contain at least one symbol".to_string(),
            ));
        }

        for symbol in &self.symbols {
            if symbol.display_name.trim().is_empty()
                || symbol.binance_symbol.trim().is_empty()
                || symbol.coinbase_product.trim().is_empty()
            {
                return Err(AppError::Config(format!(
                    "Symbol '{}': display name and exchange codes cannot be empty",
                    symbol.display_name
                )));
            }
        }

        if self.price_refresh_ms == 0 || self.funding_refresh_ms == 0 {
            return Err(AppError::Config(
                "Refresh intervals must be greater than zero".to_string(),
            ));
        }

        if self.spread_alert_pct <= 0.0 || self.spread_alert_pct >= 100.0 {
            return Err(AppError::Config(format!(
                "spread_alert_pct must be > 0 and < 100 (got {})",
                self.spread_alert_pct
            )));
        }

        if self.funding_alert_pct <= 0.0 {
            return Err(AppError::Config(format!(
                "funding_alert_pct must be > 0 (got {})",
                self.funding_alert_pct
            )));
        }

        if self.stale_ms == 0 {
            return Err(AppError::Config(
                "stale_ms must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// Convert to shared state wrapper for async access
    pub fn into_shared(self) -> SharedConfig {
        Arc::new(RwLock::new(self))
    }
}
