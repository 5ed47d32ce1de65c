//! Exchange adapters and hardware-boundary traits
//!
//! This module provides the abstractions the polling core consumes:
//! spot/funding feeds (Binance, Coinbase), link status, and alert output.

pub mod binance;
pub mod coinbase;
pub mod errors;
pub mod traits;

// Re-export commonly used types for convenience
pub use binance::BinanceAdapter;
pub use coinbase::CoinbaseAdapter;
pub use errors::{ExchangeError, ExchangeResult};
pub use traits::{AlertSink, AlwaysOnline, FundingFeed, LinkMonitor, LogBeeper, SpotFeed};
