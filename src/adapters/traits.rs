//! Adapter traits at the boundary between the polling core and the outside
//! world: exchange price feeds, network link status, and the alert output.
//!
//! The scheduler and alert engine only ever see these traits, so tests can
//! substitute scripted mocks without any network access.

use async_trait::async_trait;
use tracing::info;

use crate::adapters::errors::ExchangeResult;

/// A spot-price feed for one exchange.
#[async_trait]
pub trait SpotFeed: Send + Sync {
    /// Exchange identifier used in logs (e.g. "binance").
    fn exchange_name(&self) -> &'static str;

    /// Fetch the current spot price for an exchange-specific symbol code.
    ///
    /// Implementations must return an error for non-positive or non-finite
    /// prices; a returned `Ok` price is always usable as-is.
    async fn fetch_spot(&self, symbol: &str) -> ExchangeResult<f64>;
}

/// A perpetual funding-rate feed.
#[async_trait]
pub trait FundingFeed: Send + Sync {
    /// Fetch the most recent funding rate (signed fraction, e.g. 0.0001).
    async fn fetch_funding(&self, symbol: &str) -> ExchangeResult<f64>;
}

/// Network link status, queried by the scheduler before every fetch cycle.
pub trait LinkMonitor: Send + Sync {
    fn is_connected(&self) -> bool;

    /// Signal strength in dBm (0 when not applicable).
    fn signal_strength(&self) -> i32;
}

/// Fire-and-forget alert output (buzzer pattern on the original hardware).
///
/// Implementations must not block: the alert engine calls this from its
/// evaluation loop.
pub trait AlertSink: Send + Sync {
    fn beep(&self, on_ms: u16, off_ms: u16, count: u8);
}

/// LinkMonitor for deployments where the process only runs with a working
/// network stack; reports connected with no signal reading.
pub struct AlwaysOnline;

impl LinkMonitor for AlwaysOnline {
    fn is_connected(&self) -> bool {
        true
    }

    fn signal_strength(&self) -> i32 {
        0
    }
}

/// AlertSink that logs the beep pattern instead of driving hardware.
pub struct LogBeeper;

impl AlertSink for LogBeeper {
    fn beep(&self, on_ms: u16, off_ms: u16, count: u8) {
        info!(on_ms, off_ms, count, "[ALERT] beep");
    }
}
