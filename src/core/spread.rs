//! Cross-exchange spread calculation.
//!
//! Pure and deterministic: two positive finite prices in, absolute and
//! percentage-of-mid spread out.

use serde::Serialize;
use thiserror::Error;

/// Result of a spread calculation between two exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Spread {
    /// `coinbase - binance`, in quote currency.
    pub abs: f64,
    /// Absolute spread as a percentage of the mid-price.
    pub pct: f64,
}

#[derive(Debug, Error, PartialEq)]
pub enum SpreadError {
    #[error("price is not finite: {0}")]
    NotFinite(f64),

    #[error("price must be positive: {0}")]
    NonPositive(f64),

    #[error("mid-price must be positive: {0}")]
    NonPositiveMid(f64),
}

/// Compute the spread between a Binance price and a Coinbase price.
///
/// Rejects NaN, infinite, and non-positive inputs. The mid-price guard is
/// unreachable given those checks but is kept as a division-by-zero fence.
pub fn compute_spread(binance_price: f64, coinbase_price: f64) -> Result<Spread, SpreadError> {
    for price in [binance_price, coinbase_price] {
        if !price.is_finite() {
            return Err(SpreadError::NotFinite(price));
        }
        if price <= 0.0 {
            return Err(SpreadError::NonPositive(price));
        }
    }

    let abs = coinbase_price - binance_price;
    let mid = (binance_price + coinbase_price) / 2.0;
    if mid <= 0.0 {
        return Err(SpreadError::NonPositiveMid(mid));
    }

    Ok(Spread {
        abs,
        pct: (abs / mid) * 100.0,
    })
}
