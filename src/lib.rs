//! Spreadwatch: cross-exchange spread and funding-rate monitor
//!
//! Polls Binance spot, Binance perpetual funding, and Coinbase spot for a
//! configured set of symbols, maintains a shared market-state snapshot,
//! and raises threshold alerts with per-symbol cooldowns.

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;

pub use error::AppError;
