//! Error types for exchange adapters

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid price: {0}")]
    InvalidPrice(f64),

    #[error("Symbol mismatch: expected {expected}, got {got}")]
    SymbolMismatch { expected: String, got: String },
}

/// Result type alias for adapter operations
pub type ExchangeResult<T> = Result<T, ExchangeError>;
