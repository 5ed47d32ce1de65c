//! Configuration module: tunables, YAML loading/saving, logging setup
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `SymbolConfig`)
//! - YAML load/save functionality (`load_config`, `save_config`)
//! - Shared state wrapper (`SharedConfig`)

pub mod logging;
mod loader;
mod types;

// Re-export types
pub use types::{AppConfig, SharedConfig, SymbolConfig};

// Re-export loader functions
pub use loader::{load_config, load_config_from_str, load_or_default, save_config};
