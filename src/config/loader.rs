//! Configuration loading and saving for YAML files

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::error::AppError;

use super::types::AppConfig;

/// Load configuration from a YAML file.
///
/// Checks the file exists, parses it, and validates the configuration rules.
pub fn load_config(path: &Path) -> Result<AppConfig, AppError> {
    if !path.exists() {
        return Err(AppError::Config(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path)?;
    load_config_from_str(&contents)
        .map_err(|e| AppError::Config(format!("in '{}': {}", path.display(), e)))
}

/// Load configuration from a YAML string (useful for testing)
pub fn load_config_from_str(yaml_content: &str) -> Result<AppConfig, AppError> {
    let config: AppConfig = serde_yaml::from_str(yaml_content)
        .map_err(|e| AppError::Config(format!("YAML parse error: {e}")))?;

    config.validate()?;

    Ok(config)
}

/// Load configuration, falling back to defaults when the file is missing or
/// invalid. Configuration trouble must never block startup; the scheduler
/// runs with defaults and the problem is logged.
pub fn load_or_default(path: &Path) -> AppConfig {
    match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "using default configuration");
            AppConfig::default()
        }
    }
}

/// Persist the current configuration back to its YAML file.
pub fn save_config(path: &Path, config: &AppConfig) -> Result<(), AppError> {
    let yaml = serde_yaml::to_string(config)
        .map_err(|e| AppError::Config(format!("YAML serialize error: {e}")))?;
    fs::write(path, yaml)?;
    Ok(())
}
