use std::fs;
use std::path::Path;

use super::ExtractConfig;
use crate::error::{AppError, Result};

/// Load configuration from a TOML file; missing keys take their defaults
pub fn load_config(path: &Path) -> Result<ExtractConfig> {
    let text = fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!("Cannot read config {}: {}", path.display(), e))
    })?;
    let config: ExtractConfig = toml::from_str(&text)
        .map_err(|e| AppError::Config(format!("Invalid config {}: {}", path.display(), e)))?;
    tracing::debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

/// Write configuration as TOML
pub fn save_config(path: &Path, config: &ExtractConfig) -> Result<()> {
    let text = toml::to_string_pretty(config)
        .map_err(|e| AppError::Config(format!("Cannot serialize config: {}", e)))?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, text)?;
    Ok(())
}
