//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Config file (explicit path, else ~/.config/codeheal/config.toml)
//! 3. Environment variables (CODEHEAL_* prefix)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::HealConfig;
use crate::types::{HealError, Result};

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration: defaults → file → env vars
    ///
    /// An explicit `path` must exist; the global file is optional.
    pub fn load(path: Option<&Path>) -> Result<HealConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(HealConfig::default()));

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(HealError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                debug!(path = %path.display(), "Loading config file");
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if let Some(global_path) = Self::global_config_path()
                    && global_path.exists()
                {
                    debug!(path = %global_path.display(), "Loading global config");
                    figment = figment.merge(Toml::file(&global_path));
                }
            }
        }

        // Flat keys: CODEHEAL_MAX_RETRIES -> max_retries
        figment = figment.merge(Env::prefixed("CODEHEAL_"));

        let config: HealConfig = figment
            .extract()
            .map_err(|e| HealError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only (no environment)
    pub fn load_from_file(path: &Path) -> Result<HealConfig> {
        let config: HealConfig = Figment::new()
            .merge(Serialized::defaults(HealConfig::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| HealError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/codeheal/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("codeheal"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Render the effective configuration as TOML or JSON
    pub fn render(config: &HealConfig, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| HealError::Config(e.to_string()))
        }
    }
}
