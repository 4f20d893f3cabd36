//! Configuration Types
//!
//! Repair engine settings with defaults. One instance is owned by each
//! engine and replaced wholesale on `configure`.

use serde::{Deserialize, Serialize};

use crate::constants::repair::{DEFAULT_MAX_RETRIES, MAX_RETRIES_LIMIT};
use crate::repair::Strategy;
use crate::types::{HealError, Result};

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealConfig {
    /// Attempt budget per `validate_and_fix` call
    pub max_retries: u32,

    /// Allow the style-enforcement strategy
    pub auto_format: bool,

    /// Use learned and known error signatures, inject frequent issue types
    pub enable_learning: bool,

    /// Preference order of the five repair strategies
    pub strategies: [Strategy; 5],
}

impl Default for HealConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            auto_format: true,
            enable_learning: true,
            strategies: Strategy::ALL,
        }
    }
}

impl HealConfig {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `HealError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries > MAX_RETRIES_LIMIT {
            return Err(HealError::Config(format!(
                "max_retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT, self.max_retries
            )));
        }

        // Each strategy exactly once
        for strategy in Strategy::ALL {
            let count = self.strategies.iter().filter(|s| **s == strategy).count();
            if count != 1 {
                return Err(HealError::Config(format!(
                    "strategies must list '{}' exactly once, found {} times",
                    strategy, count
                )));
            }
        }

        Ok(())
    }

    /// Merge the `Some` fields of `update` into a copy and validate it
    pub fn merged(&self, update: &ConfigUpdate) -> Result<Self> {
        let mut next = self.clone();
        if let Some(max_retries) = update.max_retries {
            next.max_retries = max_retries;
        }
        if let Some(auto_format) = update.auto_format {
            next.auto_format = auto_format;
        }
        if let Some(enable_learning) = update.enable_learning {
            next.enable_learning = enable_learning;
        }
        next.validate()?;
        Ok(next)
    }
}

/// Partial configuration for merge-style updates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigUpdate {
    pub max_retries: Option<u32>,
    pub auto_format: Option<bool>,
    pub enable_learning: Option<bool>,
}

impl ConfigUpdate {
    pub fn max_retries(mut self, value: u32) -> Self {
        self.max_retries = Some(value);
        self
    }

    pub fn auto_format(mut self, value: bool) -> Self {
        self.auto_format = Some(value);
        self
    }

    pub fn enable_learning(mut self, value: bool) -> Self {
        self.enable_learning = Some(value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HealConfig::default();
        assert_eq!(config.max_retries, 3);
        assert!(config.auto_format);
        assert!(config.enable_learning);
        assert_eq!(config.strategies.len(), 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_only_touches_some_fields() {
        let config = HealConfig::default();
        let next = config
            .merged(&ConfigUpdate::default().auto_format(false))
            .unwrap();
        assert!(!next.auto_format);
        assert_eq!(next.max_retries, config.max_retries);
        assert_eq!(next.enable_learning, config.enable_learning);
    }

    #[test]
    fn test_merge_rejects_excessive_retries() {
        let err = HealConfig::default()
            .merged(&ConfigUpdate::default().max_retries(MAX_RETRIES_LIMIT + 1))
            .unwrap_err();
        assert!(matches!(err, HealError::Config(_)));
    }

    #[test]
    fn test_zero_retries_allowed() {
        let next = HealConfig::default()
            .merged(&ConfigUpdate::default().max_retries(0))
            .unwrap();
        assert_eq!(next.max_retries, 0);
    }

    #[test]
    fn test_duplicate_strategy_rejected() {
        let mut config = HealConfig::default();
        config.strategies[1] = config.strategies[0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_roundtrip_uses_kebab_names() {
        let text = toml::to_string(&HealConfig::default()).unwrap();
        assert!(text.contains("\"syntax-targeted\""));
        let back: HealConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, HealConfig::default());
    }
}
