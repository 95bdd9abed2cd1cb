//! # Cart Configuration
//!
//! Process-wide settings shared by every session.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     TROLLEY_TAX_RATE=7.5                                               │
//! │     TROLLEY_HASHER=uuid                                                │
//! │     TROLLEY_INSTANCE=wishlist                                          │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     path handed to CartConfig::load                                    │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     19% tax, content hasher, instance "default", key prefix "cart"     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # cart.toml
//! tax_rate = 19.0           # percent
//! hasher = "content"        # content | random | uuid
//! default_instance = "default"
//! key_prefix = "cart"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use trolley_core::validation::validate_tax_rate_bps;
use trolley_core::{HasherKind, RowHasher, TaxRate};

use crate::error::{ConfigError, ConfigResult};

/// Instance name used when none (or an empty one) is given.
pub const DEFAULT_INSTANCE: &str = "default";

/// Tax rate applied to every item when nothing is configured, in percent.
pub const DEFAULT_TAX_RATE: f64 = 19.0;

// =============================================================================
// Cart Configuration
// =============================================================================

/// Complete cart configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartConfig {
    /// Tax rate in percent, applied to every item on add.
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,

    /// Row id strategy.
    #[serde(default)]
    pub hasher: HasherKind,

    /// Instance selected when a session starts or an empty name is given.
    #[serde(default = "default_instance")]
    pub default_instance: String,

    /// Store keys are `<key_prefix>.<instance>`.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE
}

fn default_instance() -> String {
    DEFAULT_INSTANCE.to_string()
}

fn default_key_prefix() -> String {
    "cart".to_string()
}

impl Default for CartConfig {
    fn default() -> Self {
        CartConfig {
            tax_rate: default_tax_rate(),
            hasher: HasherKind::default(),
            default_instance: default_instance(),
            key_prefix: default_key_prefix(),
        }
    }
}

impl CartConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file, when given and present
    /// 3. Environment variables
    pub fn load(config_path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path {
            if path.exists() {
                info!(?path, "Loading cart config from file");
                let contents = std::fs::read_to_string(path)?;
                config = Self::from_toml_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document. Does not apply environment overrides.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Saves configuration to file, creating parent directories.
    pub fn save(&self, config_path: &Path) -> ConfigResult<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(config_path, contents)?;

        info!(path = ?config_path, "Cart config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.tax_rate.is_finite() || self.tax_rate < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tax_rate must be between 0 and 100, got {}",
                self.tax_rate
            )));
        }
        validate_tax_rate_bps(self.tax_rate().bps())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        if self.default_instance.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_instance must not be empty".into(),
            ));
        }

        if self.key_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("key_prefix must not be empty".into()));
        }

        Ok(())
    }

    /// Applies `TROLLEY_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup.
    ///
    /// An unparseable tax rate is ignored with a warning. An unknown hasher
    /// name is an error.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(rate) = lookup("TROLLEY_TAX_RATE") {
            match rate.trim().parse::<f64>() {
                Ok(r) => {
                    debug!(tax_rate = r, "Overriding tax rate from environment");
                    self.tax_rate = r;
                }
                Err(_) => warn!(value = %rate, "Ignoring unparseable TROLLEY_TAX_RATE"),
            }
        }

        if let Some(hasher) = lookup("TROLLEY_HASHER") {
            let parsed: HasherKind = hasher.parse()?;
            debug!(hasher = %parsed, "Overriding hasher from environment");
            self.hasher = parsed;
        }

        if let Some(instance) = lookup("TROLLEY_INSTANCE") {
            debug!(instance = %instance, "Overriding default instance from environment");
            self.default_instance = instance;
        }

        Ok(())
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Configured tax rate as basis points.
    pub fn tax_rate(&self) -> TaxRate {
        TaxRate::from_percentage(self.tax_rate)
    }

    /// Builds the configured row hasher.
    pub fn build_hasher(&self) -> Arc<dyn RowHasher> {
        self.hasher.build()
    }

    /// Resolves an instance name, mapping blank names to the default.
    pub fn instance_name(&self, name: &str) -> String {
        let name = name.trim();
        if name.is_empty() {
            self.default_instance.clone()
        } else {
            name.to_string()
        }
    }

    /// Store key for an instance.
    pub fn store_key(&self, instance: &str) -> String {
        format!("{}.{}", self.key_prefix, instance)
    }
}
