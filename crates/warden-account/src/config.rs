//! Wallet configuration
//!
//! Loaded from TOML. Every field has a default, so an empty document is a
//! valid configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use warden_core::{WardenError, WardenResult, MAX_BATCH_SIZE};

/// Storage bounds for the wallet's boxes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Maximum plugin records
    pub max_plugins: usize,
    /// Maximum allowance records
    pub max_allowances: usize,
    /// Maximum plugin aliases
    pub max_named_plugins: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            max_plugins: 64,
            max_allowances: 256,
            max_named_plugins: 64,
        }
    }
}

/// Host storage rent schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageRent {
    /// Flat charge per box
    pub per_box: u64,
    /// Charge per byte of key plus value
    pub per_byte: u64,
}

impl Default for StorageRent {
    fn default() -> Self {
        Self {
            per_box: 2_500,
            per_byte: 400,
        }
    }
}

impl StorageRent {
    /// No rent at all
    pub fn free() -> Self {
        Self {
            per_box: 0,
            per_byte: 0,
        }
    }

    /// Rent for a box of `footprint` bytes
    pub fn cost(&self, footprint: u64) -> u64 {
        self.per_box
            .saturating_add(self.per_byte.saturating_mul(footprint))
    }
}

/// Wallet configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Storage bounds
    pub storage: StorageConfig,
    /// Storage rent schedule
    pub rent: StorageRent,
    /// Native amount forwarded to the factory when a custody account is created
    pub custody_funding: u64,
    /// Host limit on entries per batch
    pub max_batch_size: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            rent: StorageRent::default(),
            custody_funding: 100_000,
            max_batch_size: MAX_BATCH_SIZE,
        }
    }
}

impl WalletConfig {
    /// Parse a TOML document
    pub fn from_toml_str(content: &str) -> WardenResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| WardenError::invalid(format!("Invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML configuration file
    pub fn load_from_file(path: &Path) -> WardenResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WardenError::invalid(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject bounds no wallet can operate under
    pub fn validate(&self) -> WardenResult<()> {
        if self.storage.max_plugins == 0 {
            return Err(WardenError::invalid("storage.max_plugins must be positive"));
        }
        if self.storage.max_allowances == 0 {
            return Err(WardenError::invalid(
                "storage.max_allowances must be positive",
            ));
        }
        if self.storage.max_named_plugins == 0 {
            return Err(WardenError::invalid(
                "storage.max_named_plugins must be positive",
            ));
        }
        if self.max_batch_size == 0 {
            return Err(WardenError::invalid("max_batch_size must be positive"));
        }
        Ok(())
    }
}
