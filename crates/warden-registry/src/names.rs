//! Human-readable plugin aliases

use serde::{Deserialize, Serialize};
use std::fmt;
use warden_core::{StorageKey, WardenError, WardenResult};

/// Longest alias accepted
pub const MAX_NAME_LEN: usize = 32;

/// Alias box key: a non-empty UTF-8 name of at most [`MAX_NAME_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginName(String);

impl PluginName {
    /// Validate and wrap `name`
    pub fn new(name: impl Into<String>) -> WardenResult<Self> {
        let name = name.into();
        if name.is_empty() || name.len() > MAX_NAME_LEN {
            return Err(WardenError::invalid(format!(
                "plugin name must be 1..={MAX_NAME_LEN} bytes, got {}",
                name.len()
            )));
        }
        Ok(Self(name))
    }

    /// Decode an alias from raw call-argument bytes
    pub fn from_arg(bytes: &[u8]) -> WardenResult<Self> {
        let name = std::str::from_utf8(bytes)
            .map_err(|e| WardenError::invalid(format!("plugin name is not UTF-8: {e}")))?;
        Self::new(name)
    }

    /// Alias text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl StorageKey for PluginName {
    const PREFIX: &'static [u8] = b"n";
}

impl fmt::Display for PluginName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
