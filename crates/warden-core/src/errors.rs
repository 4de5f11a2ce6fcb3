//! Unified error system for Warden
//!
//! Every error is a fatal abort of the enclosing batch. There is no local
//! recovery or partial commit, so variants describe *why* a batch was
//! rejected and, for batch scans, *where*.

use crate::identifiers::AssetId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which cooldown clock rejected a delegated use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CooldownScope {
    /// Whole-plugin cooldown
    Plugin,
    /// Per-method cooldown at the given restriction offset
    Method {
        /// Offset into the plugin's method restriction list
        offset: u64,
    },
}

impl fmt::Display for CooldownScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CooldownScope::Plugin => write!(f, "plugin"),
            CooldownScope::Method { offset } => write!(f, "method {offset}"),
        }
    }
}

/// Unified error type for all Warden operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum WardenError {
    /// Wrong caller for an admin-gated or privileged operation
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Error message describing the rejected caller
        message: String,
    },

    /// Plugin, allowance, or alias absent
    #[error("Not found: {message}")]
    NotFound {
        /// Error message describing what was not found
        message: String,
    },

    /// Plugin validity window has passed
    #[error("Expired: {message}")]
    Expired {
        /// Error message describing the expired record
        message: String,
    },

    /// Plugin- or method-scoped cooldown not yet elapsed
    #[error("Cooldown: {scope} on cooldown at batch position {position}")]
    Cooldown {
        /// Clock that rejected the use
        scope: CooldownScope,
        /// Batch position at which the check ran
        position: usize,
    },

    /// Batch shape violates the delegated scope
    #[error("Malformed batch at position {position}: {reason}")]
    MalformedBatch {
        /// Batch position at which the scan aborted
        position: usize,
        /// Violation description
        reason: String,
    },

    /// Spend request exceeds what the allowance currently permits
    #[error("Allowance exceeded for asset {asset}: requested {requested}, available {available}")]
    AllowanceExceeded {
        /// Asset being spent
        asset: AssetId,
        /// Requested amount
        requested: u64,
        /// Amount the strategy would have allowed
        available: u64,
    },

    /// Allowance or alias already exists
    #[error("Duplicate: {message}")]
    Duplicate {
        /// Error message describing the existing entry
        message: String,
    },

    /// Program version rejected by an inspection collaborator.
    ///
    /// Reserved for the external plugin opcode checker; nothing in this
    /// workspace raises it.
    #[error("Unsupported version: {version}")]
    UnsupportedVersion {
        /// Version that was rejected
        version: u64,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// Error message describing the invalid input
        message: String,
    },

    /// Storage bound reached
    #[error("Capacity exceeded: {message}")]
    CapacityExceeded {
        /// Error message naming the full store
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message describing the serialization failure
        message: String,
    },

    /// Host ledger or collaborator failure
    #[error("Host error: {message}")]
    Host {
        /// Error message describing the host failure
        message: String,
    },
}

impl WardenError {
    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Create an expired error
    pub fn expired(message: impl Into<String>) -> Self {
        Self::Expired {
            message: message.into(),
        }
    }

    /// Create a cooldown error
    pub fn cooldown(scope: CooldownScope, position: usize) -> Self {
        Self::Cooldown { scope, position }
    }

    /// Create a malformed batch error
    pub fn malformed_batch(position: usize, reason: impl Into<String>) -> Self {
        Self::MalformedBatch {
            position,
            reason: reason.into(),
        }
    }

    /// Create an allowance exceeded error
    pub fn allowance_exceeded(asset: AssetId, requested: u64, available: u64) -> Self {
        Self::AllowanceExceeded {
            asset,
            requested,
            available,
        }
    }

    /// Create a duplicate error
    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::Duplicate {
            message: message.into(),
        }
    }

    /// Create an unsupported version error (raised by the external opcode checker)
    pub fn unsupported_version(version: u64) -> Self {
        Self::UnsupportedVersion { version }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a capacity exceeded error
    pub fn capacity_exceeded(message: impl Into<String>) -> Self {
        Self::CapacityExceeded {
            message: message.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a host error
    pub fn host(message: impl Into<String>) -> Self {
        Self::Host {
            message: message.into(),
        }
    }
}

/// Standard Result type for Warden operations
pub type WardenResult<T> = std::result::Result<T, WardenError>;

impl From<bincode::Error> for WardenError {
    fn from(err: bincode::Error) -> Self {
        Self::serialization(err.to_string())
    }
}
