//! Core identifier types
//!
//! Applications, accounts, assets, and method selectors as the host ledger
//! sees them. Application accounts are derived deterministically from the
//! application id so the wallet can name a plugin's signing address without
//! asking the host.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512_256};
use std::fmt;

/// Domain separator for application account derivation
const APP_ADDRESS_PREFIX: &[u8] = b"appID";

/// A 32-byte account address on the host ledger.
///
/// The zero address doubles as the "global caller" wildcard in plugin keys
/// and as the "not rekeyed" authority marker.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Address(pub [u8; 32]);

impl Address {
    /// The zero address
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Whether this is the zero address
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// View the raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for Address {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// Application (program) identifier
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct AppId(pub u64);

impl AppId {
    /// Create a new application id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the raw id
    pub fn value(self) -> u64 {
        self.0
    }

    /// The account controlled by this application: `SHA-512/256("appID" || be64(id))`.
    pub fn address(self) -> Address {
        let mut hasher = Sha512_256::new();
        hasher.update(APP_ADDRESS_PREFIX);
        hasher.update(self.0.to_be_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        Address(bytes)
    }
}

impl fmt::Display for AppId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "app-{}", self.0)
    }
}

impl From<u64> for AppId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Asset identifier; `0` is the native currency
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct AssetId(pub u64);

impl AssetId {
    /// Native currency
    pub const NATIVE: Self = Self(0);

    /// Create a new asset id
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Whether this names the native currency
    pub fn is_native(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "native")
        } else {
            write!(f, "asset-{}", self.0)
        }
    }
}

impl From<u64> for AssetId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Four-byte method selector: the leading bytes of `SHA-512/256(signature)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Selector(pub [u8; 4]);

impl Selector {
    /// Selector length in bytes
    pub const LEN: usize = 4;

    /// Derive the selector for a method signature such as `"pay(uint64,uint64)void"`.
    pub fn from_signature(signature: &str) -> Self {
        let digest = Sha512_256::digest(signature.as_bytes());
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(&digest[..Self::LEN]);
        Self(bytes)
    }

    /// Parse a selector from a call argument; `None` unless exactly four bytes.
    pub fn from_arg(arg: &[u8]) -> Option<Self> {
        <[u8; 4]>::try_from(arg).ok().map(Self)
    }

    /// View the raw bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}
