//! Persisted wallet singleton

use serde::{Deserialize, Serialize};
use warden_core::{Address, AppId};

/// Wallet-wide state.
///
/// Nothing here records an in-flight delegation; that lives in the batch's
/// `BatchScope` and never outlives it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// The wallet application
    pub app_id: AppId,
    /// Root authority over configuration
    pub admin: Address,
    /// Account whose authority the wallet holds
    pub controlled_address: Address,
    /// Timestamp of the last genuine user action
    pub last_user_interaction: u64,
    /// Timestamp of the last configuration change
    pub last_change: u64,
    /// Receiver of custody funding transfers
    pub custody_factory: Address,
}

impl AccountState {
    /// The wallet application's own account
    pub fn app_address(&self) -> Address {
        self.app_id.address()
    }

    /// Whether the wallet controls its own application account
    pub fn controls_itself(&self) -> bool {
        self.controlled_address == self.app_address()
    }
}
