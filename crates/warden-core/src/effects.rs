//! Host effect interfaces
//!
//! The wallet never owns ledger state. Moving funds, retargeting authority,
//! and provisioning custody sub-accounts are requests to the host, expressed
//! through these traits. Test kits implement them in memory; a real deployment
//! implements them over the execution host.

use crate::errors::WardenResult;
use crate::identifiers::{Address, AppId, AssetId};
use serde::{Deserialize, Serialize};

/// A fee-attributed funds movement issued by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Account funds leave
    pub sender: Address,
    /// Account funds arrive at
    pub receiver: Address,
    /// Asset moved (native when zero)
    pub asset: AssetId,
    /// Amount in base units
    pub amount: u64,
    /// New authority for `sender` after the transfer
    pub rekey_to: Option<Address>,
}

impl Transfer {
    /// Native currency transfer
    pub fn native(sender: Address, receiver: Address, amount: u64) -> Self {
        Self::of_asset(sender, receiver, AssetId::NATIVE, amount)
    }

    /// Transfer of `asset`
    pub fn of_asset(sender: Address, receiver: Address, asset: AssetId, amount: u64) -> Self {
        Self {
            sender,
            receiver,
            asset,
            amount,
            rekey_to: None,
        }
    }

    /// Zero-amount self transfer that hands `account`'s authority to `to`
    pub fn rekey(account: Address, to: Address) -> Self {
        Self {
            sender: account,
            receiver: account,
            asset: AssetId::NATIVE,
            amount: 0,
            rekey_to: Some(to),
        }
    }
}

/// Ledger primitives the wallet relies on.
pub trait LedgerEffects {
    /// Current authority over `account`; the zero address when never rekeyed.
    fn auth_addr(&self, account: &Address) -> Address;

    /// Execute `transfer` signed by `signer`. The host rejects it unless
    /// `signer` currently holds authority over the sender.
    fn submit(&mut self, signer: &Address, transfer: &Transfer) -> WardenResult<()>;
}

/// Custody sub-account factory collaborator.
pub trait CustodyFactoryEffects {
    /// Address that must receive the funding transfer
    fn factory_address(&self) -> Address;

    /// Create a sub-account owned by `owner_plugin`, whose authority is the
    /// creating wallet's application account. `funding` must already have
    /// been submitted to [`Self::factory_address`].
    fn create_custody(
        &mut self,
        creator: AppId,
        funding: &Transfer,
        owner_plugin: AppId,
    ) -> WardenResult<AppId>;

    /// Delete a sub-account, closing its remaining balances to `close_to`.
    /// Only the wallet that created it may delete it.
    fn delete_custody(
        &mut self,
        creator: AppId,
        sub_account: AppId,
        close_to: &Address,
    ) -> WardenResult<()>;
}

/// Composite host requirements for wallet operations.
pub trait HostEffects: LedgerEffects + CustodyFactoryEffects {}

impl<T> HostEffects for T where T: LedgerEffects + CustodyFactoryEffects {}
