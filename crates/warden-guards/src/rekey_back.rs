//! Rekey-back shape matching
//!
//! An entry "rekeys back" when it hands authority over the spending account
//! back to the wallet. Two shapes qualify:
//!
//! - a zero-amount payment or asset transfer from the spending account whose
//!   rekey target is the wallet's application address and which closes nothing
//! - a plain call to the wallet's own `verify_auth_addr()` with no parameters
//!
//! Plugin delegation and admin flash rekeys share this matcher; they differ
//! only in which account is spending.

use warden_core::{Address, AppId, OnCompletion, Selector, Txn, TxnBody};

/// Authority the wallet expects over `spending` once control is restored.
///
/// Rekeying the wallet's own application account to itself clears its
/// authority field, so that case restores to the zero address.
pub fn expected_auth(wallet: AppId, spending: &Address) -> Address {
    let wallet_address = wallet.address();
    if *spending == wallet_address {
        Address::ZERO
    } else {
        wallet_address
    }
}

/// Matcher for entries that restore the wallet's authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RekeyBack {
    /// Account currently holding delegated authority
    pub spending: Address,
    /// The wallet application
    pub wallet: AppId,
    /// Selector of the wallet's verification method
    pub verify_selector: Selector,
}

impl RekeyBack {
    /// Matcher for authority over `spending` returning to `wallet`
    pub fn new(spending: Address, wallet: AppId, verify_selector: Selector) -> Self {
        Self {
            spending,
            wallet,
            verify_selector,
        }
    }

    /// Whether `txn` restores authority
    pub fn matches(&self, txn: &Txn) -> bool {
        match &txn.body {
            TxnBody::Payment { amount, close_to, .. } => close_to.is_none() && self.restores(txn, *amount),
            TxnBody::AssetTransfer { amount, .. } => self.restores(txn, *amount),
            TxnBody::AppCall {
                app,
                on_completion,
                args,
            } => {
                *app == self.wallet
                    && *on_completion == OnCompletion::NoOp
                    && txn.rekey_to.is_none()
                    && args.len() == 1
                    && args[0].as_slice() == self.verify_selector.as_bytes()
            }
            TxnBody::KeyRegistration => false,
        }
    }

    fn restores(&self, txn: &Txn, amount: u64) -> bool {
        txn.sender == self.spending && amount == 0 && txn.rekey_to == Some(self.wallet.address())
    }
}
