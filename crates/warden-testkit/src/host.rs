//! In-memory host ledger and custody factory

use std::collections::BTreeMap;
use tracing::debug;
use warden_core::{
    Address, AppId, AssetId, CustodyFactoryEffects, LedgerEffects, Transfer, WardenError,
    WardenResult,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct CustodyEntry {
    creator: AppId,
    owner_plugin: AppId,
}

/// Ledger state plus the custody factory, all in memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulatedHost {
    balances: BTreeMap<(Address, AssetId), u64>,
    auth: BTreeMap<Address, Address>,
    custody: BTreeMap<AppId, CustodyEntry>,
    factory_app: AppId,
    next_app: u64,
}

impl SimulatedHost {
    /// Empty ledger with a custody factory at `factory_app`.
    ///
    /// Custody accounts are allocated application ids from `first_custody_app`.
    pub fn new(factory_app: AppId, first_custody_app: u64) -> Self {
        Self {
            balances: BTreeMap::new(),
            auth: BTreeMap::new(),
            custody: BTreeMap::new(),
            factory_app,
            next_app: first_custody_app,
        }
    }

    /// Credit `amount` of `asset` to `account` out of thin air
    pub fn fund(&mut self, account: Address, asset: AssetId, amount: u64) {
        let balance = self.balances.entry((account, asset)).or_default();
        *balance = balance.saturating_add(amount);
    }

    /// Balance of `asset` held by `account`
    pub fn balance(&self, account: &Address, asset: AssetId) -> u64 {
        self.balances.get(&(*account, asset)).copied().unwrap_or(0)
    }

    /// Set `account`'s authority directly, as an out-of-band rekey would
    pub fn set_auth(&mut self, account: Address, to: Address) {
        self.apply_rekey(account, to);
    }

    /// Whether `signer` may act for `account`
    pub fn authorizes(&self, signer: &Address, account: &Address) -> bool {
        match self.auth.get(account) {
            Some(auth) => auth == signer,
            None => signer == account,
        }
    }

    /// Plugin that owns custody account `app`
    pub fn custody_owner(&self, app: AppId) -> Option<AppId> {
        self.custody.get(&app).map(|entry| entry.owner_plugin)
    }

    /// Whether `account` belongs to the custody factory or a custody account
    pub fn is_custody_application(&self, account: &Address) -> bool {
        *account == self.factory_app.address()
            || self.custody.keys().any(|app| app.address() == *account)
    }

    /// Number of live custody accounts
    pub fn custody_count(&self) -> usize {
        self.custody.len()
    }

    fn apply_rekey(&mut self, account: Address, to: Address) {
        if to == account || to.is_zero() {
            self.auth.remove(&account);
        } else {
            self.auth.insert(account, to);
        }
    }

    fn debit(&mut self, account: Address, asset: AssetId, amount: u64) -> WardenResult<()> {
        let balance = self.balance(&account, asset);
        let remaining = balance.checked_sub(amount).ok_or_else(|| {
            WardenError::host(format!(
                "{account} holds {balance} of {asset}, needs {amount}"
            ))
        })?;
        self.balances.insert((account, asset), remaining);
        Ok(())
    }

    fn credit(&mut self, account: Address, asset: AssetId, amount: u64) {
        self.fund(account, asset, amount);
    }

    /// Move every balance held by `from` to `to`
    pub fn close_out(&mut self, from: Address, to: Address) {
        let held: Vec<(AssetId, u64)> = self
            .balances
            .iter()
            .filter(|((account, _), _)| *account == from)
            .map(|((_, asset), amount)| (*asset, *amount))
            .collect();
        for (asset, amount) in held {
            self.balances.remove(&(from, asset));
            self.credit(to, asset, amount);
        }
    }
}

impl LedgerEffects for SimulatedHost {
    fn auth_addr(&self, account: &Address) -> Address {
        self.auth.get(account).copied().unwrap_or(Address::ZERO)
    }

    fn submit(&mut self, signer: &Address, transfer: &Transfer) -> WardenResult<()> {
        if !self.authorizes(signer, &transfer.sender) {
            return Err(WardenError::host(format!(
                "{signer} has no authority over {}",
                transfer.sender
            )));
        }
        if transfer.amount > 0 {
            self.debit(transfer.sender, transfer.asset, transfer.amount)?;
            self.credit(transfer.receiver, transfer.asset, transfer.amount);
        }
        if let Some(to) = transfer.rekey_to {
            self.apply_rekey(transfer.sender, to);
        }
        debug!(
            sender = %transfer.sender,
            receiver = %transfer.receiver,
            asset = %transfer.asset,
            amount = transfer.amount,
            "Transfer applied"
        );
        Ok(())
    }
}

impl CustodyFactoryEffects for SimulatedHost {
    fn factory_address(&self) -> Address {
        self.factory_app.address()
    }

    fn create_custody(
        &mut self,
        creator: AppId,
        funding: &Transfer,
        owner_plugin: AppId,
    ) -> WardenResult<AppId> {
        let factory = self.factory_address();
        if funding.receiver != factory || !funding.asset.is_native() {
            return Err(WardenError::host("custody funding must pay the factory"));
        }
        let app = AppId::new(self.next_app);
        self.next_app += 1;

        self.debit(factory, AssetId::NATIVE, funding.amount)?;
        self.credit(app.address(), AssetId::NATIVE, funding.amount);
        self.apply_rekey(app.address(), creator.address());
        self.custody.insert(
            app,
            CustodyEntry {
                creator,
                owner_plugin,
            },
        );
        Ok(app)
    }

    fn delete_custody(
        &mut self,
        creator: AppId,
        sub_account: AppId,
        close_to: &Address,
    ) -> WardenResult<()> {
        let entry = self
            .custody
            .get(&sub_account)
            .ok_or_else(|| WardenError::not_found(format!("custody account {sub_account}")))?;
        if entry.creator != creator {
            return Err(WardenError::unauthorized(format!(
                "{creator} did not create custody account {sub_account}"
            )));
        }
        self.custody.remove(&sub_account);
        self.close_out(sub_account.address(), *close_to);
        self.auth.remove(&sub_account.address());
        Ok(())
    }
}
