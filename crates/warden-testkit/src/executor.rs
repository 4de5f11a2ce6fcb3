//! Atomic batch executor
//!
//! Plays the host's role for one wallet: checks each entry's signer, applies
//! payments and rekeys, routes wallet calls to [`AbstractedAccount::dispatch`]
//! and plugin calls to registered [`PluginProgram`]s. The whole batch commits
//! or none of it does.
//!
//! Application accounts hold no signing key. Anything they do happens as an
//! inner transaction issued by their program through [`PluginEnv`].

use crate::host::SimulatedHost;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, warn};
use warden_account::{AbstractedAccount, WalletCall};
use warden_core::{
    Address, AppId, AssetId, Batch, CallContext, Clock, LedgerEffects, Selector, Transfer, Txn,
    TxnBody, WardenError, WardenResult,
};
use warden_guards::BatchScope;

/// A batch entry and the key that signed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTxn {
    /// The entry
    pub txn: Txn,
    /// Signing account
    pub signer: Address,
}

impl SignedTxn {
    /// Entry signed by `signer`
    pub fn new(txn: Txn, signer: Address) -> Self {
        Self { txn, signer }
    }

    /// Entry signed by its own sender
    pub fn by_sender(txn: Txn) -> Self {
        let signer = txn.sender;
        Self { txn, signer }
    }
}

/// A plugin application call as the plugin program sees it.
#[derive(Debug, Clone, Copy)]
pub struct PluginCall<'a> {
    /// The plugin application
    pub app: AppId,
    /// Sender of the call
    pub sender: Address,
    /// Raw arguments
    pub args: &'a [Vec<u8>],
}

impl PluginCall<'_> {
    /// Method selector
    pub fn selector(&self) -> Option<Selector> {
        self.args.first().and_then(|arg| Selector::from_arg(arg))
    }

    /// Argument `index` as an integer
    pub fn u64_arg(&self, index: usize) -> WardenResult<u64> {
        let arg = self
            .args
            .get(index)
            .filter(|arg| arg.len() <= 8)
            .ok_or_else(|| WardenError::invalid(format!("argument {index} is not a uint64")))?;
        let mut bytes = [0u8; 8];
        bytes[8 - arg.len()..].copy_from_slice(arg);
        Ok(u64::from_be_bytes(bytes))
    }

    /// Argument `index` as an address
    pub fn address_arg(&self, index: usize) -> WardenResult<Address> {
        self.args
            .get(index)
            .and_then(|arg| <[u8; 32]>::try_from(arg.as_slice()).ok())
            .map(Address::from_bytes)
            .ok_or_else(|| WardenError::invalid(format!("argument {index} is not an address")))
    }
}

/// What a plugin program may touch while it runs.
pub struct PluginEnv<'a> {
    host: &'a mut SimulatedHost,
    wallet: &'a mut AbstractedAccount,
    scope: &'a mut BatchScope,
    batch: &'a Batch,
    position: usize,
    clock: Clock,
    app: AppId,
}

impl PluginEnv<'_> {
    /// Submit a transfer signed by the plugin's application account
    pub fn submit(&mut self, transfer: &Transfer) -> WardenResult<()> {
        self.host.submit(&self.app.address(), transfer)
    }

    /// Invoke the wallet as an inner call from the plugin's application account
    pub fn call_wallet(&mut self, call: WalletCall) -> WardenResult<()> {
        let ctx = CallContext::new(self.batch, self.position, self.app.address(), self.clock);
        self.wallet.dispatch(&mut *self.host, &mut *self.scope, &ctx, call)
    }

    /// The wallet application
    pub fn wallet_app(&self) -> AppId {
        self.wallet.app_id()
    }

    /// Account the wallet controls
    pub fn controlled_address(&self) -> Address {
        self.wallet.state().controlled_address
    }

    /// Read-only host view
    pub fn host(&self) -> &SimulatedHost {
        &*self.host
    }
}

/// A plugin application's behaviour.
pub trait PluginProgram: fmt::Debug {
    /// Execute one call to the plugin
    fn call(&self, env: &mut PluginEnv<'_>, call: &PluginCall<'_>) -> WardenResult<()>;
}

/// One wallet, its host, and the plugin programs it may be delegated to.
#[derive(Debug)]
pub struct Network {
    /// Host ledger
    pub host: SimulatedHost,
    /// The wallet
    pub wallet: AbstractedAccount,
    plugins: BTreeMap<AppId, Rc<dyn PluginProgram>>,
    clock: Clock,
}

impl Network {
    /// Network around an existing host and wallet
    pub fn new(host: SimulatedHost, wallet: AbstractedAccount, clock: Clock) -> Self {
        Self {
            host,
            wallet,
            plugins: BTreeMap::new(),
            clock,
        }
    }

    /// Install `program` as application `app`
    pub fn deploy(&mut self, app: AppId, program: impl PluginProgram + 'static) {
        self.plugins.insert(app, Rc::new(program));
    }

    /// Current clock
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// Advance both clocks by `epochs`
    pub fn advance(&mut self, epochs: u64) {
        self.clock = self.clock.advanced(epochs);
    }

    /// Native balance of `account`
    pub fn balance(&self, account: &Address) -> u64 {
        self.host.balance(account, AssetId::NATIVE)
    }

    /// Wallet call entry signed by `sender`
    pub fn wallet_call(&self, sender: Address, call: &WalletCall) -> SignedTxn {
        let txn = call
            .to_txn(sender, self.wallet.app_id())
            .expect("wallet calls always encode");
        SignedTxn::by_sender(txn)
    }

    /// Execute a single wallet call as its own batch
    pub fn call(&mut self, sender: Address, call: &WalletCall) -> WardenResult<()> {
        let entry = self.wallet_call(sender, call);
        self.execute(vec![entry])
    }

    /// Execute `txns` atomically
    pub fn execute(&mut self, txns: Vec<SignedTxn>) -> WardenResult<()> {
        let limit = self.wallet.config().max_batch_size;
        if txns.len() > limit {
            return Err(WardenError::invalid(format!(
                "batch of {} exceeds host limit {limit}",
                txns.len()
            )));
        }

        let host = self.host.clone();
        let wallet = self.wallet.clone();
        let result = self.run(&txns);
        if let Err(e) = &result {
            warn!(error = %e, entries = txns.len(), "Batch rolled back");
            self.host = host;
            self.wallet = wallet;
        }
        result
    }

    fn run(&mut self, txns: &[SignedTxn]) -> WardenResult<()> {
        let batch = Batch::new(txns.iter().map(|signed| signed.txn.clone()).collect());
        let mut scope = BatchScope::new();
        for (position, signed) in txns.iter().enumerate() {
            self.apply(&batch, &mut scope, position, signed)?;
        }
        self.wallet.close_batch(&self.host, scope)
    }

    /// Whether `account` is an application account, which cannot sign
    pub fn is_application(&self, account: &Address) -> bool {
        *account == self.wallet.app_id().address()
            || self.plugins.keys().any(|app| app.address() == *account)
            || self.host.is_custody_application(account)
    }

    fn apply(
        &mut self,
        batch: &Batch,
        scope: &mut BatchScope,
        position: usize,
        signed: &SignedTxn,
    ) -> WardenResult<()> {
        let txn = &signed.txn;
        if self.is_application(&signed.signer) {
            return Err(WardenError::host(format!(
                "entry {position}: application account {} cannot sign",
                signed.signer
            )));
        }
        if !self.host.authorizes(&signed.signer, &txn.sender) {
            return Err(WardenError::host(format!(
                "entry {position}: {} cannot sign for {}",
                signed.signer, txn.sender
            )));
        }
        debug!(position, sender = %txn.sender, "Applying entry");

        match &txn.body {
            TxnBody::Payment {
                receiver,
                amount,
                close_to,
            } => {
                let transfer = Transfer {
                    sender: txn.sender,
                    receiver: *receiver,
                    asset: AssetId::NATIVE,
                    amount: *amount,
                    rekey_to: txn.rekey_to,
                };
                self.host.submit(&signed.signer, &transfer)?;
                if let Some(close_to) = close_to {
                    self.host.close_out(txn.sender, *close_to);
                }
            }
            TxnBody::AssetTransfer {
                asset,
                receiver,
                amount,
            } => {
                let transfer = Transfer {
                    sender: txn.sender,
                    receiver: *receiver,
                    asset: *asset,
                    amount: *amount,
                    rekey_to: txn.rekey_to,
                };
                self.host.submit(&signed.signer, &transfer)?;
            }
            TxnBody::KeyRegistration => {
                if let Some(to) = txn.rekey_to {
                    self.host
                        .submit(&signed.signer, &Transfer::rekey(txn.sender, to))?;
                }
            }
            TxnBody::AppCall { app, args, .. } => {
                if *app == self.wallet.app_id() {
                    let call = WalletCall::decode(args)?;
                    let ctx = CallContext::new(batch, position, txn.sender, self.clock);
                    self.wallet.dispatch(&mut self.host, scope, &ctx, call)?;
                } else if let Some(program) = self.plugins.get(app).cloned() {
                    let mut env = PluginEnv {
                        host: &mut self.host,
                        wallet: &mut self.wallet,
                        scope: &mut *scope,
                        batch,
                        position,
                        clock: self.clock,
                        app: *app,
                    };
                    let call = PluginCall {
                        app: *app,
                        sender: txn.sender,
                        args,
                    };
                    program.call(&mut env, &call)?;
                }
                if let Some(to) = txn.rekey_to {
                    self.host
                        .submit(&signed.signer, &Transfer::rekey(txn.sender, to))?;
                }
            }
        }
        Ok(())
    }
}
