//! Mock plugin programs
//!
//! Each method takes the calling wallet's application id as its first
//! argument after the selector, as every plugin method must.

use crate::executor::{PluginCall, PluginEnv, PluginProgram};
use warden_account::WalletCall;
use warden_core::batch::encode_u64;
use warden_core::{Address, AppId, Selector, Transfer, Txn, WardenError, WardenResult};

/// `pay(wallet, from, to, amount)`: move native funds out of a delegated account
pub const PAY: &str = "pay(uint64,address,address,uint64)void";
/// `pay_and_return(wallet, from, to, amount)`: pay, then hand authority back
pub const PAY_AND_RETURN: &str = "pay_and_return(uint64,address,address,uint64)void";
/// `ping(wallet)`: do nothing
pub const PING: &str = "ping(uint64)void";
/// `release(wallet, account)`: hand authority over `account` back to the wallet
pub const RELEASE: &str = "release(uint64,address)void";
/// `claim_admin(wallet, caller, new_admin)`: change the wallet admin, then hand authority back
pub const CLAIM_ADMIN: &str = "claim_admin(uint64,address,address)void";

fn unknown_method(call: &PluginCall<'_>) -> WardenError {
    WardenError::invalid(format!(
        "plugin {} has no method {}",
        call.app,
        call.selector()
            .map(|selector| selector.to_string())
            .unwrap_or_default()
    ))
}

fn hand_back(env: &mut PluginEnv<'_>, account: Address) -> WardenResult<()> {
    let wallet = env.wallet_app().address();
    env.submit(&Transfer::rekey(account, wallet))
}

/// Spends from whichever account it was given authority over.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaymentPlugin;

impl PaymentPlugin {
    /// `pay` call from `sender`
    pub fn pay(sender: Address, plugin: AppId, wallet: AppId, from: Address, to: Address, amount: u64) -> Txn {
        Self::transfer_call(PAY, sender, plugin, wallet, from, to, amount)
    }

    /// `pay_and_return` call from `sender`
    pub fn pay_and_return(
        sender: Address,
        plugin: AppId,
        wallet: AppId,
        from: Address,
        to: Address,
        amount: u64,
    ) -> Txn {
        Self::transfer_call(PAY_AND_RETURN, sender, plugin, wallet, from, to, amount)
    }

    /// `ping` call from `sender`
    pub fn ping(sender: Address, plugin: AppId, wallet: AppId) -> Txn {
        Txn::method_call(
            sender,
            plugin,
            Selector::from_signature(PING),
            vec![encode_u64(wallet.value())],
        )
    }

    /// `release` call from `sender`
    pub fn release(sender: Address, plugin: AppId, wallet: AppId, account: Address) -> Txn {
        Txn::method_call(
            sender,
            plugin,
            Selector::from_signature(RELEASE),
            vec![encode_u64(wallet.value()), account.as_bytes().to_vec()],
        )
    }

    fn transfer_call(
        signature: &str,
        sender: Address,
        plugin: AppId,
        wallet: AppId,
        from: Address,
        to: Address,
        amount: u64,
    ) -> Txn {
        Txn::method_call(
            sender,
            plugin,
            Selector::from_signature(signature),
            vec![
                encode_u64(wallet.value()),
                from.as_bytes().to_vec(),
                to.as_bytes().to_vec(),
                encode_u64(amount),
            ],
        )
    }
}

impl PluginProgram for PaymentPlugin {
    fn call(&self, env: &mut PluginEnv<'_>, call: &PluginCall<'_>) -> WardenResult<()> {
        let selector = call.selector();
        if selector == Some(Selector::from_signature(PING)) {
            return Ok(());
        }
        if selector == Some(Selector::from_signature(RELEASE)) {
            let account = call.address_arg(2)?;
            return hand_back(env, account);
        }
        let returning = selector == Some(Selector::from_signature(PAY_AND_RETURN));
        if !returning && selector != Some(Selector::from_signature(PAY)) {
            return Err(unknown_method(call));
        }

        let from = call.address_arg(2)?;
        let to = call.address_arg(3)?;
        let amount = call.u64_arg(4)?;
        env.submit(&Transfer::native(from, to, amount))?;
        if returning {
            hand_back(env, from)?;
        }
        Ok(())
    }
}

/// Uses its admin privilege to install a new wallet admin.
#[derive(Debug, Default, Clone, Copy)]
pub struct AdminPlugin;

impl AdminPlugin {
    /// `claim_admin` call from `sender`
    pub fn claim_admin(
        sender: Address,
        plugin: AppId,
        wallet: AppId,
        caller: Address,
        new_admin: Address,
    ) -> Txn {
        Txn::method_call(
            sender,
            plugin,
            Selector::from_signature(CLAIM_ADMIN),
            vec![
                encode_u64(wallet.value()),
                caller.as_bytes().to_vec(),
                new_admin.as_bytes().to_vec(),
            ],
        )
    }
}

impl PluginProgram for AdminPlugin {
    fn call(&self, env: &mut PluginEnv<'_>, call: &PluginCall<'_>) -> WardenResult<()> {
        if call.selector() != Some(Selector::from_signature(CLAIM_ADMIN)) {
            return Err(unknown_method(call));
        }
        let caller = call.address_arg(2)?;
        let new_admin = call.address_arg(3)?;
        env.call_wallet(WalletCall::PluginChangeAdmin {
            plugin: call.app,
            caller,
            new_admin,
        })?;
        let controlled = env.controlled_address();
        hand_back(env, controlled)
    }
}
