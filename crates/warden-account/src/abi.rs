//! Wallet call encoding and dispatch
//!
//! A wallet call is an application call whose first argument is the method
//! selector and whose second (absent for `verify_auth_addr`) is the bincode
//! payload of the matching [`WalletCall`] variant.

use crate::account::AbstractedAccount;
use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_allowance::{AllowanceSpec, FundsRequest};
use warden_core::abi;
use warden_core::{
    Address, AppId, AssetId, CallContext, HostEffects, Selector, Txn, WardenError, WardenResult,
};
use warden_guards::BatchScope;
use warden_registry::{PluginName, PluginRegistration};

/// Every wallet entry point with its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WalletCall {
    /// Register or replace a plugin
    AddPlugin {
        /// Plugin application
        plugin: AppId,
        /// Allowed caller, zero for any
        caller: Address,
        /// Registration parameters
        registration: PluginRegistration,
    },
    /// Remove a plugin
    RemovePlugin {
        /// Plugin application
        plugin: AppId,
        /// Allowed caller, zero for any
        caller: Address,
    },
    /// Register a plugin under an alias
    AddNamedPlugin {
        /// Alias
        name: String,
        /// Plugin application
        plugin: AppId,
        /// Allowed caller, zero for any
        caller: Address,
        /// Registration parameters
        registration: PluginRegistration,
    },
    /// Remove an alias and its plugin
    RemoveNamedPlugin {
        /// Alias
        name: String,
    },
    /// Create allowances
    AddAllowances {
        /// Plugin application
        plugin: AppId,
        /// Allowed caller, zero for any
        caller: Address,
        /// One spec per asset
        specs: Vec<AllowanceSpec>,
    },
    /// Remove allowances
    RemoveAllowances {
        /// Plugin application
        plugin: AppId,
        /// Allowed caller, zero for any
        caller: Address,
        /// Assets to remove
        assets: Vec<AssetId>,
    },
    /// Delegate to a plugin
    RekeyToPlugin {
        /// Plugin application
        plugin: AppId,
        /// Use the any-caller registration
        global: bool,
        /// Method restriction offset per plugin call
        offsets: Vec<u64>,
        /// Funds moved into custody first
        funds: Vec<FundsRequest>,
    },
    /// Delegate to a plugin by alias
    RekeyToNamedPlugin {
        /// Alias
        name: String,
        /// Use the any-caller registration
        global: bool,
        /// Method restriction offset per plugin call
        offsets: Vec<u64>,
        /// Funds moved into custody first
        funds: Vec<FundsRequest>,
    },
    /// Admin rekey of the controlled address
    RekeyTo {
        /// New authority
        target: Address,
        /// Require and track restoration within the batch
        flash: bool,
    },
    /// Direct admin change
    ChangeAdmin {
        /// New admin
        new_admin: Address,
    },
    /// Admin change by a privileged delegated plugin
    PluginChangeAdmin {
        /// Plugin application
        plugin: AppId,
        /// Allowed caller of the registration
        caller: Address,
        /// New admin
        new_admin: Address,
    },
    /// End a delegation
    VerifyAuthAddr,
}

impl WalletCall {
    /// Method signature
    pub fn signature(&self) -> &'static str {
        match self {
            WalletCall::AddPlugin { .. } => abi::ADD_PLUGIN,
            WalletCall::RemovePlugin { .. } => abi::REMOVE_PLUGIN,
            WalletCall::AddNamedPlugin { .. } => abi::ADD_NAMED_PLUGIN,
            WalletCall::RemoveNamedPlugin { .. } => abi::REMOVE_NAMED_PLUGIN,
            WalletCall::AddAllowances { .. } => abi::ADD_ALLOWANCES,
            WalletCall::RemoveAllowances { .. } => abi::REMOVE_ALLOWANCES,
            WalletCall::RekeyToPlugin { .. } => abi::REKEY_TO_PLUGIN,
            WalletCall::RekeyToNamedPlugin { .. } => abi::REKEY_TO_NAMED_PLUGIN,
            WalletCall::RekeyTo { .. } => abi::REKEY_TO,
            WalletCall::ChangeAdmin { .. } => abi::CHANGE_ADMIN,
            WalletCall::PluginChangeAdmin { .. } => abi::PLUGIN_CHANGE_ADMIN,
            WalletCall::VerifyAuthAddr => abi::VERIFY_AUTH_ADDR,
        }
    }

    /// Method selector
    pub fn selector(&self) -> Selector {
        Selector::from_signature(self.signature())
    }

    /// Encode as application call arguments
    pub fn encode(&self) -> WardenResult<Vec<Vec<u8>>> {
        let selector = self.selector().as_bytes().to_vec();
        match self {
            WalletCall::VerifyAuthAddr => Ok(vec![selector]),
            call => Ok(vec![selector, bincode::serialize(call)?]),
        }
    }

    /// Decode application call arguments
    pub fn decode(args: &[Vec<u8>]) -> WardenResult<Self> {
        let selector = args
            .first()
            .and_then(|arg| Selector::from_arg(arg))
            .ok_or_else(|| WardenError::invalid("wallet call has no 4-byte selector"))?;

        let call = match args.get(1) {
            None => WalletCall::VerifyAuthAddr,
            Some(payload) => bincode::deserialize(payload)?,
        };
        if call.selector() != selector {
            return Err(WardenError::invalid(format!(
                "selector {selector} does not match {}",
                call.signature()
            )));
        }
        Ok(call)
    }

    /// Application call invoking this method on `wallet` from `sender`
    pub fn to_txn(&self, sender: Address, wallet: AppId) -> WardenResult<Txn> {
        Ok(Txn::app_call(sender, wallet, self.encode()?))
    }
}

impl AbstractedAccount {
    /// Execute one decoded wallet call
    pub fn dispatch<H: HostEffects>(
        &mut self,
        host: &mut H,
        scope: &mut BatchScope,
        ctx: &CallContext<'_>,
        call: WalletCall,
    ) -> WardenResult<()> {
        debug!(method = call.signature(), position = ctx.position, sender = %ctx.sender, "Wallet call");
        match call {
            WalletCall::AddPlugin {
                plugin,
                caller,
                registration,
            } => self
                .add_plugin(host, ctx, plugin, caller, &registration)
                .map(|_| ()),
            WalletCall::RemovePlugin { plugin, caller } => {
                self.remove_plugin(host, ctx, plugin, caller)
            }
            WalletCall::AddNamedPlugin {
                name,
                plugin,
                caller,
                registration,
            } => self
                .add_named_plugin(host, ctx, PluginName::new(name)?, plugin, caller, &registration)
                .map(|_| ()),
            WalletCall::RemoveNamedPlugin { name } => {
                self.remove_named_plugin(host, ctx, &PluginName::new(name)?)
            }
            WalletCall::AddAllowances {
                plugin,
                caller,
                specs,
            } => self.add_allowances(host, ctx, plugin, caller, &specs),
            WalletCall::RemoveAllowances {
                plugin,
                caller,
                assets,
            } => self.remove_allowances(host, ctx, plugin, caller, &assets),
            WalletCall::RekeyToPlugin {
                plugin,
                global,
                offsets,
                funds,
            } => self.rekey_to_plugin(host, scope, ctx, plugin, global, &offsets, &funds),
            WalletCall::RekeyToNamedPlugin {
                name,
                global,
                offsets,
                funds,
            } => self.rekey_to_named_plugin(
                host,
                scope,
                ctx,
                &PluginName::new(name)?,
                global,
                &offsets,
                &funds,
            ),
            WalletCall::RekeyTo { target, flash } => self.rekey_to(host, scope, ctx, target, flash),
            WalletCall::ChangeAdmin { new_admin } => self.change_admin(ctx, new_admin),
            WalletCall::PluginChangeAdmin {
                plugin,
                caller,
                new_admin,
            } => self.plugin_change_admin(host, ctx, plugin, caller, new_admin),
            WalletCall::VerifyAuthAddr => self.verify_auth_addr(host, scope, ctx),
        }
    }
}
