//! Wallet method signatures
//!
//! Selectors are derived from these signatures, so renaming one is a wire
//! break for every client.

use crate::identifiers::Selector;

/// Terminating verification call that restores authority
pub const VERIFY_AUTH_ADDR: &str = "verify_auth_addr()void";
/// Delegate to a plugin by application id
pub const REKEY_TO_PLUGIN: &str = "rekey_to_plugin(uint64,bool,uint64[],(uint64,uint64)[])void";
/// Delegate to a plugin by alias
pub const REKEY_TO_NAMED_PLUGIN: &str =
    "rekey_to_named_plugin(string,bool,uint64[],(uint64,uint64)[])void";
/// Admin rekey of the controlled address
pub const REKEY_TO: &str = "rekey_to(address,bool)void";
/// Direct admin change
pub const CHANGE_ADMIN: &str = "change_admin(address)void";
/// Admin change by a privileged, currently delegated plugin
pub const PLUGIN_CHANGE_ADMIN: &str = "plugin_change_admin(uint64,address,address)void";
/// Plugin registration
pub const ADD_PLUGIN: &str = "add_plugin(uint64,address,bool,uint8,uint64,uint64,(byte[4],uint64)[],bool,bool)void";
/// Plugin removal
pub const REMOVE_PLUGIN: &str = "remove_plugin(uint64,address)void";
/// Named plugin registration
pub const ADD_NAMED_PLUGIN: &str =
    "add_named_plugin(string,uint64,address,bool,uint8,uint64,uint64,(byte[4],uint64)[],bool,bool)void";
/// Named plugin removal
pub const REMOVE_NAMED_PLUGIN: &str = "remove_named_plugin(string)void";
/// Allowance creation
pub const ADD_ALLOWANCES: &str =
    "add_allowances(uint64,address,(uint64,uint8,uint64,uint64,uint64,uint64)[])void";
/// Allowance removal
pub const REMOVE_ALLOWANCES: &str = "remove_allowances(uint64,address,uint64[])void";

/// Selector of the verification call
pub fn verify_auth_addr_selector() -> Selector {
    Selector::from_signature(VERIFY_AUTH_ADDR)
}
