//! Warden Registry - Layer 2: Plugin Delegation Records
//!
//! Holds the per-wallet records that say which plugin application may drive
//! the wallet on behalf of which caller, for how long, how often, and through
//! which methods. Also owns the alias layer mapping names to records.

#![forbid(unsafe_code)]

pub mod names;
pub mod record;
pub mod registry;

pub use names::{PluginName, MAX_NAME_LEN};
pub use record::{
    DelegationType, MethodRestriction, PluginKey, PluginRecord, PluginRegistration,
};
pub use registry::{method_check, MethodCheck, NamedPlugin, PluginRegistry, PluginStatus};
