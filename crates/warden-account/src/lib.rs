//! Warden Account - Layer 4: Abstracted Account
//!
//! The wallet itself. It owns the plugin registry and allowance ledger,
//! gates configuration behind a single admin, lends authority to plugins
//! after the batch guards approve, and takes it back with the
//! `verify_auth_addr` call.
//!
//! Host interaction goes through `warden_core::HostEffects`; a batch is
//! driven by calling [`AbstractedAccount::dispatch`] for each wallet call
//! with a shared `BatchScope`, then [`AbstractedAccount::close_batch`].

#![forbid(unsafe_code)]

pub mod abi;
pub mod account;
pub mod config;
pub mod state;

pub use abi::WalletCall;
pub use account::AbstractedAccount;
pub use config::{StorageConfig, StorageRent, WalletConfig};
pub use state::AccountState;
