//! Warden Core - Foundation Layer
//!
//! Foundational types shared by every Warden crate. Nothing in here knows
//! about plugins or allowances; it only describes the world the wallet runs in.
//!
//! # Contents
//!
//! - Identifiers: `AppId`, `Address`, `AssetId`, `Selector`
//! - Epoch clocks: `Clock`, `EpochUnit`
//! - Unified errors: `WardenError`, `WardenResult`
//! - Batch model: `Batch`, `Txn`, `CallContext` (the host's in-flight group)
//! - Host effects: `LedgerEffects`, `CustodyFactoryEffects`, `HostEffects`
//! - Storage: `BoxMap`, `StorageKey` (capacity-bounded typed boxes)
//!
//! Execution is single-threaded and batch-atomic; every error aborts the
//! enclosing batch, so none of these types carry recovery state.

#![forbid(unsafe_code)]

/// Method selectors for the wallet's own entry points
pub mod abi;

/// Host batch projection and per-call context
pub mod batch;

/// Host effect interfaces (ledger, custody factory)
pub mod effects;

/// Unified error handling
pub mod errors;

/// Application, account, asset, and method identifiers
pub mod identifiers;

/// Capacity-bounded typed storage boxes
pub mod storage;

/// Epoch clocks
pub mod time;

pub use batch::{Batch, CallContext, OnCompletion, Txn, TxnBody, MAX_BATCH_SIZE};
pub use effects::{CustodyFactoryEffects, HostEffects, LedgerEffects, Transfer};
pub use errors::{CooldownScope, WardenError, WardenResult};
pub use identifiers::{Address, AppId, AssetId, Selector};
pub use storage::{BoxMap, StorageKey};
pub use time::{Clock, EpochUnit};
