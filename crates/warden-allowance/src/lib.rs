//! Warden Allowance - Layer 2: Metered Spending Budgets
//!
//! Tracks spending budgets keyed by `(plugin, caller, asset)` and enforces
//! them with one of three strategies (flat, recurring window, continuous
//! drip). A rejected spend is a hard abort; budgets are never partially
//! consumed.

#![forbid(unsafe_code)]

pub mod ledger;
pub mod strategy;

pub use ledger::{AllowanceKey, AllowanceLedger, FundsRequest};
pub use strategy::{AllowanceRecord, AllowanceSpec, SpendStrategy};
