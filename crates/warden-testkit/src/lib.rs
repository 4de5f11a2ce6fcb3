//! Warden Testing Infrastructure
//!
//! In-memory stand-ins for the host so tests can drive real batches end to
//! end:
//!
//! - [`SimulatedHost`]: balances, authority fields, and the custody factory
//! - [`Network`]: executes a batch of signed entries atomically, rolling
//!   everything back on the first error
//! - [`plugins`]: small plugin programs that move funds and restore authority
//! - [`fixtures`]: a funded wallet with well-known addresses
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! warden-testkit = { path = "../warden-testkit" }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod executor;
pub mod fixtures;
pub mod host;
pub mod plugins;

pub use executor::{Network, PluginCall, PluginEnv, PluginProgram, SignedTxn};
pub use fixtures::{
    WalletFixture, ADMIN, CALLER, CONTROLLED, FACTORY_APP, STARTING_BALANCE, STRANGER, WALLET_APP,
};
pub use host::SimulatedHost;
pub use plugins::{AdminPlugin, PaymentPlugin};

/// Install a test subscriber once; later calls are no-ops.
///
/// Honors `RUST_LOG`, defaulting to `warn`.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}
