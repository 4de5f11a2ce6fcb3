//! Standard wallet fixture

use crate::executor::Network;
use crate::host::SimulatedHost;
use warden_account::{AbstractedAccount, WalletConfig};
use warden_core::{Address, AppId, AssetId, Clock, CustodyFactoryEffects};

/// The wallet application
pub const WALLET_APP: AppId = AppId::new(1_000);
/// The custody factory application
pub const FACTORY_APP: AppId = AppId::new(900);
/// Wallet admin
pub const ADMIN: Address = Address([0xAD; 32]);
/// External account the wallet controls
pub const CONTROLLED: Address = Address([0xC0; 32]);
/// Account that drives delegations
pub const CALLER: Address = Address([0xCA; 32]);
/// Account with no role
pub const STRANGER: Address = Address([0x55; 32]);

/// Native balance every fixture account starts with
pub const STARTING_BALANCE: u64 = 100_000_000;

/// First application id handed out to custody accounts
const FIRST_CUSTODY_APP: u64 = 5_000;

/// Builder for a funded [`Network`].
#[derive(Debug, Clone)]
pub struct WalletFixture {
    config: WalletConfig,
    controlled: Address,
    clock: Clock,
    assets: Vec<AssetId>,
}

impl Default for WalletFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl WalletFixture {
    /// Wallet controlling [`CONTROLLED`] with the default configuration
    pub fn new() -> Self {
        Self {
            config: WalletConfig::default(),
            controlled: CONTROLLED,
            clock: Clock::new(1_000, 1_700_000_000),
            assets: Vec::new(),
        }
    }

    /// Use `config`
    pub fn with_config(mut self, config: WalletConfig) -> Self {
        self.config = config;
        self
    }

    /// Wallet controls its own application account
    pub fn self_controlled(mut self) -> Self {
        self.controlled = Address::ZERO;
        self
    }

    /// Start at `clock`
    pub fn at(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Also fund the controlled account with `asset`
    pub fn holding(mut self, asset: AssetId) -> Self {
        self.assets.push(asset);
        self
    }

    /// Build the network
    pub fn build(self) -> Network {
        let mut host = SimulatedHost::new(FACTORY_APP, FIRST_CUSTODY_APP);
        let wallet = AbstractedAccount::create(
            WALLET_APP,
            self.controlled,
            ADMIN,
            host.factory_address(),
            self.config,
            self.clock,
        )
        .expect("fixture wallet is valid");

        let controlled = wallet.state().controlled_address;
        if controlled != WALLET_APP.address() {
            host.set_auth(controlled, WALLET_APP.address());
        }
        for account in [controlled, ADMIN, CALLER, STRANGER] {
            host.fund(account, AssetId::NATIVE, STARTING_BALANCE);
        }
        for asset in self.assets {
            host.fund(controlled, asset, STARTING_BALANCE);
        }
        Network::new(host, wallet, self.clock)
    }
}
