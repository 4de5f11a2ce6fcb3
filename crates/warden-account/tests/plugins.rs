//! Plugin administration: registration, aliases, storage rent, custody

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use warden_account::{StorageConfig, WalletCall, WalletConfig};
use warden_allowance::{AllowanceKey, AllowanceSpec};
use warden_core::{Address, AppId, AssetId, Selector, WardenError};
use warden_registry::{DelegationType, PluginKey, PluginName, PluginRegistration};
use warden_testkit::plugins::{PAY, PING};
use warden_testkit::{
    init_test_tracing, Network, PaymentPlugin, SignedTxn, WalletFixture, ADMIN, CALLER,
    CONTROLLED, STRANGER, WALLET_APP,
};

const PLUGIN: AppId = AppId::new(2_000);
const OTHER_PLUGIN: AppId = AppId::new(2_001);

fn network() -> Network {
    init_test_tracing();
    let mut net = WalletFixture::new().build();
    net.deploy(PLUGIN, PaymentPlugin);
    net
}

fn add_plugin(plugin: AppId, caller: Address, registration: PluginRegistration) -> WalletCall {
    WalletCall::AddPlugin {
        plugin,
        caller,
        registration,
    }
}

fn add_named(name: &str, registration: PluginRegistration) -> WalletCall {
    WalletCall::AddNamedPlugin {
        name: name.to_string(),
        plugin: PLUGIN,
        caller: CALLER,
        registration,
    }
}

#[test]
fn registration_installs_record_and_charges_rent() {
    let mut net = network();
    let before = net.balance(&CONTROLLED);
    net.advance(2);
    net.call(
        ADMIN,
        &add_plugin(
            PLUGIN,
            CALLER,
            PluginRegistration::new(DelegationType::Agent).with_cooldown(10),
        ),
    )
    .unwrap();

    let record = net.wallet.plugin(&PluginKey::new(PLUGIN, CALLER)).unwrap();
    assert_eq!(record.cooldown, 10);
    assert_eq!(record.last_called, 0);
    assert_eq!(record.installed_at, net.clock().round);
    assert!(record.deposit > 0);
    assert_eq!(net.balance(&CONTROLLED), before - record.deposit);
    assert_eq!(net.balance(&WALLET_APP.address()), record.deposit);
    assert_eq!(net.wallet.state().last_change, net.clock().timestamp);
}

#[test]
fn only_admin_registers_plugins() {
    let mut net = network();
    assert_matches!(
        net.call(
            STRANGER,
            &add_plugin(PLUGIN, CALLER, PluginRegistration::new(DelegationType::Agent)),
        ),
        Err(WardenError::Unauthorized { .. })
    );
    assert!(net.wallet.plugin(&PluginKey::new(PLUGIN, CALLER)).is_none());
}

#[test]
fn self_delegation_needs_a_concrete_caller() {
    let mut net = network();
    assert_matches!(
        net.call(
            ADMIN,
            &add_plugin(
                PLUGIN,
                Address::ZERO,
                PluginRegistration::new(DelegationType::SelfDelegated),
            ),
        ),
        Err(WardenError::Invalid { .. })
    );
}

#[test]
fn remove_then_add_starts_fresh() {
    let mut net = network();
    let registration = PluginRegistration::new(DelegationType::Agent).with_cooldown(1_000);
    net.call(ADMIN, &add_plugin(PLUGIN, CALLER, registration.clone()))
        .unwrap();
    net.execute(vec![
        net.wallet_call(
            CALLER,
            &WalletCall::RekeyToPlugin {
                plugin: PLUGIN,
                global: false,
                offsets: vec![],
                funds: vec![],
            },
        ),
        SignedTxn::by_sender(PaymentPlugin::release(CALLER, PLUGIN, WALLET_APP, CONTROLLED)),
        net.wallet_call(CALLER, &WalletCall::VerifyAuthAddr),
    ])
    .unwrap();
    let key = PluginKey::new(PLUGIN, CALLER);
    assert_eq!(net.wallet.plugin(&key).unwrap().last_called, net.clock().round);

    net.call(ADMIN, &WalletCall::RemovePlugin { plugin: PLUGIN, caller: CALLER })
        .unwrap();
    assert!(net.wallet.plugin(&key).is_none());
    assert_matches!(
        net.call(ADMIN, &WalletCall::RemovePlugin { plugin: PLUGIN, caller: CALLER }),
        Err(WardenError::NotFound { .. })
    );

    net.call(ADMIN, &add_plugin(PLUGIN, CALLER, registration))
        .unwrap();
    assert_eq!(net.wallet.plugin(&key).unwrap().last_called, 0);
}

#[test]
fn add_and_remove_restores_balances() {
    let mut net = network();
    let controlled = net.balance(&CONTROLLED);
    let wallet = net.balance(&WALLET_APP.address());

    net.call(
        ADMIN,
        &add_plugin(
            PLUGIN,
            CALLER,
            PluginRegistration::new(DelegationType::Agent).with_allowances(),
        ),
    )
    .unwrap();
    net.call(
        ADMIN,
        &WalletCall::AddAllowances {
            plugin: PLUGIN,
            caller: CALLER,
            specs: vec![AllowanceSpec::flat(AssetId::NATIVE, 1_000)],
        },
    )
    .unwrap();
    assert_eq!(net.host.custody_count(), 1);
    assert!(net.balance(&CONTROLLED) < controlled - net.wallet.config().custody_funding);

    net.call(ADMIN, &WalletCall::RemovePlugin { plugin: PLUGIN, caller: CALLER })
        .unwrap();

    assert_eq!(net.host.custody_count(), 0);
    assert!(net
        .wallet
        .allowance(&AllowanceKey::new(PLUGIN, CALLER, AssetId::NATIVE))
        .is_none());
    assert_eq!(net.balance(&CONTROLLED), controlled);
    assert_eq!(net.balance(&WALLET_APP.address()), wallet);
}

#[test]
fn self_controlled_wallet_pays_no_rent() {
    init_test_tracing();
    let mut net = WalletFixture::new().self_controlled().build();
    let before = net.balance(&WALLET_APP.address());
    net.call(
        ADMIN,
        &add_plugin(PLUGIN, CALLER, PluginRegistration::new(DelegationType::Agent)),
    )
    .unwrap();
    let record = net.wallet.plugin(&PluginKey::new(PLUGIN, CALLER)).unwrap();
    assert_eq!(record.deposit, 0);
    assert_eq!(net.balance(&WALLET_APP.address()), before);
}

#[test]
fn reregistration_keeps_custody_only_while_allowances_are_used() {
    let mut net = network();
    let key = PluginKey::new(PLUGIN, CALLER);
    let with_allowances = PluginRegistration::new(DelegationType::Agent).with_allowances();
    net.call(ADMIN, &add_plugin(PLUGIN, CALLER, with_allowances.clone()))
        .unwrap();
    net.call(
        ADMIN,
        &WalletCall::AddAllowances {
            plugin: PLUGIN,
            caller: CALLER,
            specs: vec![AllowanceSpec::flat(AssetId::NATIVE, 1_000)],
        },
    )
    .unwrap();
    let custody = net.wallet.plugin(&key).unwrap().custody;
    assert!(custody.is_some());

    net.call(ADMIN, &add_plugin(PLUGIN, CALLER, with_allowances.with_cooldown(5)))
        .unwrap();
    assert_eq!(net.wallet.plugin(&key).unwrap().custody, custody);
    assert_eq!(net.host.custody_count(), 1);
    assert!(net
        .wallet
        .allowance(&AllowanceKey::new(PLUGIN, CALLER, AssetId::NATIVE))
        .is_some());

    let controlled = net.balance(&CONTROLLED);
    net.call(
        ADMIN,
        &add_plugin(PLUGIN, CALLER, PluginRegistration::new(DelegationType::Agent)),
    )
    .unwrap();
    assert_eq!(net.wallet.plugin(&key).unwrap().custody, None);
    assert_eq!(net.host.custody_count(), 0);
    assert!(net
        .wallet
        .allowance(&AllowanceKey::new(PLUGIN, CALLER, AssetId::NATIVE))
        .is_none());
    assert!(net.balance(&CONTROLLED) > controlled);
}

#[test]
fn named_plugin_lifecycle() {
    let mut net = network();
    let name = PluginName::new("payments").unwrap();
    net.call(
        ADMIN,
        &add_named("payments", PluginRegistration::new(DelegationType::Agent)),
    )
    .unwrap();
    let named = net.wallet.named_plugin(&name).unwrap();
    assert_eq!(named.key, PluginKey::new(PLUGIN, CALLER));
    assert!(named.deposit > 0);

    assert_matches!(
        net.call(
            ADMIN,
            &add_named("payments", PluginRegistration::new(DelegationType::Agent)),
        ),
        Err(WardenError::Duplicate { .. })
    );

    let before = net.balance(&STRANGER);
    net.execute(vec![
        net.wallet_call(
            CALLER,
            &WalletCall::RekeyToNamedPlugin {
                name: "payments".to_string(),
                global: false,
                offsets: vec![],
                funds: vec![],
            },
        ),
        SignedTxn::by_sender(PaymentPlugin::pay_and_return(
            CALLER, PLUGIN, WALLET_APP, CONTROLLED, STRANGER, 25,
        )),
        net.wallet_call(CALLER, &WalletCall::VerifyAuthAddr),
    ])
    .unwrap();
    assert_eq!(net.balance(&STRANGER), before + 25);

    net.call(
        ADMIN,
        &WalletCall::RemoveNamedPlugin {
            name: "payments".to_string(),
        },
    )
    .unwrap();
    assert!(net.wallet.named_plugin(&name).is_none());
    assert!(net.wallet.plugin(&PluginKey::new(PLUGIN, CALLER)).is_none());
    assert_matches!(
        net.call(
            ADMIN,
            &WalletCall::RemoveNamedPlugin {
                name: "payments".to_string(),
            },
        ),
        Err(WardenError::NotFound { .. })
    );
}

#[test]
fn removing_plugin_drops_its_aliases() {
    let mut net = network();
    net.call(
        ADMIN,
        &add_named("payments", PluginRegistration::new(DelegationType::Agent)),
    )
    .unwrap();
    net.call(ADMIN, &WalletCall::RemovePlugin { plugin: PLUGIN, caller: CALLER })
        .unwrap();
    assert!(net
        .wallet
        .named_plugin(&PluginName::new("payments").unwrap())
        .is_none());
    assert_eq!(net.balance(&WALLET_APP.address()), 0);
}

#[test]
fn plugin_names_are_bounded() {
    let mut net = network();
    assert_matches!(
        net.call(ADMIN, &add_named("", PluginRegistration::new(DelegationType::Agent))),
        Err(WardenError::Invalid { .. })
    );
    let long = "x".repeat(33);
    assert_matches!(
        net.call(ADMIN, &add_named(&long, PluginRegistration::new(DelegationType::Agent))),
        Err(WardenError::Invalid { .. })
    );
}

#[test]
fn can_call_reflects_restrictions_and_clocks() {
    let mut net = network();
    let pay = Selector::from_signature(PAY);
    let ping = Selector::from_signature(PING);
    net.call(
        ADMIN,
        &add_plugin(
            PLUGIN,
            CALLER,
            PluginRegistration::new(DelegationType::Agent).with_method(pay, 0),
        ),
    )
    .unwrap();
    net.call(
        ADMIN,
        &add_plugin(
            OTHER_PLUGIN,
            Address::ZERO,
            PluginRegistration::new(DelegationType::Agent).valid_until(net.clock().round),
        ),
    )
    .unwrap();

    let clock = net.clock();
    assert!(net.wallet.can_call(PLUGIN, false, CALLER, pay, clock));
    assert!(!net.wallet.can_call(PLUGIN, false, CALLER, ping, clock));
    assert!(!net.wallet.can_call(PLUGIN, false, STRANGER, pay, clock));
    assert!(!net.wallet.can_call(PLUGIN, true, CALLER, pay, clock));

    assert!(net.wallet.can_call(OTHER_PLUGIN, true, STRANGER, ping, clock));
    assert!(!net
        .wallet
        .can_call(OTHER_PLUGIN, true, STRANGER, ping, clock.advanced(1)));
}

#[test]
fn plugin_store_capacity_is_enforced() {
    init_test_tracing();
    let config = WalletConfig {
        storage: StorageConfig {
            max_plugins: 2,
            ..StorageConfig::default()
        },
        ..WalletConfig::default()
    };
    let mut net = WalletFixture::new().with_config(config).build();
    let registration = PluginRegistration::new(DelegationType::Agent);
    net.call(ADMIN, &add_plugin(PLUGIN, CALLER, registration.clone()))
        .unwrap();
    net.call(ADMIN, &add_plugin(PLUGIN, STRANGER, registration.clone()))
        .unwrap();
    assert_matches!(
        net.call(ADMIN, &add_plugin(OTHER_PLUGIN, CALLER, registration.clone())),
        Err(WardenError::CapacityExceeded { .. })
    );
    // Replacing an existing record needs no new slot.
    net.call(ADMIN, &add_plugin(PLUGIN, CALLER, registration.with_cooldown(3)))
        .unwrap();
}
