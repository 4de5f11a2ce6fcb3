//! Admin control: admin changes, plugin-driven admin changes, and rekeys

#![allow(clippy::unwrap_used)]

use assert_matches::assert_matches;
use warden_account::{AbstractedAccount, WalletCall, WalletConfig};
use warden_core::{AppId, AssetId, Clock, LedgerEffects, Txn, WardenError};
use warden_registry::{DelegationType, PluginRegistration};
use warden_testkit::{
    init_test_tracing, AdminPlugin, Network, PaymentPlugin, SignedTxn, WalletFixture, ADMIN,
    CALLER, CONTROLLED, FACTORY_APP, STRANGER, WALLET_APP,
};

const ADMIN_PLUGIN: AppId = AppId::new(2_100);

fn network() -> Network {
    init_test_tracing();
    let mut net = WalletFixture::new().build();
    net.deploy(ADMIN_PLUGIN, AdminPlugin);
    net
}

fn register_admin_plugin(net: &mut Network, registration: PluginRegistration) {
    net.call(
        ADMIN,
        &WalletCall::AddPlugin {
            plugin: ADMIN_PLUGIN,
            caller: CALLER,
            registration,
        },
    )
    .unwrap();
}

/// Delegate to the admin plugin and have it install `new_admin`.
fn claim_admin_batch(net: &Network, new_admin: warden_core::Address) -> Vec<SignedTxn> {
    vec![
        net.wallet_call(
            CALLER,
            &WalletCall::RekeyToPlugin {
                plugin: ADMIN_PLUGIN,
                global: false,
                offsets: vec![],
                funds: vec![],
            },
        ),
        SignedTxn::by_sender(AdminPlugin::claim_admin(
            CALLER,
            ADMIN_PLUGIN,
            WALLET_APP,
            CALLER,
            new_admin,
        )),
        net.wallet_call(CALLER, &WalletCall::VerifyAuthAddr),
    ]
}

#[test]
fn admin_hands_over_control() {
    let mut net = network();
    net.advance(5);
    net.call(ADMIN, &WalletCall::ChangeAdmin { new_admin: STRANGER })
        .unwrap();
    assert_eq!(net.wallet.admin(), STRANGER);
    assert_eq!(net.wallet.state().last_change, net.clock().timestamp);
    assert_eq!(
        net.wallet.state().last_user_interaction,
        net.clock().timestamp
    );

    assert_matches!(
        net.call(ADMIN, &WalletCall::ChangeAdmin { new_admin: ADMIN }),
        Err(WardenError::Unauthorized { .. })
    );
    net.call(STRANGER, &WalletCall::ChangeAdmin { new_admin: ADMIN })
        .unwrap();
}

#[test]
fn admin_cannot_be_the_controlled_address() {
    let mut net = network();
    assert_matches!(
        net.call(ADMIN, &WalletCall::ChangeAdmin { new_admin: CONTROLLED }),
        Err(WardenError::Invalid { .. })
    );
    assert_eq!(net.wallet.admin(), ADMIN);

    let clock = Clock::new(1, 1);
    assert_matches!(
        AbstractedAccount::create(
            WALLET_APP,
            CONTROLLED,
            CONTROLLED,
            FACTORY_APP.address(),
            WalletConfig::default(),
            clock,
        ),
        Err(WardenError::Invalid { .. })
    );
    assert_matches!(
        AbstractedAccount::create(
            WALLET_APP,
            warden_core::Address::ZERO,
            WALLET_APP.address(),
            FACTORY_APP.address(),
            WalletConfig::default(),
            clock,
        ),
        Err(WardenError::Invalid { .. })
    );
}

#[test]
fn privileged_plugin_changes_admin_while_delegated() {
    let mut net = network();
    register_admin_plugin(
        &mut net,
        PluginRegistration::new(DelegationType::Agent).with_admin(),
    );
    let interacted = net.wallet.state().last_user_interaction;
    net.advance(3);

    net.execute(claim_admin_batch(&net, STRANGER)).unwrap();

    assert_eq!(net.wallet.admin(), STRANGER);
    assert_eq!(net.wallet.state().last_change, net.clock().timestamp);
    assert_eq!(net.wallet.state().last_user_interaction, interacted);
    assert_eq!(net.host.auth_addr(&CONTROLLED), WALLET_APP.address());
}

#[test]
fn self_delegated_admin_change_counts_as_interaction() {
    let mut net = network();
    register_admin_plugin(
        &mut net,
        PluginRegistration::new(DelegationType::SelfDelegated).with_admin(),
    );
    net.advance(3);
    net.execute(claim_admin_batch(&net, STRANGER)).unwrap();
    assert_eq!(
        net.wallet.state().last_user_interaction,
        net.clock().timestamp
    );
}

#[test]
fn unprivileged_plugin_cannot_change_admin() {
    let mut net = network();
    register_admin_plugin(&mut net, PluginRegistration::new(DelegationType::Agent));
    assert_matches!(
        net.execute(claim_admin_batch(&net, STRANGER)),
        Err(WardenError::Unauthorized { .. })
    );
    assert_eq!(net.wallet.admin(), ADMIN);
}

#[test]
fn plugin_admin_change_requires_plugin_sender_and_authority() {
    let mut net = network();
    register_admin_plugin(
        &mut net,
        PluginRegistration::new(DelegationType::Agent).with_admin(),
    );
    let call = WalletCall::PluginChangeAdmin {
        plugin: ADMIN_PLUGIN,
        caller: CALLER,
        new_admin: STRANGER,
    };

    // Sent by someone other than the plugin.
    assert_matches!(net.call(CALLER, &call), Err(WardenError::Unauthorized { .. }));

    // Sent by the plugin, but it holds no authority over the account.
    assert_matches!(
        net.execute(vec![SignedTxn::by_sender(AdminPlugin::claim_admin(
            CALLER,
            ADMIN_PLUGIN,
            WALLET_APP,
            CALLER,
            STRANGER,
        ))]),
        Err(WardenError::Unauthorized { .. })
    );
    assert_eq!(net.wallet.admin(), ADMIN);
}

#[test]
fn flash_rekey_must_return_within_batch() {
    let mut net = network();
    let before = net.balance(&STRANGER);
    let flash = WalletCall::RekeyTo {
        target: STRANGER,
        flash: true,
    };

    net.execute(vec![
        net.wallet_call(ADMIN, &flash),
        SignedTxn::new(Txn::payment(CONTROLLED, STRANGER, 1_000), STRANGER),
        SignedTxn::new(Txn::rekey(CONTROLLED, WALLET_APP.address()), STRANGER),
    ])
    .unwrap();
    assert_eq!(net.balance(&STRANGER), before + 1_000);
    assert_eq!(net.host.auth_addr(&CONTROLLED), WALLET_APP.address());

    assert_matches!(
        net.call(ADMIN, &flash),
        Err(WardenError::MalformedBatch { position: 1, .. })
    );
    assert_eq!(net.host.auth_addr(&CONTROLLED), WALLET_APP.address());
}

#[test]
fn flash_rekey_returns_through_asset_transfer() {
    let mut net = network();
    let token = AssetId::new(31_566_704);
    net.execute(vec![
        net.wallet_call(
            ADMIN,
            &WalletCall::RekeyTo {
                target: STRANGER,
                flash: true,
            },
        ),
        SignedTxn::new(
            Txn::asset_transfer(CONTROLLED, token, ADMIN, 0).with_rekey(WALLET_APP.address()),
            STRANGER,
        ),
    ])
    .unwrap();
    assert_eq!(net.host.auth_addr(&CONTROLLED), WALLET_APP.address());
}

#[test]
fn flash_rekey_rejects_nested_delegation() {
    let mut net = network();
    net.deploy(AppId::new(2_000), PaymentPlugin);
    net.call(
        ADMIN,
        &WalletCall::AddPlugin {
            plugin: AppId::new(2_000),
            caller: ADMIN,
            registration: PluginRegistration::new(DelegationType::Agent),
        },
    )
    .unwrap();

    let result = net.execute(vec![
        net.wallet_call(
            ADMIN,
            &WalletCall::RekeyTo {
                target: STRANGER,
                flash: true,
            },
        ),
        net.wallet_call(
            ADMIN,
            &WalletCall::RekeyToPlugin {
                plugin: AppId::new(2_000),
                global: false,
                offsets: vec![],
                funds: vec![],
            },
        ),
        SignedTxn::new(Txn::rekey(CONTROLLED, WALLET_APP.address()), STRANGER),
    ]);
    assert_matches!(result, Err(WardenError::MalformedBatch { .. }));
    assert_eq!(net.host.auth_addr(&CONTROLLED), WALLET_APP.address());
}

#[test]
fn plain_rekey_hands_over_permanently() {
    let mut net = network();
    let changed = net.wallet.state().last_change;
    net.advance(7);
    net.call(
        ADMIN,
        &WalletCall::RekeyTo {
            target: STRANGER,
            flash: false,
        },
    )
    .unwrap();
    assert_eq!(net.host.auth_addr(&CONTROLLED), STRANGER);
    assert_eq!(
        net.wallet.state().last_user_interaction,
        net.clock().timestamp
    );
    assert_eq!(net.wallet.state().last_change, changed);

    assert_matches!(
        net.call(
            STRANGER,
            &WalletCall::RekeyTo {
                target: CALLER,
                flash: false,
            },
        ),
        Err(WardenError::Unauthorized { .. })
    );
}

#[test]
fn self_controlled_wallet_rekeys_its_own_account() {
    init_test_tracing();
    let mut net = WalletFixture::new().self_controlled().build();
    net.execute(vec![
        net.wallet_call(
            ADMIN,
            &WalletCall::RekeyTo {
                target: STRANGER,
                flash: true,
            },
        ),
        SignedTxn::new(Txn::payment(WALLET_APP.address(), STRANGER, 10), STRANGER),
        SignedTxn::new(
            Txn::rekey(WALLET_APP.address(), WALLET_APP.address()),
            STRANGER,
        ),
    ])
    .unwrap();
    assert_eq!(
        net.host.auth_addr(&WALLET_APP.address()),
        warden_core::Address::ZERO
    );
}
