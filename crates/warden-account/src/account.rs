//! The abstracted account
//!
//! Admin-gated configuration, plugin delegation, allowance settlement, and
//! the verification call that ends a delegation. Every method is one step of
//! a host batch; an error aborts the whole batch, so methods may leave
//! partial effects behind on failure and rely on the host discarding them.

use crate::config::WalletConfig;
use crate::state::AccountState;
use tracing::{debug, info, warn};
use warden_allowance::{AllowanceKey, AllowanceLedger, AllowanceRecord, AllowanceSpec, FundsRequest};
use warden_core::abi::verify_auth_addr_selector;
use warden_core::{
    Address, AppId, AssetId, CallContext, Clock, HostEffects, LedgerEffects, Selector, Transfer,
    WardenError, WardenResult,
};
use warden_guards::{
    expected_auth, validate_group, BatchScope, DelegationSession, RekeyBack, SessionHolder,
};
use warden_registry::{
    DelegationType, NamedPlugin, PluginKey, PluginName, PluginRecord, PluginRegistration,
    PluginRegistry,
};

/// A wallet whose authority can be lent to registered plugins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbstractedAccount {
    state: AccountState,
    config: WalletConfig,
    registry: PluginRegistry,
    allowances: AllowanceLedger,
}

impl AbstractedAccount {
    /// Create a wallet.
    ///
    /// A zero `controlled_address` means the wallet controls its own
    /// application account.
    pub fn create(
        app_id: AppId,
        controlled_address: Address,
        admin: Address,
        custody_factory: Address,
        config: WalletConfig,
        clock: Clock,
    ) -> WardenResult<Self> {
        config.validate()?;
        let controlled_address = if controlled_address.is_zero() {
            app_id.address()
        } else {
            controlled_address
        };
        if admin == controlled_address {
            return Err(WardenError::invalid(
                "admin and controlled address must differ",
            ));
        }

        let state = AccountState {
            app_id,
            admin,
            controlled_address,
            last_user_interaction: clock.timestamp,
            last_change: clock.timestamp,
            custody_factory,
        };
        info!(wallet = %app_id, admin = %admin, controlled = %controlled_address, "Wallet created");
        Ok(Self {
            registry: PluginRegistry::new(
                config.storage.max_plugins,
                config.storage.max_named_plugins,
            ),
            allowances: AllowanceLedger::new(config.storage.max_allowances),
            state,
            config,
        })
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Persisted wallet state
    pub fn state(&self) -> &AccountState {
        &self.state
    }

    /// Wallet configuration
    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Current admin
    pub fn admin(&self) -> Address {
        self.state.admin
    }

    /// The wallet application
    pub fn app_id(&self) -> AppId {
        self.state.app_id
    }

    /// Plugin record for `key`
    pub fn plugin(&self, key: &PluginKey) -> Option<&PluginRecord> {
        self.registry.get(key)
    }

    /// Plugin records for `keys`, in order
    pub fn plugins(&self, keys: &[PluginKey]) -> Vec<Option<&PluginRecord>> {
        keys.iter().map(|key| self.registry.get(key)).collect()
    }

    /// Alias entry for `name`
    pub fn named_plugin(&self, name: &PluginName) -> Option<&NamedPlugin> {
        self.registry.named(name)
    }

    /// Allowance for `key`
    pub fn allowance(&self, key: &AllowanceKey) -> Option<&AllowanceRecord> {
        self.allowances.get(key)
    }

    /// Allowances of `(plugin, caller)` for `assets`, in order
    pub fn allowances(
        &self,
        plugin: AppId,
        caller: Address,
        assets: &[AssetId],
    ) -> Vec<Option<&AllowanceRecord>> {
        assets
            .iter()
            .map(|asset| self.allowances.get(&AllowanceKey::new(plugin, caller, *asset)))
            .collect()
    }

    /// Whether `caller` may use `plugin` for `selector` right now
    pub fn can_call(
        &self,
        plugin: AppId,
        global: bool,
        caller: Address,
        selector: Selector,
        clock: Clock,
    ) -> bool {
        let key = PluginKey::resolve(plugin, global, caller);
        self.registry.can_call(&key, selector, clock)
    }

    // ---------------------------------------------------------------------
    // Admin control
    // ---------------------------------------------------------------------

    fn require_admin(&self, ctx: &CallContext<'_>) -> WardenResult<()> {
        if ctx.sender != self.state.admin {
            warn!(sender = %ctx.sender, position = ctx.position, "Admin call from non-admin");
            return Err(WardenError::unauthorized(format!(
                "{} is not the wallet admin",
                ctx.sender
            )));
        }
        Ok(())
    }

    fn record_change(&mut self, clock: Clock) {
        self.state.last_change = clock.timestamp;
        self.state.last_user_interaction = clock.timestamp;
    }

    /// Replace the admin
    pub fn change_admin(&mut self, ctx: &CallContext<'_>, new_admin: Address) -> WardenResult<()> {
        self.require_admin(ctx)?;
        self.set_admin(new_admin)?;
        self.record_change(ctx.clock);
        Ok(())
    }

    /// Replace the admin on behalf of a privileged plugin that currently
    /// holds authority over the controlled address.
    pub fn plugin_change_admin<H: LedgerEffects>(
        &mut self,
        host: &H,
        ctx: &CallContext<'_>,
        plugin: AppId,
        caller: Address,
        new_admin: Address,
    ) -> WardenResult<()> {
        let plugin_address = plugin.address();
        if ctx.sender != plugin_address {
            return Err(WardenError::unauthorized(format!(
                "{} is not plugin {plugin}",
                ctx.sender
            )));
        }
        if host.auth_addr(&self.state.controlled_address) != plugin_address {
            return Err(WardenError::unauthorized(format!(
                "plugin {plugin} does not control the account"
            )));
        }
        let key = PluginKey::new(plugin, caller);
        let record = self.registry.require(&key)?;
        if !record.admin {
            return Err(WardenError::unauthorized(format!(
                "plugin {key} lacks admin privilege"
            )));
        }
        let self_delegated = record.delegation_type == DelegationType::SelfDelegated;

        self.set_admin(new_admin)?;
        self.state.last_change = ctx.clock.timestamp;
        if self_delegated {
            self.state.last_user_interaction = ctx.clock.timestamp;
        }
        Ok(())
    }

    fn set_admin(&mut self, new_admin: Address) -> WardenResult<()> {
        if new_admin == self.state.controlled_address {
            return Err(WardenError::invalid(
                "admin and controlled address must differ",
            ));
        }
        info!(from = %self.state.admin, to = %new_admin, "Admin changed");
        self.state.admin = new_admin;
        Ok(())
    }

    /// Admin rekey of the controlled address to `target`.
    ///
    /// With `flash` the batch must restore authority later on; the handover
    /// is tracked as a delegation session until it does.
    pub fn rekey_to<H: LedgerEffects>(
        &mut self,
        host: &mut H,
        scope: &mut BatchScope,
        ctx: &CallContext<'_>,
        target: Address,
        flash: bool,
    ) -> WardenResult<()> {
        self.require_admin(ctx)?;
        let controlled = self.state.controlled_address;

        if flash {
            let rekey_back = self.rekey_back(controlled);
            if !ctx.batch.after(ctx.position).any(|(_, txn)| rekey_back.matches(txn)) {
                return Err(WardenError::malformed_batch(
                    ctx.batch.len(),
                    "flash rekey never returns authority to the wallet",
                ));
            }
            scope.open(DelegationSession {
                holder: SessionHolder::Flash(target),
                spending: controlled,
                opened_at: ctx.position,
            })?;
        }

        host.submit(&self.state.app_address(), &Transfer::rekey(controlled, target))?;
        self.state.last_user_interaction = ctx.clock.timestamp;
        info!(controlled = %controlled, target = %target, flash, "Controlled address rekeyed");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Plugin administration
    // ---------------------------------------------------------------------

    /// Register or replace the plugin record for `(plugin, caller)`.
    ///
    /// A zero `caller` registers the plugin for any caller.
    pub fn add_plugin<H: HostEffects>(
        &mut self,
        host: &mut H,
        ctx: &CallContext<'_>,
        plugin: AppId,
        caller: Address,
        registration: &PluginRegistration,
    ) -> WardenResult<PluginKey> {
        self.require_admin(ctx)?;
        self.install_plugin(host, ctx.clock, plugin, caller, registration)
    }

    fn install_plugin<H: HostEffects>(
        &mut self,
        host: &mut H,
        clock: Clock,
        plugin: AppId,
        caller: Address,
        registration: &PluginRegistration,
    ) -> WardenResult<PluginKey> {
        let key = PluginKey::new(plugin, caller);
        registration.validate(&key)?;

        let mut record =
            PluginRecord::from_registration(registration, clock.epoch(registration.epoch_unit));

        if let Some(previous) = self.registry.get(&key).cloned() {
            self.refund_rent(host, previous.deposit)?;
            match previous.custody {
                Some(custody) if registration.uses_allowance => record.custody = Some(custody),
                Some(custody) => {
                    host.delete_custody(self.state.app_id, custody, &self.state.controlled_address)?;
                    self.drop_allowances(host, &key)?;
                }
                None => {}
            }
        }

        if registration.uses_allowance && record.custody.is_none() {
            record.custody = Some(self.provision_custody(host, plugin)?);
        }

        let footprint = PluginRegistry::footprint(&key, &record)?;
        record.deposit = self.charge_rent(host, footprint)?;
        self.registry.insert(key, record)?;
        self.record_change(clock);
        info!(plugin = %key, delegation = ?registration.delegation_type, "Plugin registered");
        Ok(key)
    }

    fn provision_custody<H: HostEffects>(&self, host: &mut H, plugin: AppId) -> WardenResult<AppId> {
        let funding = Transfer::native(
            self.state.controlled_address,
            self.state.custody_factory,
            self.config.custody_funding,
        );
        host.submit(&self.state.app_address(), &funding)?;
        let custody = host.create_custody(self.state.app_id, &funding, plugin)?;
        debug!(plugin = %plugin, custody = %custody, "Custody account provisioned");
        Ok(custody)
    }

    /// Delete the plugin record for `(plugin, caller)` with its custody
    /// account, allowances, and aliases.
    pub fn remove_plugin<H: HostEffects>(
        &mut self,
        host: &mut H,
        ctx: &CallContext<'_>,
        plugin: AppId,
        caller: Address,
    ) -> WardenResult<()> {
        self.require_admin(ctx)?;
        self.uninstall_plugin(host, ctx.clock, &PluginKey::new(plugin, caller))
    }

    fn uninstall_plugin<H: HostEffects>(
        &mut self,
        host: &mut H,
        clock: Clock,
        key: &PluginKey,
    ) -> WardenResult<()> {
        let record = self.registry.remove(key)?;
        if let Some(custody) = record.custody {
            host.delete_custody(self.state.app_id, custody, &self.state.controlled_address)?;
        }
        self.refund_rent(host, record.deposit)?;
        self.drop_allowances(host, key)?;
        for (_, named) in self.registry.remove_names_for(key) {
            self.refund_rent(host, named.deposit)?;
        }
        self.record_change(clock);
        info!(plugin = %key, "Plugin removed");
        Ok(())
    }

    fn drop_allowances<H: LedgerEffects>(&mut self, host: &mut H, key: &PluginKey) -> WardenResult<()> {
        for (allowance, record) in self.allowances.remove_all_for(key.plugin, key.caller) {
            debug!(allowance = %allowance, "Allowance dropped with plugin");
            self.refund_rent(host, record.deposit)?;
        }
        Ok(())
    }

    /// Register a plugin and an alias for it
    pub fn add_named_plugin<H: HostEffects>(
        &mut self,
        host: &mut H,
        ctx: &CallContext<'_>,
        name: PluginName,
        plugin: AppId,
        caller: Address,
        registration: &PluginRegistration,
    ) -> WardenResult<PluginKey> {
        self.require_admin(ctx)?;
        if self.registry.has_name(&name) {
            return Err(WardenError::duplicate(format!("named plugin {name} already exists")));
        }
        let key = self.install_plugin(host, ctx.clock, plugin, caller, registration)?;
        let footprint = self.registry.add_name(name.clone(), key)?;
        let deposit = self.charge_rent(host, footprint)?;
        self.registry.set_name_deposit(&name, deposit)?;
        Ok(key)
    }

    /// Remove an alias and the plugin it names
    pub fn remove_named_plugin<H: HostEffects>(
        &mut self,
        host: &mut H,
        ctx: &CallContext<'_>,
        name: &PluginName,
    ) -> WardenResult<()> {
        self.require_admin(ctx)?;
        let named = self.registry.remove_name(name)?;
        self.refund_rent(host, named.deposit)?;
        self.uninstall_plugin(host, ctx.clock, &named.key)
    }

    // ---------------------------------------------------------------------
    // Allowance administration
    // ---------------------------------------------------------------------

    /// Create allowances for `(plugin, caller)`
    pub fn add_allowances<H: LedgerEffects>(
        &mut self,
        host: &mut H,
        ctx: &CallContext<'_>,
        plugin: AppId,
        caller: Address,
        specs: &[AllowanceSpec],
    ) -> WardenResult<()> {
        self.require_admin(ctx)?;
        let key = PluginKey::new(plugin, caller);
        let record = self.registry.require(&key)?;
        if !record.uses_allowance {
            return Err(WardenError::invalid(format!(
                "plugin {key} was not registered with allowances"
            )));
        }
        let epoch_unit = record.epoch_unit;

        for spec in specs {
            let (allowance, footprint) =
                self.allowances
                    .create(plugin, caller, spec, epoch_unit, ctx.clock)?;
            let deposit = self.charge_rent(host, footprint)?;
            self.allowances.set_deposit(&allowance, deposit)?;
        }
        self.record_change(ctx.clock);
        Ok(())
    }

    /// Delete allowances of `(plugin, caller)` for `assets`
    pub fn remove_allowances<H: LedgerEffects>(
        &mut self,
        host: &mut H,
        ctx: &CallContext<'_>,
        plugin: AppId,
        caller: Address,
        assets: &[AssetId],
    ) -> WardenResult<()> {
        self.require_admin(ctx)?;
        for asset in assets {
            let record = self
                .allowances
                .remove(&AllowanceKey::new(plugin, caller, *asset))?;
            self.refund_rent(host, record.deposit)?;
        }
        self.record_change(ctx.clock);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Delegation
    // ---------------------------------------------------------------------

    fn rekey_back(&self, spending: Address) -> RekeyBack {
        RekeyBack::new(spending, self.state.app_id, verify_auth_addr_selector())
    }

    /// Hand authority to `plugin` for the rest of the batch.
    ///
    /// `global` selects the any-caller registration instead of the sender's.
    /// `offsets` names the method restriction for each plugin call in order.
    /// `funds` are moved into the plugin's custody account first.
    pub fn rekey_to_plugin<H: LedgerEffects>(
        &mut self,
        host: &mut H,
        scope: &mut BatchScope,
        ctx: &CallContext<'_>,
        plugin: AppId,
        global: bool,
        offsets: &[u64],
        funds: &[FundsRequest],
    ) -> WardenResult<()> {
        let key = PluginKey::resolve(plugin, global, ctx.sender);
        let custody = self.registry.get(&key).and_then(|record| record.custody);
        let spending = custody
            .map(AppId::address)
            .unwrap_or(self.state.controlled_address);

        let approval = validate_group(
            &self.registry,
            ctx,
            &key,
            offsets,
            &self.rekey_back(spending),
        )?;
        let self_delegated = self
            .registry
            .get(&key)
            .is_some_and(|record| record.delegation_type == DelegationType::SelfDelegated);

        scope.open(DelegationSession {
            holder: SessionHolder::Plugin(key),
            spending,
            opened_at: ctx.position,
        })?;

        if !funds.is_empty() {
            if custody.is_none() {
                return Err(WardenError::invalid(format!(
                    "plugin {key} has no custody account for funds"
                )));
            }
            self.transfer_funds(host, scope, &key, funds, ctx.clock)?;
        }

        host.submit(
            &self.state.app_address(),
            &Transfer::rekey(spending, plugin.address()),
        )?;
        approval.commit(&mut self.registry)?;
        if self_delegated {
            self.state.last_user_interaction = ctx.clock.timestamp;
        }
        info!(plugin = %key, spending = %spending, position = ctx.position, "Authority delegated");
        Ok(())
    }

    /// Resolve an alias and delegate as [`Self::rekey_to_plugin`]
    pub fn rekey_to_named_plugin<H: LedgerEffects>(
        &mut self,
        host: &mut H,
        scope: &mut BatchScope,
        ctx: &CallContext<'_>,
        name: &PluginName,
        global: bool,
        offsets: &[u64],
        funds: &[FundsRequest],
    ) -> WardenResult<()> {
        let key = self.registry.resolve(name)?;
        self.rekey_to_plugin(host, scope, ctx, key.plugin, global, offsets, funds)
    }

    /// Settle `funds` against the allowances of `key` and move them from the
    /// controlled address to the account currently holding delegated authority.
    pub fn transfer_funds<H: LedgerEffects>(
        &mut self,
        host: &mut H,
        scope: &BatchScope,
        key: &PluginKey,
        funds: &[FundsRequest],
        clock: Clock,
    ) -> WardenResult<()> {
        let spending = scope.spending_address();
        if spending.is_zero() {
            return Err(WardenError::invalid("no delegation in progress"));
        }
        for request in funds {
            let allowance = AllowanceKey::new(key.plugin, key.caller, request.asset);
            self.allowances.settle(&allowance, request.amount, clock)?;
            host.submit(
                &self.state.app_address(),
                &Transfer::of_asset(
                    self.state.controlled_address,
                    spending,
                    request.asset,
                    request.amount,
                ),
            )?;
        }
        Ok(())
    }

    /// Check that authority over the delegated account is back with the
    /// wallet and end the delegation.
    pub fn verify_auth_addr<H: LedgerEffects>(
        &self,
        host: &H,
        scope: &mut BatchScope,
        ctx: &CallContext<'_>,
    ) -> WardenResult<()> {
        let session = scope
            .session()
            .copied()
            .ok_or_else(|| WardenError::invalid("no delegation in progress"))?;
        self.ensure_restored(host, &session, ctx.position)?;
        scope.clear();
        Ok(())
    }

    fn ensure_restored<H: LedgerEffects>(
        &self,
        host: &H,
        session: &DelegationSession,
        position: usize,
    ) -> WardenResult<()> {
        let expected = expected_auth(self.state.app_id, &session.spending);
        let actual = host.auth_addr(&session.spending);
        if actual != expected {
            warn!(spending = %session.spending, actual = %actual, position, "Authority not restored");
            return Err(WardenError::malformed_batch(
                position,
                format!("authority over {} was not restored", session.spending),
            ));
        }
        Ok(())
    }

    /// End-of-batch check. A delegation restored by a rekey-back payment is
    /// closed here; one whose authority is still lent out fails the batch.
    pub fn close_batch<H: LedgerEffects>(&self, host: &H, mut scope: BatchScope) -> WardenResult<()> {
        if let Some(session) = scope.session().copied() {
            if self.ensure_restored(host, &session, session.opened_at).is_ok() {
                scope.clear();
            }
        }
        scope.finish()
    }

    // ---------------------------------------------------------------------
    // Storage rent
    // ---------------------------------------------------------------------

    fn charge_rent<H: LedgerEffects>(&self, host: &mut H, footprint: u64) -> WardenResult<u64> {
        if self.state.controls_itself() {
            return Ok(0);
        }
        let amount = self.config.rent.cost(footprint);
        if amount > 0 {
            host.submit(
                &self.state.app_address(),
                &Transfer::native(self.state.controlled_address, self.state.app_address(), amount),
            )?;
        }
        Ok(amount)
    }

    fn refund_rent<H: LedgerEffects>(&self, host: &mut H, deposit: u64) -> WardenResult<()> {
        if deposit > 0 {
            host.submit(
                &self.state.app_address(),
                &Transfer::native(self.state.app_address(), self.state.controlled_address, deposit),
            )?;
        }
        Ok(())
    }
}
