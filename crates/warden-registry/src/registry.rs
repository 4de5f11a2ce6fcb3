//! Plugin registry and validity state machine
//!
//! ```text
//! Missing ── record absent
//! Found ─┬─ Expired     epoch > last_valid
//!        ├─ OnCooldown  epoch - last_called < cooldown
//!        └─ Active      (only state that authorizes use)
//! ```
//!
//! Method restrictions add a second, independent clock per method that gates
//! each individual call.

use crate::names::PluginName;
use crate::record::{PluginKey, PluginRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_core::{BoxMap, Clock, CooldownScope, Selector, WardenError, WardenResult};

/// Validity of a registry key at one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PluginStatus {
    /// No record for the key
    Missing,
    /// Past its last valid epoch
    Expired,
    /// Whole-plugin cooldown still running
    OnCooldown,
    /// Usable
    Active,
}

impl PluginStatus {
    /// Whether this status authorizes use
    pub fn is_active(self) -> bool {
        matches!(self, PluginStatus::Active)
    }
}

/// Outcome of checking one call against a method restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodCheck {
    /// Selector matches and the method clock permits the call
    Allowed,
    /// Offset does not name a restriction
    OffsetOutOfRange,
    /// Selector differs from the restriction at the offset
    SelectorMismatch,
    /// Method clock still running
    OnCooldown,
}

/// Check `selector` against restriction `offset` of `record` at `epoch`.
///
/// On success the method clock is stamped when the method has a cooldown.
pub fn method_check(
    record: &mut PluginRecord,
    selector: Selector,
    offset: u64,
    epoch: u64,
) -> MethodCheck {
    let Some(method) = usize::try_from(offset)
        .ok()
        .and_then(|i| record.methods.get_mut(i))
    else {
        return MethodCheck::OffsetOutOfRange;
    };
    if method.selector != selector {
        return MethodCheck::SelectorMismatch;
    }
    if method.on_cooldown(epoch) {
        return MethodCheck::OnCooldown;
    }
    if method.cooldown > 0 {
        method.last_called = epoch;
    }
    MethodCheck::Allowed
}

/// Every delegation record held by one wallet, plus the alias layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRegistry {
    plugins: BoxMap<PluginKey, PluginRecord>,
    names: BoxMap<PluginName, NamedPlugin>,
}

/// Alias box contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedPlugin {
    /// Registry key the alias points at
    pub key: PluginKey,
    /// Storage rent held for the alias box
    pub deposit: u64,
}

impl PluginRegistry {
    /// Create an empty registry
    pub fn new(max_plugins: usize, max_names: usize) -> Self {
        Self {
            plugins: BoxMap::new("plugin", max_plugins),
            names: BoxMap::new("named plugin", max_names),
        }
    }

    /// Record for `key`
    pub fn get(&self, key: &PluginKey) -> Option<&PluginRecord> {
        self.plugins.get(key)
    }

    /// Record for `key`, or [`WardenError::NotFound`]
    pub fn require(&self, key: &PluginKey) -> WardenResult<&PluginRecord> {
        self.plugins
            .get(key)
            .ok_or_else(|| WardenError::not_found(format!("plugin {key}")))
    }

    /// Mutable record for `key`, or [`WardenError::NotFound`]
    pub fn require_mut(&mut self, key: &PluginKey) -> WardenResult<&mut PluginRecord> {
        self.plugins
            .get_mut(key)
            .ok_or_else(|| WardenError::not_found(format!("plugin {key}")))
    }

    /// Number of plugin records
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    /// Whether no plugins are registered
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Box footprint of `record` under `key`
    pub fn footprint(key: &PluginKey, record: &PluginRecord) -> WardenResult<u64> {
        BoxMap::footprint(key, record)
    }

    /// Install or replace the record for `key`, returning the previous one.
    pub fn insert(
        &mut self,
        key: PluginKey,
        record: PluginRecord,
    ) -> WardenResult<Option<PluginRecord>> {
        let previous = self.plugins.upsert(key, record)?;
        debug!(plugin = %key, replaced = previous.is_some(), "Plugin record installed");
        Ok(previous)
    }

    /// Delete the record for `key`
    pub fn remove(&mut self, key: &PluginKey) -> WardenResult<PluginRecord> {
        let record = self.plugins.remove(key)?;
        debug!(plugin = %key, "Plugin record removed");
        Ok(record)
    }

    /// Evaluate the validity state machine for `key` at `clock`
    pub fn plugin_check(&self, key: &PluginKey, clock: Clock) -> PluginStatus {
        let Some(record) = self.plugins.get(key) else {
            return PluginStatus::Missing;
        };
        let epoch = clock.epoch(record.epoch_unit);
        if record.expired(epoch) {
            PluginStatus::Expired
        } else if record.on_cooldown(epoch) {
            PluginStatus::OnCooldown
        } else {
            PluginStatus::Active
        }
    }

    /// The record for `key` if it is `Active`, otherwise the matching error.
    ///
    /// `position` is reported on cooldown rejections.
    pub fn require_active(
        &self,
        key: &PluginKey,
        clock: Clock,
        position: usize,
    ) -> WardenResult<&PluginRecord> {
        match self.plugin_check(key, clock) {
            PluginStatus::Missing => Err(WardenError::not_found(format!("plugin {key}"))),
            PluginStatus::Expired => Err(WardenError::expired(format!("plugin {key}"))),
            PluginStatus::OnCooldown => {
                Err(WardenError::cooldown(CooldownScope::Plugin, position))
            }
            PluginStatus::Active => self.require(key),
        }
    }

    /// Read-only predicate: may `key` be used right now to call `selector`?
    pub fn can_call(&self, key: &PluginKey, selector: Selector, clock: Clock) -> bool {
        if !self.plugin_check(key, clock).is_active() {
            return false;
        }
        let Some(record) = self.plugins.get(key) else {
            return false;
        };
        if !record.has_method_restrictions() {
            return true;
        }
        let epoch = clock.epoch(record.epoch_unit);
        record
            .methods
            .iter()
            .any(|m| m.selector == selector && !m.on_cooldown(epoch))
    }

    /// Alias for `name`
    pub fn named(&self, name: &PluginName) -> Option<&NamedPlugin> {
        self.names.get(name)
    }

    /// Key an alias resolves to, or [`WardenError::NotFound`]
    pub fn resolve(&self, name: &PluginName) -> WardenResult<PluginKey> {
        self.names
            .get(name)
            .map(|named| named.key)
            .ok_or_else(|| WardenError::not_found(format!("named plugin {name}")))
    }

    /// Whether an alias exists
    pub fn has_name(&self, name: &PluginName) -> bool {
        self.names.contains(name)
    }

    /// Create an alias; an existing name is a [`WardenError::Duplicate`].
    ///
    /// Returns the alias box footprint.
    pub fn add_name(&mut self, name: PluginName, key: PluginKey) -> WardenResult<u64> {
        let named = NamedPlugin { key, deposit: 0 };
        let footprint = BoxMap::footprint(&name, &named)?;
        self.names.insert_new(name.clone(), named)?;
        debug!(name = %name, plugin = %key, "Plugin alias created");
        Ok(footprint)
    }

    /// Record the rent held for an alias
    pub fn set_name_deposit(&mut self, name: &PluginName, deposit: u64) -> WardenResult<()> {
        let named = self
            .names
            .get_mut(name)
            .ok_or_else(|| WardenError::not_found(format!("named plugin {name}")))?;
        named.deposit = deposit;
        Ok(())
    }

    /// Delete an alias
    pub fn remove_name(&mut self, name: &PluginName) -> WardenResult<NamedPlugin> {
        let named = self.names.remove(name)?;
        debug!(name = %name, plugin = %named.key, "Plugin alias removed");
        Ok(named)
    }

    /// Delete every alias pointing at `key`
    pub fn remove_names_for(&mut self, key: &PluginKey) -> Vec<(PluginName, NamedPlugin)> {
        let targets: Vec<PluginName> = self
            .names
            .iter()
            .filter(|(_, named)| named.key == *key)
            .map(|(name, _)| name.clone())
            .collect();
        self.names.drain_where(|name| targets.contains(name))
    }

    /// Iterate plugin records in key order
    pub fn iter(&self) -> impl Iterator<Item = (&PluginKey, &PluginRecord)> {
        self.plugins.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DelegationType, PluginRegistration};
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use warden_core::{Address, AppId, EpochUnit};

    fn key() -> PluginKey {
        PluginKey::new(AppId::new(42), Address::from_bytes([3u8; 32]))
    }

    fn install(registry: &mut PluginRegistry, registration: &PluginRegistration, at: u64) {
        let record = PluginRecord::from_registration(registration, at);
        registry.insert(key(), record).unwrap();
    }

    #[test]
    fn status_walks_state_machine() {
        let mut registry = PluginRegistry::new(4, 4);
        assert_eq!(
            registry.plugin_check(&key(), Clock::new(1_000, 0)),
            PluginStatus::Missing
        );

        let registration = PluginRegistration::new(DelegationType::Agent)
            .valid_until(2_000)
            .with_cooldown(100);
        install(&mut registry, &registration, 1_000);
        assert_eq!(
            registry.plugin_check(&key(), Clock::new(1_000, 0)),
            PluginStatus::Active
        );

        registry.require_mut(&key()).unwrap().last_called = 1_000;
        assert_eq!(
            registry.plugin_check(&key(), Clock::new(1_099, 0)),
            PluginStatus::OnCooldown
        );
        assert_eq!(
            registry.plugin_check(&key(), Clock::new(1_100, 0)),
            PluginStatus::Active
        );
        assert_eq!(
            registry.plugin_check(&key(), Clock::new(2_001, 0)),
            PluginStatus::Expired
        );
    }

    #[test]
    fn require_active_maps_status_to_errors() {
        let mut registry = PluginRegistry::new(4, 4);
        assert_matches!(
            registry.require_active(&key(), Clock::new(5, 0), 0),
            Err(WardenError::NotFound { .. })
        );
        let registration = PluginRegistration::new(DelegationType::Agent).valid_until(10);
        install(&mut registry, &registration, 5);
        assert_matches!(
            registry.require_active(&key(), Clock::new(11, 0), 0),
            Err(WardenError::Expired { .. })
        );
    }

    #[test]
    fn method_check_stamps_only_cooldown_methods() {
        let pay = Selector::from_signature("pay(uint64)void");
        let swap = Selector::from_signature("swap(uint64)void");
        let registration = PluginRegistration::new(DelegationType::Agent)
            .with_method(pay, 0)
            .with_method(swap, 10);
        let mut record = PluginRecord::from_registration(&registration, 0);

        assert_eq!(method_check(&mut record, pay, 0, 50), MethodCheck::Allowed);
        assert_eq!(record.methods[0].last_called, 0);

        assert_eq!(method_check(&mut record, swap, 1, 50), MethodCheck::Allowed);
        assert_eq!(record.methods[1].last_called, 50);
        assert_eq!(method_check(&mut record, swap, 1, 55), MethodCheck::OnCooldown);
        assert_eq!(method_check(&mut record, swap, 1, 60), MethodCheck::Allowed);

        assert_eq!(
            method_check(&mut record, pay, 1, 70),
            MethodCheck::SelectorMismatch
        );
        assert_eq!(
            method_check(&mut record, pay, 2, 70),
            MethodCheck::OffsetOutOfRange
        );
    }

    #[test]
    fn can_call_respects_allow_list() {
        let pay = Selector::from_signature("pay(uint64)void");
        let other = Selector::from_signature("drain()void");
        let mut registry = PluginRegistry::new(4, 4);
        let registration = PluginRegistration::new(DelegationType::Agent).with_method(pay, 0);
        install(&mut registry, &registration, 0);

        let clock = Clock::new(100, 0);
        assert!(registry.can_call(&key(), pay, clock));
        assert!(!registry.can_call(&key(), other, clock));
        assert!(!registry.can_call(&PluginKey::global(AppId::new(42)), pay, clock));
    }

    #[test]
    fn can_call_unrestricted_plugin_allows_any_method() {
        let mut registry = PluginRegistry::new(4, 4);
        let registration = PluginRegistration::new(DelegationType::Agent);
        install(&mut registry, &registration, 0);
        let anything = Selector::from_signature("anything()void");
        assert!(registry.can_call(&key(), anything, Clock::new(1, 1)));
    }

    #[test]
    fn removing_plugin_names_leaves_other_aliases() {
        let mut registry = PluginRegistry::new(4, 4);
        install(
            &mut registry,
            &PluginRegistration::new(DelegationType::Agent),
            0,
        );
        let other = PluginKey::global(AppId::new(9));
        registry
            .add_name(PluginName::new("swapper").unwrap(), key())
            .unwrap();
        registry
            .add_name(PluginName::new("sweeper").unwrap(), other)
            .unwrap();
        assert_matches!(
            registry.add_name(PluginName::new("swapper").unwrap(), other),
            Err(WardenError::Duplicate { .. })
        );

        let removed = registry.remove_names_for(&key());
        assert_eq!(removed.len(), 1);
        assert_eq!(
            registry.resolve(&PluginName::new("sweeper").unwrap()).unwrap(),
            other
        );
    }

    proptest! {
        #[test]
        fn active_iff_found_unexpired_and_cooled(
            last_valid in 0u64..10_000,
            cooldown in 0u64..1_000,
            last_called in 0u64..10_000,
            epoch in 0u64..20_000,
        ) {
            let mut registry = PluginRegistry::new(4, 4);
            let registration = PluginRegistration::new(DelegationType::Agent)
                .valid_until(last_valid)
                .with_cooldown(cooldown)
                .measured_in(EpochUnit::Timestamp);
            install(&mut registry, &registration, 0);
            registry.require_mut(&key()).unwrap().last_called = last_called;

            let status = registry.plugin_check(&key(), Clock::new(0, epoch));
            let expected = epoch <= last_valid && epoch.saturating_sub(last_called) >= cooldown;
            prop_assert_eq!(status.is_active(), expected);
        }
    }
}
