//! Plugin delegation records

use serde::{Deserialize, Serialize};
use std::fmt;
use warden_core::{Address, AppId, EpochUnit, Selector, StorageKey, WardenError, WardenResult};

/// Registry key: which plugin may be driven by which caller.
///
/// The zero caller is the global wildcard ("any caller").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PluginKey {
    /// Plugin application
    pub plugin: AppId,
    /// Allowed caller, or zero for any caller
    pub caller: Address,
}

impl PluginKey {
    /// Key for a concrete caller
    pub fn new(plugin: AppId, caller: Address) -> Self {
        Self { plugin, caller }
    }

    /// Key for the global wildcard caller
    pub fn global(plugin: AppId) -> Self {
        Self::new(plugin, Address::ZERO)
    }

    /// Resolve the key an entry call names: wildcard when `global`, else the sender
    pub fn resolve(plugin: AppId, global: bool, sender: Address) -> Self {
        if global {
            Self::global(plugin)
        } else {
            Self::new(plugin, sender)
        }
    }

    /// Whether this key uses the wildcard caller
    pub fn is_global(&self) -> bool {
        self.caller.is_zero()
    }
}

impl StorageKey for PluginKey {
    const PREFIX: &'static [u8] = b"p";
}

impl fmt::Display for PluginKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_global() {
            write!(f, "{}/global", self.plugin)
        } else {
            write!(f, "{}/{}", self.plugin, self.caller)
        }
    }
}

/// Who the delegation acts for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DelegationType {
    /// The user driving their own wallet through the plugin
    SelfDelegated,
    /// Automation acting on the user's behalf
    Agent,
    /// Anything else
    Other,
}

impl DelegationType {
    /// Wire code: 1, 2, 3
    pub fn code(self) -> u8 {
        match self {
            DelegationType::SelfDelegated => 1,
            DelegationType::Agent => 2,
            DelegationType::Other => 3,
        }
    }

    /// Parse a wire code
    pub fn from_code(code: u8) -> WardenResult<Self> {
        match code {
            1 => Ok(DelegationType::SelfDelegated),
            2 => Ok(DelegationType::Agent),
            3 => Ok(DelegationType::Other),
            other => Err(WardenError::invalid(format!(
                "unknown delegation type {other}"
            ))),
        }
    }
}

/// Per-method allow-list entry with its own cooldown clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodRestriction {
    /// Permitted method
    pub selector: Selector,
    /// Minimum epochs between uses of this method
    pub cooldown: u64,
    /// Epoch of the last authorized use
    pub last_called: u64,
}

impl MethodRestriction {
    /// A fresh restriction whose clock starts at zero
    pub fn new(selector: Selector, cooldown: u64) -> Self {
        Self {
            selector,
            cooldown,
            last_called: 0,
        }
    }

    /// Whether this method's cooldown is still running at `epoch`
    pub fn on_cooldown(&self, epoch: u64) -> bool {
        epoch.saturating_sub(self.last_called) < self.cooldown
    }
}

/// Admin-supplied parameters for a plugin registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRegistration {
    /// May change the wallet admin while delegated
    pub admin: bool,
    /// Who the delegation acts for
    pub delegation_type: DelegationType,
    /// Last epoch at which the plugin may be used
    pub last_valid: u64,
    /// Minimum epochs between uses of the whole plugin
    pub cooldown: u64,
    /// Method allow-list; empty means any method
    pub methods: Vec<(Selector, u64)>,
    /// Provision a custody sub-account and enable allowances
    pub uses_allowance: bool,
    /// Clock for expiry and cooldowns
    pub epoch_unit: EpochUnit,
}

impl PluginRegistration {
    /// Unrestricted registration: never expires, no cooldown, any method
    pub fn new(delegation_type: DelegationType) -> Self {
        Self {
            admin: false,
            delegation_type,
            last_valid: u64::MAX,
            cooldown: 0,
            methods: Vec::new(),
            uses_allowance: false,
            epoch_unit: EpochUnit::Round,
        }
    }

    /// Grant admin privilege
    pub fn with_admin(mut self) -> Self {
        self.admin = true;
        self
    }

    /// Set the last valid epoch
    pub fn valid_until(mut self, last_valid: u64) -> Self {
        self.last_valid = last_valid;
        self
    }

    /// Set the whole-plugin cooldown
    pub fn with_cooldown(mut self, cooldown: u64) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Append a permitted method with its own cooldown
    pub fn with_method(mut self, selector: Selector, cooldown: u64) -> Self {
        self.methods.push((selector, cooldown));
        self
    }

    /// Request a custody sub-account and allowances
    pub fn with_allowances(mut self) -> Self {
        self.uses_allowance = true;
        self
    }

    /// Measure in `unit`
    pub fn measured_in(mut self, unit: EpochUnit) -> Self {
        self.epoch_unit = unit;
        self
    }

    /// Reject registrations that can never be accountable
    pub fn validate(&self, key: &PluginKey) -> WardenResult<()> {
        if self.delegation_type == DelegationType::SelfDelegated && key.is_global() {
            return Err(WardenError::invalid(format!(
                "self delegation for {} requires a concrete caller",
                key.plugin
            )));
        }
        Ok(())
    }
}

/// Stored delegation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginRecord {
    /// May change the wallet admin while delegated
    pub admin: bool,
    /// Who the delegation acts for
    pub delegation_type: DelegationType,
    /// Custody sub-account holding pre-funded allowances
    pub custody: Option<AppId>,
    /// Last epoch at which the plugin may be used
    pub last_valid: u64,
    /// Minimum epochs between uses of the whole plugin
    pub cooldown: u64,
    /// Method allow-list with per-method clocks; empty means any method
    pub methods: Vec<MethodRestriction>,
    /// Whether allowances are enabled
    pub uses_allowance: bool,
    /// Clock for expiry and cooldowns
    pub epoch_unit: EpochUnit,
    /// Epoch of the last authorized use
    pub last_called: u64,
    /// Epoch the record was installed
    pub installed_at: u64,
    /// Storage rent held for this record
    pub deposit: u64,
}

impl PluginRecord {
    /// Build a record with every clock at zero, installed at `installed_at`
    pub fn from_registration(registration: &PluginRegistration, installed_at: u64) -> Self {
        Self {
            admin: registration.admin,
            delegation_type: registration.delegation_type,
            custody: None,
            last_valid: registration.last_valid,
            cooldown: registration.cooldown,
            methods: registration
                .methods
                .iter()
                .map(|(selector, cooldown)| MethodRestriction::new(*selector, *cooldown))
                .collect(),
            uses_allowance: registration.uses_allowance,
            epoch_unit: registration.epoch_unit,
            last_called: 0,
            installed_at,
            deposit: 0,
        }
    }

    /// Past `last_valid` at `epoch`
    pub fn expired(&self, epoch: u64) -> bool {
        epoch > self.last_valid
    }

    /// Whole-plugin cooldown still running at `epoch`
    pub fn on_cooldown(&self, epoch: u64) -> bool {
        epoch.saturating_sub(self.last_called) < self.cooldown
    }

    /// Whether calls are restricted to an allow-list
    pub fn has_method_restrictions(&self) -> bool {
        !self.methods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_delegation_requires_concrete_caller() {
        let registration = PluginRegistration::new(DelegationType::SelfDelegated);
        let global = PluginKey::global(AppId::new(4));
        assert!(registration.validate(&global).is_err());

        let concrete = PluginKey::new(AppId::new(4), Address::from_bytes([1; 32]));
        assert!(registration.validate(&concrete).is_ok());

        let agent = PluginRegistration::new(DelegationType::Agent);
        assert!(agent.validate(&global).is_ok());
    }

    #[test]
    fn fresh_record_clocks_start_at_zero() {
        let selector = Selector::from_signature("swap(uint64)void");
        let registration = PluginRegistration::new(DelegationType::Agent)
            .with_cooldown(10)
            .with_method(selector, 5);
        let record = PluginRecord::from_registration(&registration, 1_234);
        assert_eq!(record.last_called, 0);
        assert_eq!(record.installed_at, 1_234);
        assert_eq!(record.methods[0].last_called, 0);
        assert!(record.has_method_restrictions());
    }

    #[test]
    fn delegation_type_codes_round_trip() {
        for t in [
            DelegationType::SelfDelegated,
            DelegationType::Agent,
            DelegationType::Other,
        ] {
            assert_eq!(DelegationType::from_code(t.code()).unwrap(), t);
        }
        assert!(DelegationType::from_code(0).is_err());
    }
}
