//! Allowance ledger keyed by `(plugin, caller, asset)`.

use crate::strategy::{AllowanceRecord, AllowanceSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};
use warden_core::{
    Address, AppId, AssetId, BoxMap, Clock, EpochUnit, StorageKey, WardenError, WardenResult,
};

/// Allowance box key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AllowanceKey {
    /// Plugin application the budget is granted to
    pub plugin: AppId,
    /// Caller the budget is granted to (zero for the global caller)
    pub caller: Address,
    /// Metered asset
    pub asset: AssetId,
}

impl AllowanceKey {
    /// Create an allowance key
    pub fn new(plugin: AppId, caller: Address, asset: AssetId) -> Self {
        Self {
            plugin,
            caller,
            asset,
        }
    }
}

impl StorageKey for AllowanceKey {
    const PREFIX: &'static [u8] = b"a";
}

impl fmt::Display for AllowanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.plugin, self.caller, self.asset)
    }
}

/// A plugin's request to move metered funds into its custody point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundsRequest {
    /// Asset requested
    pub asset: AssetId,
    /// Amount requested
    pub amount: u64,
}

impl FundsRequest {
    /// Create a funds request
    pub fn new(asset: AssetId, amount: u64) -> Self {
        Self { asset, amount }
    }
}

/// All metered budgets held by one wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceLedger {
    entries: BoxMap<AllowanceKey, AllowanceRecord>,
}

impl AllowanceLedger {
    /// Create an empty ledger holding at most `capacity` allowances
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: BoxMap::new("allowance", capacity),
        }
    }

    /// Allowance for `key`
    pub fn get(&self, key: &AllowanceKey) -> Option<&AllowanceRecord> {
        self.entries.get(key)
    }

    /// Number of allowances
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger holds no allowances
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create an allowance from `spec` at the current epoch of `epoch_unit`.
    ///
    /// Returns the stored record's box footprint so callers can charge rent.
    pub fn create(
        &mut self,
        plugin: AppId,
        caller: Address,
        spec: &AllowanceSpec,
        epoch_unit: EpochUnit,
        clock: Clock,
    ) -> WardenResult<(AllowanceKey, u64)> {
        let key = AllowanceKey::new(plugin, caller, spec.asset);
        let record = AllowanceRecord::new(spec, epoch_unit, clock.epoch(epoch_unit))?;
        let footprint = BoxMap::footprint(&key, &record)?;
        self.entries.insert_new(key, record)?;
        debug!(allowance = %key, strategy = ?spec.strategy, "Allowance created");
        Ok((key, footprint))
    }

    /// Record the rent held for `key`
    pub fn set_deposit(&mut self, key: &AllowanceKey, deposit: u64) -> WardenResult<()> {
        let record = self
            .entries
            .get_mut(key)
            .ok_or_else(|| WardenError::not_found(format!("allowance {key}")))?;
        record.deposit = deposit;
        Ok(())
    }

    /// Delete the allowance for `key`
    pub fn remove(&mut self, key: &AllowanceKey) -> WardenResult<AllowanceRecord> {
        let record = self.entries.remove(key)?;
        debug!(allowance = %key, "Allowance removed");
        Ok(record)
    }

    /// Delete every allowance bound to `(plugin, caller)`
    pub fn remove_all_for(
        &mut self,
        plugin: AppId,
        caller: Address,
    ) -> Vec<(AllowanceKey, AllowanceRecord)> {
        self.entries
            .drain_where(|k| k.plugin == plugin && k.caller == caller)
    }

    /// Check and apply one spend against the record for `key`.
    ///
    /// Returns what is left available at this epoch after the spend.
    pub fn settle(&mut self, key: &AllowanceKey, amount: u64, clock: Clock) -> WardenResult<u64> {
        let record = self
            .entries
            .get_mut(key)
            .ok_or_else(|| WardenError::not_found(format!("allowance {key}")))?;
        let epoch = clock.epoch(record.epoch_unit);
        record.settle(key.asset, amount, epoch).map_err(|e| {
            warn!(allowance = %key, amount, epoch, error = %e, "Allowance spend rejected");
            e
        })?;
        let remaining = record.available(epoch);
        debug!(allowance = %key, amount, epoch, remaining, "Allowance spend settled");
        Ok(remaining)
    }

    /// Iterate allowances in key order
    pub fn iter(&self) -> impl Iterator<Item = (&AllowanceKey, &AllowanceRecord)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn caller() -> Address {
        Address::from_bytes([9u8; 32])
    }

    #[test]
    fn create_rejects_duplicate_asset() {
        let mut ledger = AllowanceLedger::new(8);
        let spec = AllowanceSpec::flat(AssetId::NATIVE, 100);
        let clock = Clock::new(10, 1_000);
        ledger
            .create(AppId::new(5), caller(), &spec, EpochUnit::Round, clock)
            .unwrap();
        assert_matches!(
            ledger.create(AppId::new(5), caller(), &spec, EpochUnit::Round, clock),
            Err(WardenError::Duplicate { .. })
        );
    }

    #[test]
    fn settle_missing_allowance_is_not_found() {
        let mut ledger = AllowanceLedger::new(8);
        let key = AllowanceKey::new(AppId::new(5), caller(), AssetId::new(77));
        assert_matches!(
            ledger.settle(&key, 1, Clock::default()),
            Err(WardenError::NotFound { .. })
        );
    }

    #[test]
    fn settle_reads_record_clock() {
        let mut ledger = AllowanceLedger::new(8);
        let spec = AllowanceSpec::window(AssetId::NATIVE, 10, 100);
        let (key, _) = ledger
            .create(AppId::new(5), caller(), &spec, EpochUnit::Timestamp, Clock::new(1, 500))
            .unwrap();
        ledger.settle(&key, 10, Clock::new(2, 550)).unwrap();
        // Rounds advanced far, timestamp still inside the window.
        assert!(ledger.settle(&key, 1, Clock::new(10_000, 599)).is_err());
        assert_eq!(ledger.settle(&key, 10, Clock::new(10_001, 600)).unwrap(), 0);
    }

    #[test]
    fn remove_all_for_scopes_to_plugin_and_caller() {
        let mut ledger = AllowanceLedger::new(8);
        let clock = Clock::default();
        for asset in [0, 1, 2] {
            let spec = AllowanceSpec::flat(AssetId::new(asset), 1);
            ledger
                .create(AppId::new(5), caller(), &spec, EpochUnit::Round, clock)
                .unwrap();
        }
        let spec = AllowanceSpec::flat(AssetId::NATIVE, 1);
        ledger
            .create(AppId::new(6), caller(), &spec, EpochUnit::Round, clock)
            .unwrap();

        let removed = ledger.remove_all_for(AppId::new(5), caller());
        assert_eq!(removed.len(), 3);
        assert_eq!(ledger.len(), 1);
    }
}
