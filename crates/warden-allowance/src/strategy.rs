//! Allowance accounting strategies
//!
//! Three interchangeable algorithms over one record shape. A spend is either
//! accepted in full or rejected; nothing is ever clamped to what remains.
//!
//! | Strategy | Available now | After spending `amount` |
//! |---|---|---|
//! | Flat | `allowed - spent` | `spent += amount` |
//! | Window | `allowed` in a fresh window, else `allowed - spent` | `spent = amount` (fresh) or `spent += amount` |
//! | Drip | `min(max, spent + floor(elapsed / interval) * allowed)` | `spent = available - amount` |
//!
//! For Drip, `spent` holds the *accrued balance* carried forward, not an
//! amount consumed.

use serde::{Deserialize, Serialize};
use warden_core::{AssetId, EpochUnit, WardenError, WardenResult};

/// Which accounting algorithm a record uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpendStrategy {
    /// One fixed budget that never replenishes
    Flat,
    /// Budget that resets at every `interval` boundary measured from `start`
    Window,
    /// Budget that accrues `allowed` per elapsed `interval`, capped at `max`
    Drip,
}

/// Admin-supplied parameters for a new allowance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceSpec {
    /// Asset the allowance meters
    pub asset: AssetId,
    /// Accounting algorithm
    pub strategy: SpendStrategy,
    /// Budget per window (Window), total (Flat), or accrual per interval (Drip)
    pub allowed: u64,
    /// Accrual cap (Drip only)
    pub max: u64,
    /// Window length or accrual period in epochs (Window, Drip)
    pub interval: u64,
    /// First window start (Window); defaults to the creation epoch
    pub start: Option<u64>,
}

impl AllowanceSpec {
    /// Flat budget of `allowed`
    pub fn flat(asset: AssetId, allowed: u64) -> Self {
        Self {
            asset,
            strategy: SpendStrategy::Flat,
            allowed,
            max: 0,
            interval: 0,
            start: None,
        }
    }

    /// `allowed` per `interval`-epoch window
    pub fn window(asset: AssetId, allowed: u64, interval: u64) -> Self {
        Self {
            asset,
            strategy: SpendStrategy::Window,
            allowed,
            max: 0,
            interval,
            start: None,
        }
    }

    /// `allowed` accrued per `interval`, capped at `max`
    pub fn drip(asset: AssetId, allowed: u64, interval: u64, max: u64) -> Self {
        Self {
            asset,
            strategy: SpendStrategy::Drip,
            allowed,
            max,
            interval,
            start: None,
        }
    }

    /// Anchor the first window at `start`
    pub fn starting_at(mut self, start: u64) -> Self {
        self.start = Some(start);
        self
    }

    /// Reject parameter combinations the strategy cannot evaluate
    pub fn validate(&self) -> WardenResult<()> {
        match self.strategy {
            SpendStrategy::Flat => Ok(()),
            SpendStrategy::Window | SpendStrategy::Drip if self.interval == 0 => {
                Err(WardenError::invalid(format!(
                    "{:?} allowance for {} needs a non-zero interval",
                    self.strategy, self.asset
                )))
            }
            SpendStrategy::Window | SpendStrategy::Drip => Ok(()),
        }
    }
}

/// Stored allowance state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceRecord {
    /// Accounting algorithm
    pub strategy: SpendStrategy,
    /// Budget parameter (see [`AllowanceSpec::allowed`])
    pub allowed: u64,
    /// Consumed amount, or carried balance for Drip
    pub spent: u64,
    /// Accrual cap (Drip)
    pub max: u64,
    /// Window length or accrual period
    pub interval: u64,
    /// Epoch of the last settled spend (creation epoch until then)
    pub last: u64,
    /// First window start (Window)
    pub start: u64,
    /// Clock the record is measured on, fixed at creation
    pub epoch_unit: EpochUnit,
    /// Storage rent held for this record
    pub deposit: u64,
}

impl AllowanceRecord {
    /// Build a fresh record created at epoch `now`
    pub fn new(spec: &AllowanceSpec, epoch_unit: EpochUnit, now: u64) -> WardenResult<Self> {
        spec.validate()?;
        Ok(Self {
            strategy: spec.strategy,
            allowed: spec.allowed,
            spent: 0,
            max: spec.max,
            interval: spec.interval,
            last: now,
            start: spec.start.unwrap_or(now),
            epoch_unit,
            deposit: 0,
        })
    }

    /// Start of the window containing `epoch`; `None` before the first window.
    pub fn window_start(&self, epoch: u64) -> Option<u64> {
        if epoch < self.start || self.interval == 0 {
            return None;
        }
        Some(epoch - (epoch - self.start) % self.interval)
    }

    /// Amount a spend at `epoch` may take.
    pub fn available(&self, epoch: u64) -> u64 {
        match self.strategy {
            SpendStrategy::Flat => self.allowed.saturating_sub(self.spent),
            SpendStrategy::Window => match self.window_start(epoch) {
                None => 0,
                Some(start) if start > self.last => self.allowed,
                Some(_) => self.allowed.saturating_sub(self.spent),
            },
            SpendStrategy::Drip => self.accrued(epoch),
        }
    }

    fn accrued(&self, epoch: u64) -> u64 {
        if self.interval == 0 {
            return self.spent.min(self.max);
        }
        let periods = epoch.saturating_sub(self.last) / self.interval;
        self.spent
            .saturating_add(periods.saturating_mul(self.allowed))
            .min(self.max)
    }

    /// Check and apply a spend of `amount` at `epoch`.
    ///
    /// On rejection the record is untouched and the error reports what was
    /// available.
    pub fn settle(&mut self, asset: AssetId, amount: u64, epoch: u64) -> WardenResult<()> {
        let available = self.available(epoch);
        if available < amount {
            return Err(WardenError::allowance_exceeded(asset, amount, available));
        }

        match self.strategy {
            SpendStrategy::Flat => {
                self.spent = self.spent.saturating_add(amount);
            }
            SpendStrategy::Window => {
                let fresh = self
                    .window_start(epoch)
                    .is_some_and(|start| start > self.last);
                self.spent = if fresh {
                    amount
                } else {
                    self.spent.saturating_add(amount)
                };
            }
            SpendStrategy::Drip => {
                self.spent = available - amount;
            }
        }
        self.last = epoch;
        Ok(())
    }
}
