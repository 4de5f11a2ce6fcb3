//! Epoch clocks
//!
//! Expiry, cooldown, and allowance windows are all expressed in epochs. A
//! record picks its unit once, at creation, and every later comparison for
//! that record reads the same clock.

use serde::{Deserialize, Serialize};

/// The time unit a record is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EpochUnit {
    /// Host block round
    Round,
    /// Host wall-clock timestamp (seconds)
    #[default]
    Timestamp,
}

/// Snapshot of the host's monotonic clocks for the current batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Clock {
    /// Current block round
    pub round: u64,
    /// Latest block timestamp
    pub timestamp: u64,
}

impl Clock {
    /// Create a clock snapshot
    pub fn new(round: u64, timestamp: u64) -> Self {
        Self { round, timestamp }
    }

    /// Current epoch in the given unit
    pub fn epoch(&self, unit: EpochUnit) -> u64 {
        match unit {
            EpochUnit::Round => self.round,
            EpochUnit::Timestamp => self.timestamp,
        }
    }

    /// Advance both clocks by the same number of epochs
    pub fn advanced(&self, epochs: u64) -> Self {
        Self {
            round: self.round.saturating_add(epochs),
            timestamp: self.timestamp.saturating_add(epochs),
        }
    }
}
