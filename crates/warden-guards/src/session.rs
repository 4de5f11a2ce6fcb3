//! Batch-scoped delegation context
//!
//! The wallet is mid-delegation exactly while a [`DelegationSession`] is open
//! in the [`BatchScope`]. The scope is created when a batch starts and
//! consumed when it ends, so an unfinished delegation surfaces as an error
//! instead of leaking into the next batch.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use warden_core::{Address, WardenError, WardenResult};
use warden_registry::PluginKey;

/// Who was handed authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionHolder {
    /// A registered plugin
    Plugin(PluginKey),
    /// An arbitrary target chosen by the admin for a flash rekey
    Flash(Address),
}

/// One open authority handover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationSession {
    /// Who holds authority
    pub holder: SessionHolder,
    /// Account whose authority was handed over
    pub spending: Address,
    /// Batch position of the entry call that opened the session
    pub opened_at: usize,
}

impl DelegationSession {
    /// Plugin key when a plugin holds authority
    pub fn plugin(&self) -> Option<PluginKey> {
        match self.holder {
            SessionHolder::Plugin(key) => Some(key),
            SessionHolder::Flash(_) => None,
        }
    }
}

/// Execution context for one batch.
#[derive(Debug, Default)]
pub struct BatchScope {
    session: Option<DelegationSession>,
}

impl BatchScope {
    /// A scope with nothing delegated
    pub fn new() -> Self {
        Self::default()
    }

    /// The open session, if any
    pub fn session(&self) -> Option<&DelegationSession> {
        self.session.as_ref()
    }

    /// Account currently holding delegated authority; zero when none
    pub fn spending_address(&self) -> Address {
        self.session
            .map(|session| session.spending)
            .unwrap_or(Address::ZERO)
    }

    /// Whether a delegation is in progress
    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    /// Record a handover. Only one delegation may be in flight per batch.
    pub fn open(&mut self, session: DelegationSession) -> WardenResult<()> {
        if let Some(open) = &self.session {
            return Err(WardenError::malformed_batch(
                session.opened_at,
                format!(
                    "delegation opened at position {} is still in progress",
                    open.opened_at
                ),
            ));
        }
        debug!(
            spending = %session.spending,
            position = session.opened_at,
            holder = ?session.holder,
            "Delegation session opened"
        );
        self.session = Some(session);
        Ok(())
    }

    /// End the open session, returning it
    pub fn clear(&mut self) -> Option<DelegationSession> {
        let session = self.session.take();
        if let Some(session) = &session {
            debug!(spending = %session.spending, "Delegation session cleared");
        }
        session
    }

    /// Consume the scope at batch end; an open session is an error.
    pub fn finish(self) -> WardenResult<()> {
        match self.session {
            None => Ok(()),
            Some(session) => {
                warn!(
                    spending = %session.spending,
                    position = session.opened_at,
                    "Batch ended mid-delegation"
                );
                Err(WardenError::malformed_batch(
                    session.opened_at,
                    "authority was not restored before the batch ended",
                ))
            }
        }
    }
}
