//! Single-pass batch validation
//!
//! Given the entry call's position, scan forward once:
//!
//! ```text
//! for each later entry:
//!     rekey-back?        -> satisfied, stop (later entries are out of scope)
//!     not an app call?   -> skip
//!     app call           -> same plugin app, NoOp, args[1] == wallet id,
//!                           then the method check at the next offset
//! no rekey-back found    -> reject
//! ```
//!
//! Validation never writes to the registry. Clock updates are collected in a
//! [`GroupApproval`] and applied with [`GroupApproval::commit`] once the
//! handover itself succeeds. Commit always stamps the whole-plugin clock; with
//! a zero cooldown the stamp gates nothing.

use crate::rekey_back::RekeyBack;
use tracing::{debug, warn};
use warden_core::batch::encode_u64;
use warden_core::{
    CallContext, CooldownScope, OnCompletion, Selector, WardenError, WardenResult,
};
use warden_registry::{
    method_check, MethodCheck, MethodRestriction, PluginKey, PluginRecord, PluginRegistry,
};

/// Proof that a batch stays inside a plugin's delegated scope.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an approval does nothing until committed"]
pub struct GroupApproval {
    /// Validated registry key
    pub key: PluginKey,
    /// Epoch of the plugin's clock when validated
    pub epoch: u64,
    /// Position of the restoring entry
    pub restored_at: usize,
    /// Number of plugin calls checked
    pub calls: usize,
    /// Method clocks after the scan
    methods: Vec<MethodRestriction>,
}

impl GroupApproval {
    /// Apply the collected clock updates to the registry
    pub fn commit(self, registry: &mut PluginRegistry) -> WardenResult<()> {
        let record = registry.require_mut(&self.key)?;
        record.methods = self.methods;
        record.last_called = self.epoch;
        debug!(
            plugin = %self.key,
            epoch = self.epoch,
            calls = self.calls,
            "Plugin clocks stamped"
        );
        Ok(())
    }
}

/// Prove that the batch in `ctx` keeps the delegation to `key` in scope.
///
/// `offsets` supplies one method-restriction index per plugin call, in order.
/// It is only consulted when the plugin has method restrictions.
pub fn validate_group(
    registry: &PluginRegistry,
    ctx: &CallContext<'_>,
    key: &PluginKey,
    offsets: &[u64],
    rekey_back: &RekeyBack,
) -> WardenResult<GroupApproval> {
    let record = registry
        .require_active(key, ctx.clock, ctx.position)
        .map_err(|e| {
            warn!(plugin = %key, position = ctx.position, error = %e, "Plugin not usable");
            e
        })?;
    let epoch = ctx.clock.epoch(record.epoch_unit);
    let self_reference = encode_u64(rekey_back.wallet.value());

    let mut overlay: PluginRecord = record.clone();
    let mut cursor = 0usize;
    let mut calls = 0usize;
    let mut restored_at = None;

    for (position, txn) in ctx.batch.after(ctx.position) {
        if rekey_back.matches(txn) {
            restored_at = Some(position);
            break;
        }
        if !txn.is_app_call() {
            continue;
        }

        let reject = |reason: String| {
            warn!(plugin = %key, position, reason = %reason, "Batch rejected");
            WardenError::malformed_batch(position, reason)
        };

        if txn.app_id() != Some(key.plugin) {
            return Err(reject(format!(
                "call to {} while delegated to {}",
                txn.app_id().map(|app| app.to_string()).unwrap_or_default(),
                key.plugin
            )));
        }
        if txn.on_completion() != Some(OnCompletion::NoOp) {
            return Err(reject(format!(
                "completion {:?} not allowed while delegated",
                txn.on_completion().unwrap_or_default()
            )));
        }
        if txn.args().get(1) != Some(&self_reference) {
            return Err(reject(format!(
                "plugin call does not reference wallet {}",
                rekey_back.wallet
            )));
        }

        if overlay.has_method_restrictions() {
            let offset = *offsets
                .get(cursor)
                .ok_or_else(|| reject(format!("no method offset for plugin call {cursor}")))?;
            let selector = txn
                .args()
                .first()
                .and_then(|arg| Selector::from_arg(arg))
                .ok_or_else(|| reject("plugin call has no 4-byte selector".to_string()))?;

            match method_check(&mut overlay, selector, offset, epoch) {
                MethodCheck::Allowed => {}
                MethodCheck::OffsetOutOfRange => {
                    return Err(reject(format!("method offset {offset} out of range")));
                }
                MethodCheck::SelectorMismatch => {
                    return Err(reject(format!(
                        "selector {selector} is not the method at offset {offset}"
                    )));
                }
                MethodCheck::OnCooldown => {
                    warn!(plugin = %key, position, offset, epoch, "Method on cooldown");
                    return Err(WardenError::cooldown(
                        CooldownScope::Method { offset },
                        position,
                    ));
                }
            }
            cursor += 1;
        }
        calls += 1;
    }

    let Some(restored_at) = restored_at else {
        warn!(plugin = %key, position = ctx.position, "No rekey-back entry in batch");
        return Err(WardenError::malformed_batch(
            ctx.batch.len(),
            "batch never returns authority to the wallet",
        ));
    };

    debug!(plugin = %key, position = ctx.position, restored_at, calls, "Batch validated");
    Ok(GroupApproval {
        key: *key,
        epoch,
        restored_at,
        calls,
        methods: overlay.methods,
    })
}
