//! Host batch projection
//!
//! A batch is the ordered, fixed-at-submission group of sibling operations
//! the host executes atomically. The wallet only ever reads it forward from
//! its own position; it never looks backward or across batches.

use crate::identifiers::{Address, AppId, AssetId, Selector};
use crate::time::Clock;
use serde::{Deserialize, Serialize};

/// Host limit on batch size
pub const MAX_BATCH_SIZE: usize = 16;

/// Completion action attached to an application call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OnCompletion {
    /// Plain call, no state escalation
    #[default]
    NoOp,
    /// Opt the sender into the application's local state
    OptIn,
    /// Close the sender's local state
    CloseOut,
    /// Clear the sender's local state unconditionally
    ClearState,
    /// Replace the application's program
    UpdateApplication,
    /// Delete the application
    DeleteApplication,
}

/// Typed body of a batch entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnBody {
    /// Native currency payment
    Payment {
        /// Receiving account
        receiver: Address,
        /// Amount in base units
        amount: u64,
        /// Account receiving the sender's remaining balance, if closing
        close_to: Option<Address>,
    },
    /// Fungible asset transfer
    AssetTransfer {
        /// Asset being moved
        asset: AssetId,
        /// Receiving account
        receiver: Address,
        /// Amount in base units
        amount: u64,
    },
    /// Application call
    AppCall {
        /// Target application
        app: AppId,
        /// Completion action
        on_completion: OnCompletion,
        /// Raw arguments; `args[0]` is the method selector
        args: Vec<Vec<u8>>,
    },
    /// Participation key registration (never authorization-relevant)
    KeyRegistration,
}

/// One entry of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Txn {
    /// Account the entry is issued from
    pub sender: Address,
    /// New authority for `sender` after this entry, if any
    pub rekey_to: Option<Address>,
    /// Typed body
    pub body: TxnBody,
}

impl Txn {
    /// Native payment
    pub fn payment(sender: Address, receiver: Address, amount: u64) -> Self {
        Self {
            sender,
            rekey_to: None,
            body: TxnBody::Payment {
                receiver,
                amount,
                close_to: None,
            },
        }
    }

    /// Asset transfer
    pub fn asset_transfer(sender: Address, asset: AssetId, receiver: Address, amount: u64) -> Self {
        Self {
            sender,
            rekey_to: None,
            body: TxnBody::AssetTransfer {
                asset,
                receiver,
                amount,
            },
        }
    }

    /// Application call with raw arguments
    pub fn app_call(sender: Address, app: AppId, args: Vec<Vec<u8>>) -> Self {
        Self {
            sender,
            rekey_to: None,
            body: TxnBody::AppCall {
                app,
                on_completion: OnCompletion::NoOp,
                args,
            },
        }
    }

    /// ABI method call: selector followed by the encoded arguments
    pub fn method_call(sender: Address, app: AppId, selector: Selector, args: Vec<Vec<u8>>) -> Self {
        let mut all = Vec::with_capacity(args.len() + 1);
        all.push(selector.as_bytes().to_vec());
        all.extend(args);
        Self::app_call(sender, app, all)
    }

    /// Zero-amount self payment that retargets `sender`'s authority
    pub fn rekey(sender: Address, to: Address) -> Self {
        Self::payment(sender, sender, 0).with_rekey(to)
    }

    /// Attach a rekey target
    pub fn with_rekey(mut self, to: Address) -> Self {
        self.rekey_to = Some(to);
        self
    }

    /// Replace the completion action (no-op for non-call entries)
    pub fn with_on_completion(mut self, action: OnCompletion) -> Self {
        if let TxnBody::AppCall { on_completion, .. } = &mut self.body {
            *on_completion = action;
        }
        self
    }

    /// Whether this entry is an application call
    pub fn is_app_call(&self) -> bool {
        matches!(self.body, TxnBody::AppCall { .. })
    }

    /// Target application, for application calls
    pub fn app_id(&self) -> Option<AppId> {
        match &self.body {
            TxnBody::AppCall { app, .. } => Some(*app),
            _ => None,
        }
    }

    /// Completion action, for application calls
    pub fn on_completion(&self) -> Option<OnCompletion> {
        match &self.body {
            TxnBody::AppCall { on_completion, .. } => Some(*on_completion),
            _ => None,
        }
    }

    /// Raw arguments, empty for non-call entries
    pub fn args(&self) -> &[Vec<u8>] {
        match &self.body {
            TxnBody::AppCall { args, .. } => args,
            _ => &[],
        }
    }

    /// Argument `index` decoded as a big-endian integer of at most eight bytes
    pub fn arg_u64(&self, index: usize) -> Option<u64> {
        let arg = self.args().get(index)?;
        if arg.len() > 8 {
            return None;
        }
        let mut bytes = [0u8; 8];
        bytes[8 - arg.len()..].copy_from_slice(arg);
        Some(u64::from_be_bytes(bytes))
    }
}

/// Encode an integer call argument
pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_be_bytes().to_vec()
}

/// The ordered entries of one host batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    txns: Vec<Txn>,
}

impl Batch {
    /// Wrap an ordered list of entries
    pub fn new(txns: Vec<Txn>) -> Self {
        Self { txns }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.txns.len()
    }

    /// Whether the batch has no entries
    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }

    /// Entry at `position`
    pub fn get(&self, position: usize) -> Option<&Txn> {
        self.txns.get(position)
    }

    /// Entries strictly after `position`, with their positions
    pub fn after(&self, position: usize) -> impl Iterator<Item = (usize, &Txn)> {
        self.txns
            .iter()
            .enumerate()
            .skip(position.saturating_add(1))
    }

    /// All entries in order
    pub fn iter(&self) -> impl Iterator<Item = &Txn> {
        self.txns.iter()
    }
}

/// What the host tells the wallet about the call it is currently executing.
#[derive(Debug, Clone, Copy)]
pub struct CallContext<'a> {
    /// The whole batch
    pub batch: &'a Batch,
    /// Position of the wallet call inside the batch
    pub position: usize,
    /// Sender of the wallet call
    pub sender: Address,
    /// Clock snapshot for the batch
    pub clock: Clock,
}

impl<'a> CallContext<'a> {
    /// Create a call context
    pub fn new(batch: &'a Batch, position: usize, sender: Address, clock: Clock) -> Self {
        Self {
            batch,
            position,
            sender,
            clock,
        }
    }
}
