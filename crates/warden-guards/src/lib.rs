//! Warden Guards - Layer 3: Delegation Guards
//!
//! The checks that stand between an entry call and an authority handover:
//!
//! - [`validate_group`]: one forward scan over the batch proving every
//!   delegated call stays inside the plugin's scope and that a restoring
//!   entry exists
//! - [`RekeyBack`]: the shared shape matcher for "authority goes back to the
//!   wallet", used by both plugin delegation and admin flash rekeys
//! - [`BatchScope`]: batch-lifetime context holding the one open
//!   [`DelegationSession`]; it must be empty when the batch ends

#![forbid(unsafe_code)]

pub mod group;
pub mod rekey_back;
pub mod session;

pub use group::{validate_group, GroupApproval};
pub use rekey_back::{expected_auth, RekeyBack};
pub use session::{BatchScope, DelegationSession, SessionHolder};
