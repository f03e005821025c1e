//! Store-side vote verification.
//!
//! A client's claim that it voted is only a hint. [`VoteVerifier`] fetches the
//! receipt from the ledger, re-derives who voted for what, and records the
//! vote under the (user, election) uniqueness guard. A second verification of
//! the same vote answers `duplicate`, never a second record.
//!
//! Claims that fail for transient reasons are parked and re-driven by the
//! [`Reconciler`]. [`ElectionSync`] mirrors election state and tallies from
//! finalized ledger state into the Store.

pub mod error;
pub mod reconciler;
pub mod sync;
pub mod verifier;

pub use error::VerifyError;
pub use reconciler::{ReconcileReport, Reconciler};
pub use sync::ElectionSync;
pub use verifier::VoteVerifier;
