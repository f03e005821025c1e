//! Nullable infrastructure for deterministic testing.
//!
//! Every external dependency of the pipeline (clock, ledger, storage, wallet
//! signer, Store API) sits behind a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically (fault injection, gated approval)
//! - Count the calls made to them
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod ledger;
pub mod signer;
pub mod store;
pub mod verification;

pub use clock::NullClock;
pub use ledger::{NullLedger, NullLedgerElection};
pub use signer::{NullSigner, SignerBehavior};
pub use store::NullStore;
pub use verification::NullVerificationApi;
