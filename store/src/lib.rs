//! Abstract storage traits for the Authoritative Store.
//!
//! Every backend (LMDB, in-memory for testing) implements these traits. The
//! verifier and the HTTP API depend only on the traits.

pub mod election;
pub mod error;
pub mod pending;
pub mod user;
pub mod vote;

pub use election::ElectionStore;
pub use error::StoreError;
pub use pending::{PendingClaim, PendingClaimStore};
pub use user::{UserStore, WalletChange};
pub use vote::{InsertOutcome, VoteRecordStore};

/// Everything the Store service needs from one backend.
pub trait Store: VoteRecordStore + ElectionStore + UserStore + PendingClaimStore + Send + Sync {}

impl<T> Store for T where
    T: VoteRecordStore + ElectionStore + UserStore + PendingClaimStore + Send + Sync
{
}
