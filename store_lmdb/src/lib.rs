//! LMDB storage backend for the Authoritative Store.
//!
//! Implements every trait from `chainvote-store` using the `heed` LMDB
//! bindings. Each logical store maps to one or more named databases within a
//! single environment. LMDB allows one writer at a time, so the check-then-put
//! inside `insert_vote_record` is atomic across threads and processes.

pub mod election;
pub mod environment;
pub mod error;
pub mod pending;
pub mod user;
pub mod vote;

pub use election::LmdbElectionStore;
pub use environment::{LmdbEnvironment, CURRENT_SCHEMA_VERSION};
pub use error::LmdbError;
pub use pending::LmdbPendingClaimStore;
pub use user::LmdbUserStore;
pub use vote::LmdbVoteStore;
