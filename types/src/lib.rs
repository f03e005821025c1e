//! Fundamental types for the chainvote pipeline.
//!
//! This crate defines the types shared by every other crate in the workspace:
//! identifiers, hashes, voter addresses, elections and candidates, vote records,
//! ledger receipts, timestamps, and the wire-level error codes of the Store API.

pub mod address;
pub mod api;
pub mod election;
pub mod error;
pub mod hash;
pub mod ids;
pub mod keys;
pub mod receipt;
pub mod time;
pub mod user;
pub mod vote;

pub use address::VoterAddress;
pub use api::{ApiErrorBody, ElectionResults, VerifyResponse, VoteStatusView};
pub use election::{Candidate, Election, ElectionBasic, ElectionWindow};
pub use error::{ErrorCode, TypesError};
pub use hash::TxHash;
pub use ids::{CandidateId, ElectionId, UserId};
pub use keys::{KeyPair, PrivateKey, PublicKey, Signature};
pub use receipt::{LedgerEvent, TransactionReceipt, TxOutcome};
pub use time::{Clock, SystemClock, Timestamp};
pub use user::{Role, UserProfile};
pub use vote::{VoteClaim, VoteIntent, VoteRecord, VerifyStatus};
