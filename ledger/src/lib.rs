//! Ledger access for the vote pipeline.
//!
//! The ledger is a black box behind the [`Ledger`] trait: it accepts signed
//! vote transactions, orders them into blocks and answers read queries.
//! [`LedgerClient`] layers the pipeline's contract on top of it:
//! submit-and-return-hash, poll until final, and reads pinned to the
//! finalized block so provisional votes are never counted.

pub mod client;
pub mod error;
pub mod http;
pub mod ledger;
pub mod revert;
pub mod transaction;

pub use client::{Confirmation, ElectionSnapshot, LedgerClient, LedgerClientConfig};
pub use error::LedgerError;
pub use http::HttpLedger;
pub use ledger::{Ledger, TxLookup};
pub use revert::RevertReason;
pub use transaction::{SignedVoteTx, UnsignedVoteTx};
