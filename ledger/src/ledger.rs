//! The ledger seam.

use async_trait::async_trait;
use chainvote_types::{
    Candidate, CandidateId, ElectionBasic, ElectionId, TransactionReceipt, TxHash, VoterAddress,
};
use serde::{Deserialize, Serialize};

use crate::{LedgerError, SignedVoteTx};

/// What the ledger knows about a transaction hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "receipt", rename_all = "lowercase")]
pub enum TxLookup {
    /// Never seen, or evicted from the mempool.
    Unknown,
    /// Accepted but not yet in a block.
    Pending,
    /// Included in a block; the receipt says whether it succeeded.
    Mined(TransactionReceipt),
}

/// Read and write access to the voting contract.
///
/// `at_block` pins a read to the state after that block; `None` reads the
/// latest state.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Submit a signed transaction. Returns its hash without waiting for
    /// inclusion.
    async fn send_transaction(&self, tx: &SignedVoteTx) -> Result<TxHash, LedgerError>;

    async fn transaction_status(&self, hash: &TxHash) -> Result<TxLookup, LedgerError>;

    /// Number of the latest block.
    async fn block_number(&self) -> Result<u64, LedgerError>;

    async fn election_basic(
        &self,
        election: ElectionId,
        at_block: Option<u64>,
    ) -> Result<Option<ElectionBasic>, LedgerError>;

    async fn candidate(
        &self,
        election: ElectionId,
        candidate: CandidateId,
        at_block: Option<u64>,
    ) -> Result<Option<Candidate>, LedgerError>;

    async fn has_voted(
        &self,
        election: ElectionId,
        voter: &VoterAddress,
    ) -> Result<bool, LedgerError>;
}
