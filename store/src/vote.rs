//! Vote record storage and the (user, election) uniqueness guard.

use chainvote_types::{ElectionId, TxHash, UserId, VoteRecord};

use crate::StoreError;

/// Result of a guarded insert.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    /// The record is now stored.
    Inserted,
    /// A record for the same (user, election) already exists; nothing written.
    Duplicate(VoteRecord),
    /// The transaction hash already backs a record for a different
    /// (user, election); nothing written.
    TxAlreadyUsed(VoteRecord),
}

/// Storage for immutable vote records.
///
/// `insert_vote_record` must check and write atomically: two concurrent
/// inserts for the same (user, election) yield exactly one `Inserted`.
pub trait VoteRecordStore {
    fn insert_vote_record(&self, record: &VoteRecord) -> Result<InsertOutcome, StoreError>;

    fn get_vote_record(
        &self,
        user: &UserId,
        election: ElectionId,
    ) -> Result<Option<VoteRecord>, StoreError>;

    fn vote_record_by_tx(&self, hash: &TxHash) -> Result<Option<VoteRecord>, StoreError>;

    /// All records of `user`, oldest first.
    fn vote_records_for_user(&self, user: &UserId) -> Result<Vec<VoteRecord>, StoreError>;

    fn count_vote_records(&self, election: ElectionId) -> Result<u64, StoreError>;
}
