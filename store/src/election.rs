//! Election cache storage.

use chainvote_types::{Candidate, Election, ElectionId};

use crate::StoreError;

/// Cached elections: ledger state plus off-chain metadata.
///
/// Implementations keep `closed` monotonic: writing an election whose
/// `closed` is false over a stored closed one leaves it closed. Vote counts
/// only move forward in ledger blocks: a write carrying counts read at an
/// older `tally_block` than the stored ones keeps the stored counts.
pub trait ElectionStore {
    fn put_election(&self, election: &Election) -> Result<(), StoreError>;

    fn get_election(&self, id: ElectionId) -> Result<Option<Election>, StoreError>;

    /// All elections ordered by id.
    fn list_elections(&self) -> Result<Vec<Election>, StoreError>;

    /// Replace cached candidate vote counts read at `at_block`. Returns false
    /// when the cache already holds counts from a later block. `NotFound` if
    /// the election is not cached.
    fn update_tally(
        &self,
        id: ElectionId,
        candidates: &[Candidate],
        at_block: u64,
    ) -> Result<bool, StoreError>;

    /// Set `closed`. `NotFound` if the election is not cached.
    fn mark_closed(&self, id: ElectionId) -> Result<(), StoreError>;
}
