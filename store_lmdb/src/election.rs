//! LMDB implementation of ElectionStore. Keyed by election id (u64 BE), so
//! iteration order is id order.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RwTxn};

use chainvote_store::{ElectionStore, StoreError};
use chainvote_types::{Candidate, Election, ElectionId};

use crate::LmdbError;

pub struct LmdbElectionStore {
    pub(crate) env: Arc<Env>,
    pub(crate) elections_db: Database<Bytes, Bytes>,
}

impl LmdbElectionStore {
    fn load(&self, txn: &heed::RoTxn, id: ElectionId) -> Result<Option<Election>, LmdbError> {
        match self.elections_db.get(txn, &id.as_u64().to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn store(&self, txn: &mut RwTxn, election: &Election) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(election)?;
        self.elections_db
            .put(txn, &election.id.as_u64().to_be_bytes(), &bytes)?;
        Ok(())
    }

    /// Load, modify and store one election inside a single write transaction.
    /// Nothing is written when `f` returns false.
    fn modify<F>(&self, id: ElectionId, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Election) -> bool,
    {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut election = self
            .load(&wtxn, id)?
            .ok_or_else(|| StoreError::NotFound(format!("election {id}")))?;
        if !f(&mut election) {
            return Ok(false);
        }
        self.store(&mut wtxn, &election)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(true)
    }
}

impl ElectionStore for LmdbElectionStore {
    fn put_election(&self, election: &Election) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut election = election.clone();
        if let Some(stored) = self.load(&wtxn, election.id)? {
            election.absorb_stored(&stored);
        }
        self.store(&mut wtxn, &election)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn get_election(&self, id: ElectionId) -> Result<Option<Election>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.load(&rtxn, id)?)
    }

    fn list_elections(&self) -> Result<Vec<Election>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut out = Vec::new();
        for entry in self.elections_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, val) = entry.map_err(LmdbError::from)?;
            out.push(bincode::deserialize(val).map_err(LmdbError::from)?);
        }
        Ok(out)
    }

    fn update_tally(
        &self,
        id: ElectionId,
        candidates: &[Candidate],
        at_block: u64,
    ) -> Result<bool, StoreError> {
        self.modify(id, |election| election.apply_tally(candidates, at_block))
    }

    fn mark_closed(&self, id: ElectionId) -> Result<(), StoreError> {
        self.modify(id, |election| {
            election.closed = true;
            true
        })
        .map(|_| ())
    }
}
