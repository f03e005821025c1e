//! Mirroring election state from the ledger into the Store.

use std::sync::Arc;

use chainvote_ledger::LedgerClient;
use chainvote_store::{ElectionStore, Store, StoreError};
use chainvote_types::{Election, ElectionId};
use tracing::{debug, info};

use crate::VerifyError;

/// Pulls finalized election state from the ledger into the Store cache.
#[derive(Clone)]
pub struct ElectionSync {
    ledger: LedgerClient,
    store: Arc<dyn Store>,
}

impl ElectionSync {
    pub fn new(ledger: LedgerClient, store: Arc<dyn Store>) -> Self {
        Self { ledger, store }
    }

    /// Refresh one election from the ledger, keeping off-chain metadata the
    /// ledger leaves empty. A cached closed flag is never cleared.
    pub async fn sync_election(&self, id: ElectionId) -> Result<Election, VerifyError> {
        let snap = self
            .ledger
            .read_election_state(id)
            .await?
            .ok_or(VerifyError::UnknownElection(id))?;

        let election = match self.store.get_election(id)? {
            Some(mut cached) => {
                cached.merge_ledger_state(&snap.basic, snap.candidates, snap.block);
                cached
            }
            None => {
                let mut fresh = Election::from_basic(snap.basic, snap.candidates);
                fresh.tally_block = snap.block;
                fresh
            }
        };
        self.store.put_election(&election)?;
        info!(election = %id, closed = election.closed, votes = election.total_votes(), "election synced");
        Ok(election)
    }

    /// Mark an election closed in the Store, but only once the ledger itself
    /// reports it closed.
    pub async fn mirror_close(&self, id: ElectionId) -> Result<Election, VerifyError> {
        let election = self.sync_election(id).await?;
        if !election.closed {
            return Err(VerifyError::StillOpenOnLedger(id));
        }
        self.store.mark_closed(id)?;
        info!(election = %id, "election close mirrored");
        Ok(election)
    }

    /// Replace the cached tally with finalized ledger counts, unless a
    /// concurrent refresh already stored counts from a later block.
    pub async fn refresh_tally(&self, id: ElectionId) -> Result<(), VerifyError> {
        let (block, candidates) = self
            .ledger
            .read_tally(id)
            .await?
            .ok_or(VerifyError::UnknownElection(id))?;
        match self.store.update_tally(id, &candidates, block) {
            Ok(true) => {
                debug!(election = %id, block, "tally refreshed");
                Ok(())
            }
            Ok(false) => {
                debug!(election = %id, block, "newer tally already cached");
                Ok(())
            }
            Err(StoreError::NotFound(_)) => self.sync_election(id).await.map(|_| ()),
            Err(e) => Err(e.into()),
        }
    }
}
