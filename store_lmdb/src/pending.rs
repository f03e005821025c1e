//! LMDB implementation of PendingClaimStore. Keyed by transaction hash.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use chainvote_store::{PendingClaim, PendingClaimStore, StoreError};
use chainvote_types::TxHash;

use crate::LmdbError;

pub struct LmdbPendingClaimStore {
    pub(crate) env: Arc<Env>,
    pub(crate) pending_db: Database<Bytes, Bytes>,
}

impl PendingClaimStore for LmdbPendingClaimStore {
    fn park_claim(&self, claim: &PendingClaim) -> Result<(), StoreError> {
        let bytes = bincode::serialize(claim).map_err(LmdbError::from)?;
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.pending_db
            .put(&mut wtxn, claim.claim.transaction_hash.as_bytes(), &bytes)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn pending_claims(&self) -> Result<Vec<PendingClaim>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut out = Vec::new();
        for entry in self.pending_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_key, val) = entry.map_err(LmdbError::from)?;
            out.push(bincode::deserialize(val).map_err(LmdbError::from)?);
        }
        Ok(out)
    }

    fn remove_claim(&self, hash: &TxHash) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.pending_db
            .delete(&mut wtxn, hash.as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
