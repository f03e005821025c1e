//! Claims parked for background reconciliation.

use chainvote_types::{Timestamp, TxHash, UserId, VoteClaim};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// A verification request that failed for a transient reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingClaim {
    pub user_id: UserId,
    pub claim: VoteClaim,
    /// Verification passes made so far, including the original request.
    pub attempts: u32,
    pub first_seen: Timestamp,
    pub last_error: String,
}

/// Pending claims keyed by transaction hash.
pub trait PendingClaimStore {
    /// Insert or replace the claim for `claim.claim.transaction_hash`.
    fn park_claim(&self, claim: &PendingClaim) -> Result<(), StoreError>;

    fn pending_claims(&self) -> Result<Vec<PendingClaim>, StoreError>;

    fn remove_claim(&self, hash: &TxHash) -> Result<(), StoreError>;
}
