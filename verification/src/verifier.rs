//! Receipt re-validation and the idempotent record insert.

use std::sync::Arc;

use chainvote_ledger::LedgerClient;
use chainvote_store::{
    InsertOutcome, PendingClaim, PendingClaimStore, Store, UserStore, VoteRecordStore,
};
use chainvote_types::{
    Clock, TransactionReceipt, UserId, VerifyStatus, VoteClaim, VoteRecord, VoterAddress,
};
use chainvote_utils::tracing_spans::verify_span;
use tracing::{info, warn, Instrument};

use crate::{ElectionSync, VerifyError};

/// Verifies vote claims against the ledger and records them exactly once.
pub struct VoteVerifier {
    ledger: LedgerClient,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    sync: ElectionSync,
}

impl VoteVerifier {
    pub fn new(ledger: LedgerClient, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        let sync = ElectionSync::new(ledger.clone(), store.clone());
        Self {
            ledger,
            store,
            clock,
            sync,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn election_sync(&self) -> &ElectionSync {
        &self.sync
    }

    /// Verify `claim` on behalf of `user` and record the vote.
    ///
    /// Claims that fail for a transient reason are parked for the
    /// reconciler before the error is returned.
    pub async fn verify_vote(
        &self,
        user: &UserId,
        claim: &VoteClaim,
    ) -> Result<VerifyStatus, VerifyError> {
        let span = verify_span(user, &claim.transaction_hash.short());
        let result = self.check_claim(user, claim).instrument(span).await;
        if let Err(e) = &result {
            if e.is_retryable() {
                self.park(user, claim, e);
            }
        }
        result
    }

    /// One verification pass without parking. Used directly by the reconciler.
    pub async fn check_claim(
        &self,
        user: &UserId,
        claim: &VoteClaim,
    ) -> Result<VerifyStatus, VerifyError> {
        let profile = self
            .store
            .get_user(user)?
            .ok_or(VerifyError::UnknownUser)?;
        let wallet = profile.wallet.ok_or(VerifyError::WalletNotLinked)?;

        if self
            .store
            .get_vote_record(user, claim.election_id)?
            .is_some()
        {
            info!(%user, election = %claim.election_id, "vote already recorded");
            return Ok(VerifyStatus::Duplicate);
        }

        let receipt = self
            .ledger
            .final_receipt(&claim.transaction_hash)
            .await?
            .ok_or(VerifyError::NotConfirmed(claim.transaction_hash))?;

        let record = self.derive_record(user, &wallet, claim, &receipt)?;

        match self.store.insert_vote_record(&record)? {
            InsertOutcome::Inserted => {
                info!(
                    %user,
                    election = %record.election_id,
                    candidate = %record.candidate_id,
                    tx = %record.transaction_hash.short(),
                    "vote recorded"
                );
                if let Err(e) = self.sync.refresh_tally(record.election_id).await {
                    warn!(election = %record.election_id, error = %e, "tally refresh failed");
                }
                Ok(VerifyStatus::Recorded)
            }
            InsertOutcome::Duplicate(_) => {
                info!(%user, election = %record.election_id, "concurrent insert lost, duplicate");
                Ok(VerifyStatus::Duplicate)
            }
            InsertOutcome::TxAlreadyUsed(other) => Err(VerifyError::ReceiptMismatch(format!(
                "transaction already backs the vote of {}",
                other.user_id
            ))),
        }
    }

    /// Build the record from the receipt alone. Claim fields only have to agree.
    fn derive_record(
        &self,
        user: &UserId,
        wallet: &VoterAddress,
        claim: &VoteClaim,
        receipt: &TransactionReceipt,
    ) -> Result<VoteRecord, VerifyError> {
        if receipt.transaction_hash != claim.transaction_hash {
            return Err(VerifyError::ReceiptMismatch(
                "receipt is for a different transaction".into(),
            ));
        }
        if let Some(reason) = receipt.revert_reason() {
            return Err(VerifyError::TransactionReverted(reason.to_string()));
        }
        if &receipt.from != wallet {
            return Err(VerifyError::ReceiptMismatch(format!(
                "sent by {}, not the linked wallet {wallet}",
                receipt.from
            )));
        }
        let (election_id, candidate_id) = receipt.vote_by(wallet).ok_or_else(|| {
            VerifyError::ReceiptMismatch("no vote by the linked wallet in this transaction".into())
        })?;
        if election_id != claim.election_id || candidate_id != claim.candidate_id {
            return Err(VerifyError::ReceiptMismatch(format!(
                "receipt votes for candidate {candidate_id} in election {election_id}"
            )));
        }

        Ok(VoteRecord {
            user_id: user.clone(),
            election_id,
            candidate_id,
            transaction_hash: receipt.transaction_hash,
            voter: wallet.clone(),
            block_number: receipt.block_number,
            recorded_at: self.clock.now(),
        })
    }

    fn park(&self, user: &UserId, claim: &VoteClaim, error: &VerifyError) {
        let pending = PendingClaim {
            user_id: user.clone(),
            claim: claim.clone(),
            attempts: 1,
            first_seen: self.clock.now(),
            last_error: error.to_string(),
        };
        let already_parked = self
            .store
            .pending_claims()
            .map(|claims| {
                claims
                    .iter()
                    .any(|p| p.claim.transaction_hash == claim.transaction_hash)
            })
            .unwrap_or(false);
        if already_parked {
            return;
        }
        match self.store.park_claim(&pending) {
            Ok(()) => info!(%user, tx = %claim.transaction_hash.short(), "claim parked for reconciliation"),
            Err(e) => warn!(%user, error = %e, "failed to park claim"),
        }
    }
}
