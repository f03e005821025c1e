//! The pipeline's view of the ledger: submit, confirm, read finalized state.

use std::sync::Arc;
use std::time::Duration;

use chainvote_crypto::random_u64;
use chainvote_types::{
    Candidate, CandidateId, Election, ElectionBasic, ElectionId, PublicKey, Timestamp,
    TransactionReceipt, TxHash, VoterAddress,
};
use chainvote_utils::{retry, Backoff};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{Ledger, LedgerError, RevertReason, SignedVoteTx, TxLookup, UnsignedVoteTx};

/// Tuning for confirmation polling and reads.
#[derive(Clone, Debug)]
pub struct LedgerClientConfig {
    /// Blocks (including the receipt's own) before a transaction counts as final.
    pub min_confirmations: u64,
    /// Delay between receipt polls.
    pub poll_interval: Duration,
    /// How long a hash may stay unknown to the ledger before it counts as dropped.
    pub dropped_after: Duration,
    /// Retry schedule for read calls.
    pub read_backoff: Backoff,
}

impl Default for LedgerClientConfig {
    fn default() -> Self {
        Self {
            min_confirmations: 2,
            poll_interval: Duration::from_secs(2),
            dropped_after: Duration::from_secs(60),
            read_backoff: Backoff::default(),
        }
    }
}

/// Result of waiting for a transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirmation {
    /// Mined, succeeded, and buried under `min_confirmations` blocks.
    Confirmed(TransactionReceipt),
    /// Mined and final, but the contract reverted.
    Reverted {
        receipt: TransactionReceipt,
        reason: RevertReason,
    },
    /// The ledger no longer knows the hash.
    Dropped,
    /// Still pending or not yet final when the timeout elapsed.
    TimedOut,
}

/// Election state read at one finalized block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ElectionSnapshot {
    pub block: u64,
    pub basic: ElectionBasic,
    pub candidates: Vec<Candidate>,
}

/// Ledger access shared by the orchestrator and the Store.
#[derive(Clone)]
pub struct LedgerClient {
    ledger: Arc<dyn Ledger>,
    config: LedgerClientConfig,
}

impl LedgerClient {
    pub fn new(ledger: Arc<dyn Ledger>, config: LedgerClientConfig) -> Self {
        Self { ledger, config }
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub fn config(&self) -> &LedgerClientConfig {
        &self.config
    }

    /// Build an unsigned `vote(electionId, candidateId)` transaction.
    ///
    /// Makes no ledger call; the nonce is drawn from the OS RNG.
    pub fn build_vote_tx(
        &self,
        from: VoterAddress,
        public_key: PublicKey,
        election_id: ElectionId,
        candidate_id: CandidateId,
    ) -> Result<UnsignedVoteTx, LedgerError> {
        let nonce = random_u64().map_err(|e| LedgerError::Encoding(e.to_string()))?;
        Ok(UnsignedVoteTx {
            from,
            public_key,
            election_id,
            candidate_id,
            nonce,
            issued_at: Timestamp::now(),
        })
    }

    /// Submit a signed vote and return its hash without waiting for inclusion.
    ///
    /// If the send fails in transit, the locally computed hash is looked up
    /// once: a transaction the ledger already holds is reported as submitted.
    pub async fn submit_vote(&self, signed: &SignedVoteTx) -> Result<TxHash, LedgerError> {
        let local = signed.hash()?;
        match self.ledger.send_transaction(signed).await {
            Ok(hash) if hash == local => {
                info!(tx = %hash.short(), election = %signed.tx.election_id, "vote submitted");
                Ok(hash)
            }
            Ok(hash) => Err(LedgerError::InvalidResponse(format!(
                "ledger returned hash {hash}, expected {local}"
            ))),
            Err(e) if e.is_transient() => {
                warn!(tx = %local.short(), error = %e, "submit failed in transit, looking up hash");
                match self.ledger.transaction_status(&local).await {
                    Ok(TxLookup::Pending) | Ok(TxLookup::Mined(_)) => {
                        info!(tx = %local.short(), "ledger holds transaction despite send error");
                        Ok(local)
                    }
                    _ => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Poll until `hash` is mined and final, dropped, or `timeout` elapses.
    ///
    /// Transient RPC errors are logged and polling continues. Only
    /// non-transient errors are returned.
    pub async fn await_confirmation(
        &self,
        hash: &TxHash,
        timeout: Duration,
    ) -> Result<Confirmation, LedgerError> {
        self.await_confirmation_after(hash, timeout, Duration::ZERO)
            .await
    }

    /// Like [`await_confirmation`](Self::await_confirmation), for a hash that
    /// has already gone unseen for `unknown_for` (a resumed wait). The credit
    /// counts toward `dropped_after` until the ledger first reports the hash.
    pub async fn await_confirmation_after(
        &self,
        hash: &TxHash,
        timeout: Duration,
        unknown_for: Duration,
    ) -> Result<Confirmation, LedgerError> {
        let deadline = Instant::now() + timeout;
        let mut unknown_since: Option<Instant> = None;
        let mut credit = unknown_for;

        loop {
            match self.poll_once(hash).await {
                Ok(Some(done)) => return Ok(done),
                Ok(None) => {
                    unknown_since = None;
                    credit = Duration::ZERO;
                }
                Err(PollError::Unknown) => {
                    let since = *unknown_since.get_or_insert_with(Instant::now);
                    if since.elapsed() + credit >= self.config.dropped_after {
                        warn!(tx = %hash.short(), "transaction dropped by ledger");
                        return Ok(Confirmation::Dropped);
                    }
                }
                Err(PollError::Ledger(e)) if e.is_transient() => {
                    warn!(tx = %hash.short(), error = %e, "receipt poll failed, will retry");
                }
                Err(PollError::Ledger(e)) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                info!(tx = %hash.short(), "confirmation wait timed out");
                return Ok(Confirmation::TimedOut);
            }
            tokio::time::sleep(self.config.poll_interval.min(deadline - now)).await;
        }
    }

    /// One poll. `Ok(None)` means pending or mined but not yet final.
    async fn poll_once(&self, hash: &TxHash) -> Result<Option<Confirmation>, PollError> {
        let receipt = match self.ledger.transaction_status(hash).await? {
            TxLookup::Unknown => return Err(PollError::Unknown),
            TxLookup::Pending => {
                debug!(tx = %hash.short(), "pending");
                return Ok(None);
            }
            TxLookup::Mined(receipt) => receipt,
        };

        let head = self.ledger.block_number().await?;
        let confirmations = receipt.confirmations(head);
        if confirmations < self.config.min_confirmations.max(1) {
            debug!(tx = %hash.short(), confirmations, "mined, awaiting finality");
            return Ok(None);
        }

        Ok(Some(match receipt.revert_reason() {
            Some(raw) => {
                let reason = RevertReason::parse(raw);
                info!(tx = %hash.short(), %reason, "transaction reverted");
                Confirmation::Reverted { receipt, reason }
            }
            None => {
                info!(tx = %hash.short(), block = receipt.block_number, "transaction confirmed");
                Confirmation::Confirmed(receipt)
            }
        }))
    }

    /// The newest block whose state counts as final.
    pub async fn finalized_block(&self) -> Result<u64, LedgerError> {
        let head = self.read(|| self.ledger.block_number()).await?;
        let depth = self.config.min_confirmations.max(1) - 1;
        Ok(head.saturating_sub(depth))
    }

    /// Election summary and candidates at the finalized block.
    pub async fn read_election_state(
        &self,
        id: ElectionId,
    ) -> Result<Option<ElectionSnapshot>, LedgerError> {
        let at = self.finalized_block().await?;
        self.read_election_state_at(id, at).await
    }

    async fn read_election_state_at(
        &self,
        id: ElectionId,
        at: u64,
    ) -> Result<Option<ElectionSnapshot>, LedgerError> {
        let Some(basic) = self.read(|| self.ledger.election_basic(id, Some(at))).await? else {
            return Ok(None);
        };
        let mut candidates = Vec::with_capacity(basic.candidate_count as usize);
        for cid in 1..=basic.candidate_count {
            let cid = CandidateId(cid);
            if let Some(c) = self.read(|| self.ledger.candidate(id, cid, Some(at))).await? {
                candidates.push(c);
            }
        }
        Ok(Some(ElectionSnapshot {
            block: at,
            basic,
            candidates,
        }))
    }

    /// Election metadata and candidates at the finalized block.
    pub async fn read_election(&self, id: ElectionId) -> Result<Option<Election>, LedgerError> {
        Ok(self
            .read_election_state(id)
            .await?
            .map(|snap| {
                let mut election = Election::from_basic(snap.basic, snap.candidates);
                election.tally_block = snap.block;
                election
            }))
    }

    /// The receipt for `hash` if it is mined and final; `None` while it is
    /// unknown, pending, or not yet buried deep enough.
    pub async fn final_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TransactionReceipt>, LedgerError> {
        let TxLookup::Mined(receipt) = self.read(|| self.ledger.transaction_status(hash)).await?
        else {
            return Ok(None);
        };
        let head = self.read(|| self.ledger.block_number()).await?;
        if receipt.confirmations(head) < self.config.min_confirmations.max(1) {
            return Ok(None);
        }
        Ok(Some(receipt))
    }

    /// One candidate at the finalized block.
    pub async fn read_candidate(
        &self,
        election: ElectionId,
        candidate: CandidateId,
    ) -> Result<Option<Candidate>, LedgerError> {
        let at = self.finalized_block().await?;
        self.read(|| self.ledger.candidate(election, candidate, Some(at)))
            .await
    }

    /// Finalized vote counts for every candidate of `election`, with the
    /// block they were read at.
    pub async fn read_tally(
        &self,
        election: ElectionId,
    ) -> Result<Option<(u64, Vec<Candidate>)>, LedgerError> {
        Ok(self
            .read_election_state(election)
            .await?
            .map(|snap| (snap.block, snap.candidates)))
    }

    pub async fn has_voted(
        &self,
        election: ElectionId,
        voter: &VoterAddress,
    ) -> Result<bool, LedgerError> {
        self.read(|| self.ledger.has_voted(election, voter)).await
    }

    async fn read<T, F, Fut>(&self, op: F) -> Result<T, LedgerError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, LedgerError>>,
    {
        retry(&self.config.read_backoff, LedgerError::is_transient, |_| op()).await
    }
}

enum PollError {
    Unknown,
    Ledger(LedgerError),
}

impl From<LedgerError> for PollError {
    fn from(e: LedgerError) -> Self {
        PollError::Ledger(e)
    }
}
