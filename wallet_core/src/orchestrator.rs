//! The vote orchestrator: one attempt per (user, election), driven from
//! signature to a durable Store record.
//!
//! ```text
//! Idle -> AwaitingSignature -> Submitted -> AwaitingConfirmation -> Confirmed
//!      -> AwaitingServerVerification -> Recorded
//! ```
//!
//! Failure exits are `Rejected`, `ChainFailed`, `VerificationFailed` and
//! `AlreadyVoted`. `ConfirmationTimedOut` parks an attempt without ending it:
//! the lock and journal entry stay and the next `begin_vote` or
//! `resume_pending` re-polls the same hash. Once a transaction hash exists
//! nothing ever signs a second transaction for the attempt.
//!
//! Each attempt runs on its own tokio task, so it outlives the caller that
//! started it. Callers hold a [`VoteAttempt`] that watches the state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chainvote_ledger::{Confirmation, LedgerClient, RevertReason, SignedVoteTx};
use chainvote_types::{
    CandidateId, Clock, Election, ElectionId, TransactionReceipt, TxHash, UserId, VerifyStatus,
    VoteClaim, VoterAddress,
};
use chainvote_utils::tracing_spans::vote_attempt_span;
use chainvote_utils::{retry, Backoff};
use tokio::sync::{oneshot, watch};
use tracing::{info, warn, Instrument};

use crate::journal::{AttemptJournal, JournalStage, PersistedAttempt};
use crate::signer::{SignerIdentity, WalletSigner};
use crate::store_client::VerificationApi;
use crate::{SignerError, VerificationClientError, VoteError};

/// Timeouts and retry schedule for attempts.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// How long to wait for the user to approve a signature. `None` waits
    /// until cancelled.
    pub signature_timeout: Option<Duration>,
    /// How long one confirmation wait lasts before the attempt parks.
    pub confirmation_timeout: Duration,
    /// Retry schedule for Store verification.
    pub verify_backoff: Backoff,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            signature_timeout: Some(Duration::from_secs(300)),
            confirmation_timeout: Duration::from_secs(180),
            verify_backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(30), 6),
        }
    }
}

/// Why an attempt ended before anything was submitted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RejectReason {
    UserRejected,
    SignerUnavailable(String),
    SignatureTimedOut,
    Cancelled,
}

/// Observable state of one attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VoteState {
    Idle,
    AwaitingSignature,
    Submitted {
        tx: TxHash,
    },
    AwaitingConfirmation {
        tx: TxHash,
    },
    /// Parked: still unconfirmed after the confirmation timeout.
    ConfirmationTimedOut {
        tx: TxHash,
    },
    Confirmed {
        receipt: TransactionReceipt,
    },
    AwaitingServerVerification {
        tx: TxHash,
    },
    Recorded {
        tx: TxHash,
        status: VerifyStatus,
    },
    Rejected {
        reason: RejectReason,
    },
    /// Submission failed (`tx` is `None`), or the transaction reverted or
    /// was dropped.
    ChainFailed {
        tx: Option<TxHash>,
        reason: String,
    },
    VerificationFailed {
        tx: TxHash,
        reason: String,
    },
    AlreadyVoted {
        tx: Option<TxHash>,
    },
}

impl VoteState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingSignature => "awaiting_signature",
            Self::Submitted { .. } => "submitted",
            Self::AwaitingConfirmation { .. } => "awaiting_confirmation",
            Self::ConfirmationTimedOut { .. } => "confirmation_timed_out",
            Self::Confirmed { .. } => "confirmed",
            Self::AwaitingServerVerification { .. } => "awaiting_server_verification",
            Self::Recorded { .. } => "recorded",
            Self::Rejected { .. } => "rejected",
            Self::ChainFailed { .. } => "chain_failed",
            Self::VerificationFailed { .. } => "verification_failed",
            Self::AlreadyVoted { .. } => "already_voted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Recorded { .. }
                | Self::Rejected { .. }
                | Self::ChainFailed { .. }
                | Self::VerificationFailed { .. }
                | Self::AlreadyVoted { .. }
        )
    }

    /// Terminal, or parked waiting for a resume.
    pub fn is_settled(&self) -> bool {
        self.is_terminal() || matches!(self, Self::ConfirmationTimedOut { .. })
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::Submitted { tx }
            | Self::AwaitingConfirmation { tx }
            | Self::ConfirmationTimedOut { tx }
            | Self::AwaitingServerVerification { tx }
            | Self::Recorded { tx, .. }
            | Self::VerificationFailed { tx, .. } => Some(*tx),
            Self::Confirmed { receipt } => Some(receipt.transaction_hash),
            Self::ChainFailed { tx, .. } | Self::AlreadyVoted { tx } => *tx,
            Self::Idle | Self::AwaitingSignature | Self::Rejected { .. } => None,
        }
    }

    /// The error a settled non-success state reports to the caller.
    pub fn error(&self, election: ElectionId) -> Option<VoteError> {
        match self {
            Self::Rejected { reason } => Some(match reason {
                RejectReason::SignerUnavailable(msg) => VoteError::SignerUnavailable(msg.clone()),
                RejectReason::UserRejected
                | RejectReason::SignatureTimedOut
                | RejectReason::Cancelled => VoteError::UserRejectedSignature,
            }),
            Self::ChainFailed { tx: None, reason } => {
                Some(VoteError::ChainSubmissionFailed(reason.clone()))
            }
            Self::ChainFailed { tx: Some(_), reason } => {
                Some(VoteError::ChainReverted(reason.clone()))
            }
            Self::ConfirmationTimedOut { tx } => Some(VoteError::ConfirmationTimedOut(*tx)),
            Self::VerificationFailed { tx, reason } => Some(VoteError::VerificationFailed {
                tx: *tx,
                reason: reason.clone(),
            }),
            Self::AlreadyVoted { .. } => Some(VoteError::AlreadyVoted(election)),
            _ => None,
        }
    }
}

/// (user, election): the unit of single flight.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttemptKey {
    pub user: UserId,
    pub election: ElectionId,
}

struct Slot {
    state: watch::Sender<VoteState>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl Slot {
    fn new(initial: VoteState) -> Arc<Self> {
        let (state, _) = watch::channel(initial);
        Arc::new(Self {
            state,
            cancel: Mutex::new(None),
        })
    }

    fn current(&self) -> VoteState {
        self.state.borrow().clone()
    }

    fn cancel_slot(&self) -> MutexGuard<'_, Option<oneshot::Sender<()>>> {
        self.cancel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// A caller's view of one attempt. Several handles may watch the same attempt.
#[derive(Debug)]
pub struct VoteAttempt {
    key: AttemptKey,
    rx: watch::Receiver<VoteState>,
}

impl VoteAttempt {
    pub fn key(&self) -> &AttemptKey {
        &self.key
    }

    pub fn state(&self) -> VoteState {
        self.rx.borrow().clone()
    }

    /// A fresh receiver for UI bindings.
    pub fn subscribe(&self) -> watch::Receiver<VoteState> {
        self.rx.clone()
    }

    /// Wait until the attempt is terminal or parked.
    pub async fn wait_settled(&mut self) -> VoteState {
        if let Ok(state) = self.rx.wait_for(VoteState::is_settled).await {
            return state.clone();
        }
        self.rx.borrow().clone()
    }

    /// Wait until settled and turn the outcome into a `Result`.
    pub async fn outcome(&mut self) -> Result<VerifyStatus, VoteError> {
        let state = self.wait_settled().await;
        match state {
            VoteState::Recorded { status, .. } => Ok(status),
            other => Err(other.error(self.key.election).unwrap_or_else(|| {
                VoteError::ChainSubmissionFailed(format!(
                    "attempt ended in state {}",
                    other.name()
                ))
            })),
        }
    }
}

/// Where a spawned driver starts.
enum Start {
    Fresh {
        identity: SignerIdentity,
        candidate: CandidateId,
        cancel: oneshot::Receiver<()>,
    },
    Confirm {
        tx: TxHash,
        candidate: CandidateId,
        /// Time since the journaled submission.
        since_submit: Duration,
    },
    Verify {
        tx: TxHash,
        candidate: CandidateId,
    },
}

/// Drives vote attempts for one device.
pub struct VoteOrchestrator {
    ledger: LedgerClient,
    signer: Arc<dyn WalletSigner>,
    api: Arc<dyn VerificationApi>,
    journal: Arc<dyn AttemptJournal>,
    clock: Arc<dyn Clock>,
    config: OrchestratorConfig,
    attempts: Mutex<HashMap<AttemptKey, Arc<Slot>>>,
}

impl VoteOrchestrator {
    pub fn new(
        ledger: LedgerClient,
        signer: Arc<dyn WalletSigner>,
        api: Arc<dyn VerificationApi>,
        journal: Arc<dyn AttemptJournal>,
        clock: Arc<dyn Clock>,
        config: OrchestratorConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            ledger,
            signer,
            api,
            journal,
            clock,
            config,
            attempts: Mutex::new(HashMap::new()),
        })
    }

    fn table(&self) -> MutexGuard<'_, HashMap<AttemptKey, Arc<Slot>>> {
        self.attempts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a vote, or join the attempt already running for this user and
    /// election.
    ///
    /// Preconditions are checked locally and fail without any ledger or
    /// Store call. A journaled attempt with a transaction hash is resumed
    /// instead of signing again.
    pub async fn begin_vote(
        self: &Arc<Self>,
        session: &crate::Session,
        election: &Election,
        candidate: CandidateId,
    ) -> Result<VoteAttempt, VoteError> {
        let key = AttemptKey {
            user: session.user_id().clone(),
            election: election.id,
        };

        if let Some(handle) = self.join_or_resume(&key)? {
            return Ok(handle);
        }

        let identity = self
            .signer
            .identity()
            .await
            .map_err(|e| VoteError::SignerUnavailable(e.to_string()))?;
        match session.wallet() {
            Some(linked) if *linked == identity.address => {}
            Some(linked) => {
                return Err(VoteError::SignerUnavailable(format!(
                    "signer holds {}, account is linked to {linked}",
                    identity.address
                )))
            }
            None => {
                return Err(VoteError::SignerUnavailable(
                    "no wallet linked to this account".into(),
                ))
            }
        }
        if !election.accepts_votes_at(self.clock.now()) {
            return Err(VoteError::ElectionClosed(election.id));
        }
        if session.has_voted(election.id) {
            return Err(VoteError::AlreadyVoted(election.id));
        }
        if election.candidate(candidate).is_none() {
            return Err(VoteError::InvalidCandidate(candidate));
        }

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let slot = {
            let mut table = self.table();
            if let Some(existing) = table.get(&key) {
                let state = existing.current();
                if matches!(
                    state,
                    VoteState::Recorded { .. } | VoteState::AlreadyVoted { .. }
                ) {
                    return Err(VoteError::AlreadyVoted(election.id));
                }
                if !state.is_terminal() {
                    return Ok(self.handle(&key, existing));
                }
            }

            self.journal.save(&PersistedAttempt {
                user_id: key.user.clone(),
                election_id: key.election,
                candidate_id: candidate,
                voter: identity.address.clone(),
                tx_hash: None,
                stage: JournalStage::AwaitingSignature,
                updated_at: self.clock.now(),
            })?;

            let slot = Slot::new(VoteState::AwaitingSignature);
            *slot.cancel_slot() = Some(cancel_tx);
            table.insert(key.clone(), slot.clone());
            slot
        };

        info!(user = %key.user, election = %key.election, %candidate, "vote attempt started");
        let handle = self.handle(&key, &slot);
        self.spawn(
            key,
            slot,
            Start::Fresh {
                identity,
                candidate,
                cancel: cancel_rx,
            },
        );
        Ok(handle)
    }

    /// Join a running attempt, re-drive a parked one, or resume from the
    /// journal. `Ok(None)` means a fresh attempt is needed.
    fn join_or_resume(self: &Arc<Self>, key: &AttemptKey) -> Result<Option<VoteAttempt>, VoteError> {
        let mut table = self.table();
        if let Some(slot) = table.get(key).cloned() {
            let state = slot.current();
            match state {
                VoteState::Recorded { .. } | VoteState::AlreadyVoted { .. } => {
                    return Err(VoteError::AlreadyVoted(key.election))
                }
                VoteState::ConfirmationTimedOut { .. } => {}
                s if !s.is_terminal() => return Ok(Some(self.handle(key, &slot))),
                _ => {
                    table.remove(key);
                }
            }
        }

        let Some(entry) = self.journal.load(&key.user, key.election)? else {
            return Ok(None);
        };
        let Some(tx) = entry.tx_hash else {
            self.journal.remove(&key.user, key.election)?;
            return Ok(None);
        };

        let (initial, start) = match entry.stage {
            JournalStage::Confirmed => (
                VoteState::AwaitingServerVerification { tx },
                Start::Verify {
                    tx,
                    candidate: entry.candidate_id,
                },
            ),
            JournalStage::Submitted | JournalStage::AwaitingSignature => (
                VoteState::AwaitingConfirmation { tx },
                Start::Confirm {
                    tx,
                    candidate: entry.candidate_id,
                    since_submit: Duration::from_secs(
                        entry.updated_at.elapsed_since(self.clock.now()),
                    ),
                },
            ),
        };

        let slot = match table.get(key) {
            Some(parked) => {
                parked.state.send_replace(initial);
                parked.clone()
            }
            None => {
                let slot = Slot::new(initial);
                table.insert(key.clone(), slot.clone());
                slot
            }
        };
        drop(table);

        info!(user = %key.user, election = %key.election, tx = %tx.short(), "resuming journaled attempt");
        let handle = self.handle(key, &slot);
        self.spawn(key.clone(), slot, start);
        Ok(Some(handle))
    }

    /// Re-drive every journaled attempt of the session's user, e.g. after a
    /// restart. Entries without a transaction hash are discarded.
    pub fn resume_pending(
        self: &Arc<Self>,
        session: &crate::Session,
    ) -> Result<Vec<VoteAttempt>, VoteError> {
        let mut handles = Vec::new();
        for entry in self.journal.list(session.user_id())? {
            let key = AttemptKey {
                user: entry.user_id.clone(),
                election: entry.election_id,
            };
            match self.join_or_resume(&key) {
                Ok(Some(handle)) => handles.push(handle),
                Ok(None) => {}
                Err(VoteError::AlreadyVoted(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(handles)
    }

    /// Cancel an attempt that is still waiting for the signature.
    pub fn cancel(&self, user: &UserId, election: ElectionId) -> Result<(), VoteError> {
        let key = AttemptKey {
            user: user.clone(),
            election,
        };
        let slot = self
            .table()
            .get(&key)
            .cloned()
            .ok_or(VoteError::CancelNotAllowed(VoteState::Idle.name()))?;
        let state = slot.current();
        if state != VoteState::AwaitingSignature {
            return Err(VoteError::CancelNotAllowed(state.name()));
        }
        let sent = slot.cancel_slot().take().map(|tx| tx.send(()));
        match sent {
            Some(Ok(())) => Ok(()),
            _ => Err(VoteError::CancelNotAllowed(slot.current().name())),
        }
    }

    /// Current state of the attempt for (user, election), if any.
    pub fn status(&self, user: &UserId, election: ElectionId) -> Option<VoteState> {
        let key = AttemptKey {
            user: user.clone(),
            election,
        };
        self.table().get(&key).map(|slot| slot.current())
    }

    fn handle(&self, key: &AttemptKey, slot: &Arc<Slot>) -> VoteAttempt {
        VoteAttempt {
            key: key.clone(),
            rx: slot.state.subscribe(),
        }
    }

    fn spawn(self: &Arc<Self>, key: AttemptKey, slot: Arc<Slot>, start: Start) {
        let span = vote_attempt_span(&key.user, &key.election);
        let this = self.clone();
        tokio::spawn(async move { this.drive(key, slot, start).await }.instrument(span));
    }

    async fn drive(self: Arc<Self>, key: AttemptKey, slot: Arc<Slot>, start: Start) {
        let end = match start {
            Start::Fresh {
                identity,
                candidate,
                cancel,
            } => self.run_fresh(&key, &slot, identity, candidate, cancel).await,
            Start::Confirm {
                tx,
                candidate,
                since_submit,
            } => self.run_confirm(&key, &slot, tx, candidate, since_submit).await,
            Start::Verify { tx, candidate } => self.run_verify(&key, &slot, tx, candidate).await,
        };
        info!(state = end.name(), "attempt settled");
    }

    fn transition(&self, slot: &Slot, state: VoteState) {
        info!(state = state.name(), "vote state");
        slot.state.send_replace(state);
    }

    /// Settle in a terminal state that needs no resume, dropping the journal entry.
    fn finish(&self, key: &AttemptKey, slot: &Slot, state: VoteState) -> VoteState {
        if let Err(e) = self.journal.remove(&key.user, key.election) {
            warn!(error = %e, "failed to clear journal entry");
        }
        self.transition(slot, state.clone());
        state
    }

    fn journal_stage(
        &self,
        key: &AttemptKey,
        candidate: CandidateId,
        voter: &VoterAddress,
        tx: TxHash,
        stage: JournalStage,
    ) -> Result<(), VoteError> {
        self.journal.save(&PersistedAttempt {
            user_id: key.user.clone(),
            election_id: key.election,
            candidate_id: candidate,
            voter: voter.clone(),
            tx_hash: Some(tx),
            stage,
            updated_at: self.clock.now(),
        })?;
        Ok(())
    }

    async fn run_fresh(
        &self,
        key: &AttemptKey,
        slot: &Slot,
        identity: SignerIdentity,
        candidate: CandidateId,
        cancel: oneshot::Receiver<()>,
    ) -> VoteState {
        let unsigned = match self.ledger.build_vote_tx(
            identity.address.clone(),
            identity.public_key.clone(),
            key.election,
            candidate,
        ) {
            Ok(tx) => tx,
            Err(e) => {
                return self.finish(
                    key,
                    slot,
                    VoteState::ChainFailed {
                        tx: None,
                        reason: e.to_string(),
                    },
                )
            }
        };

        let signing = self.signer.sign_vote(&unsigned);
        let timeout = async {
            match self.config.signature_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };
        let signed = tokio::select! {
            result = signing => match result {
                Ok(signature) => SignedVoteTx { tx: unsigned.clone(), signature },
                Err(SignerError::Rejected) => {
                    return self.reject(key, slot, RejectReason::UserRejected);
                }
                Err(e) => {
                    return self.reject(key, slot, RejectReason::SignerUnavailable(e.to_string()));
                }
            },
            Ok(()) = cancel => return self.reject(key, slot, RejectReason::Cancelled),
            _ = timeout => return self.reject(key, slot, RejectReason::SignatureTimedOut),
        };
        slot.cancel_slot().take();

        let tx = match signed.hash() {
            Ok(tx) => tx,
            Err(e) => {
                return self.finish(
                    key,
                    slot,
                    VoteState::ChainFailed {
                        tx: None,
                        reason: e.to_string(),
                    },
                )
            }
        };
        if let Err(e) =
            self.journal_stage(key, candidate, &identity.address, tx, JournalStage::Submitted)
        {
            return self.finish(
                key,
                slot,
                VoteState::ChainFailed {
                    tx: None,
                    reason: e.to_string(),
                },
            );
        }

        self.transition(slot, VoteState::Submitted { tx });
        match self.ledger.submit_vote(&signed).await {
            Ok(_) => {}
            Err(e) if e.is_definite_rejection() => {
                warn!(tx = %tx.short(), error = %e, "submission rejected");
                return self.finish(
                    key,
                    slot,
                    VoteState::ChainFailed {
                        tx: None,
                        reason: e.to_string(),
                    },
                );
            }
            // The ledger may hold the transaction. Keep the journal entry and
            // poll the hash until it confirms or counts as dropped.
            Err(e) => warn!(tx = %tx.short(), error = %e, "submission outcome unknown, polling hash"),
        }

        self.run_confirm(key, slot, tx, candidate, Duration::ZERO).await
    }

    fn reject(&self, key: &AttemptKey, slot: &Slot, reason: RejectReason) -> VoteState {
        slot.cancel_slot().take();
        self.finish(key, slot, VoteState::Rejected { reason })
    }

    async fn run_confirm(
        &self,
        key: &AttemptKey,
        slot: &Slot,
        tx: TxHash,
        candidate: CandidateId,
        since_submit: Duration,
    ) -> VoteState {
        self.transition(slot, VoteState::AwaitingConfirmation { tx });
        let outcome = self
            .ledger
            .await_confirmation_after(&tx, self.config.confirmation_timeout, since_submit)
            .await;

        match outcome {
            Ok(Confirmation::Confirmed(receipt)) => {
                let voter = receipt.from.clone();
                if let Err(e) = self.journal_stage(key, candidate, &voter, tx, JournalStage::Confirmed) {
                    warn!(error = %e, "failed to journal confirmation");
                }
                self.transition(slot, VoteState::Confirmed { receipt });
                self.run_verify(key, slot, tx, candidate).await
            }
            Ok(Confirmation::Reverted {
                receipt,
                reason: RevertReason::AlreadyVoted,
            }) => self.settle_already_voted(key, slot, tx, &receipt.from).await,
            Ok(Confirmation::Reverted { reason, .. }) => self.finish(
                key,
                slot,
                VoteState::ChainFailed {
                    tx: Some(tx),
                    reason: reason.to_string(),
                },
            ),
            Ok(Confirmation::Dropped) => self.finish(
                key,
                slot,
                VoteState::ChainFailed {
                    tx: Some(tx),
                    reason: "transaction dropped by the ledger".into(),
                },
            ),
            Ok(Confirmation::TimedOut) => {
                let state = VoteState::ConfirmationTimedOut { tx };
                self.transition(slot, state.clone());
                state
            }
            Err(e) => {
                warn!(tx = %tx.short(), error = %e, "confirmation polling failed, parking");
                let state = VoteState::ConfirmationTimedOut { tx };
                self.transition(slot, state.clone());
                state
            }
        }
    }

    /// The contract refused a second vote from this wallet. The vote it holds
    /// came from another transaction, which this device may never have seen.
    async fn settle_already_voted(
        &self,
        key: &AttemptKey,
        slot: &Slot,
        tx: TxHash,
        voter: &VoterAddress,
    ) -> VoteState {
        match self.ledger.has_voted(key.election, voter).await {
            Ok(true) => {
                warn!(
                    tx = %tx.short(),
                    %voter,
                    "wallet already voted on the ledger through another transaction"
                );
                self.finish(key, slot, VoteState::AlreadyVoted { tx: Some(tx) })
            }
            Ok(false) => self.finish(
                key,
                slot,
                VoteState::ChainFailed {
                    tx: Some(tx),
                    reason: "reverted as already voted, but the ledger holds no vote for this wallet"
                        .into(),
                },
            ),
            Err(e) => {
                warn!(tx = %tx.short(), error = %e, "could not check the wallet's ledger vote");
                self.finish(key, slot, VoteState::AlreadyVoted { tx: Some(tx) })
            }
        }
    }

    async fn run_verify(
        &self,
        key: &AttemptKey,
        slot: &Slot,
        tx: TxHash,
        candidate: CandidateId,
    ) -> VoteState {
        self.transition(slot, VoteState::AwaitingServerVerification { tx });
        let claim = VoteClaim {
            transaction_hash: tx,
            election_id: key.election,
            candidate_id: candidate,
        };
        let result = retry(
            &self.config.verify_backoff,
            VerificationClientError::is_retryable,
            |_| self.api.verify_vote(&claim),
        )
        .await;

        match result {
            Ok(status) => self.finish(key, slot, VoteState::Recorded { tx, status }),
            Err(e) => {
                warn!(tx = %tx.short(), error = %e, "verification failed, journal kept");
                let state = VoteState::VerificationFailed {
                    tx,
                    reason: e.to_string(),
                };
                self.transition(slot, state.clone());
                state
            }
        }
    }
}
