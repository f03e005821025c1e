use std::sync::Arc;
use std::time::Duration;

use chainvote_ledger::{LedgerClient, LedgerClientConfig};
use chainvote_nullables::{
    NullClock, NullLedger, NullLedgerElection, NullSigner, NullStore, NullVerificationApi,
    SignerBehavior,
};
use chainvote_store::{ElectionStore, Store, UserStore, VoteRecordStore};
use chainvote_types::{
    CandidateId, Election, Role, UserId, UserProfile, VerifyStatus, VoterAddress,
};
use chainvote_utils::Backoff;
use chainvote_verification::VoteVerifier;
use chainvote_wallet::{
    AttemptJournal, FileJournal, JournalStage, MemoryJournal, OrchestratorConfig, RejectReason,
    Session, VoteError, VoteOrchestrator, VoteState,
};

struct Rig {
    clock: Arc<NullClock>,
    ledger: Arc<NullLedger>,
    store: Arc<NullStore>,
    verifier: Arc<VoteVerifier>,
    signer: Arc<NullSigner>,
    api: Arc<NullVerificationApi>,
    journal: Arc<dyn AttemptJournal>,
    orchestrator: Arc<VoteOrchestrator>,
    session: Session,
    election: Election,
}

fn ledger_config() -> LedgerClientConfig {
    LedgerClientConfig {
        min_confirmations: 2,
        poll_interval: Duration::from_millis(200),
        dropped_after: Duration::from_secs(5),
        read_backoff: Backoff::new(Duration::from_millis(10), Duration::from_millis(10), 2),
    }
}

fn orchestrator_config() -> OrchestratorConfig {
    OrchestratorConfig {
        signature_timeout: Some(Duration::from_secs(60)),
        confirmation_timeout: Duration::from_secs(10),
        verify_backoff: Backoff::new(Duration::from_millis(100), Duration::from_secs(1), 5),
    }
}

fn alice(wallet: &VoterAddress) -> UserProfile {
    UserProfile {
        id: UserId::new("alice"),
        name: "Alice".into(),
        wallet: Some(wallet.clone()),
        role: Role::Voter,
    }
}

impl Rig {
    async fn new() -> Self {
        Self::with_journal(Arc::new(MemoryJournal::new())).await
    }

    async fn with_journal(journal: Arc<dyn AttemptJournal>) -> Self {
        let clock = Arc::new(NullClock::default());
        let ledger = Arc::new(NullLedger::with_clock(clock.clone()));
        let id = ledger.create_election(NullLedgerElection::new(
            "Board",
            &["Ada", "Grace", "Barbara"],
        ));
        let signer = Arc::new(NullSigner::new(1));
        let profile = alice(signer.address());
        let store = Arc::new(NullStore::new().with_user(profile.clone(), "tok-alice"));

        let verifier = Arc::new(VoteVerifier::new(
            LedgerClient::new(ledger.clone(), ledger_config()),
            store.clone() as Arc<dyn Store>,
            clock.clone(),
        ));
        let election = verifier.election_sync().sync_election(id).await.unwrap();
        let api = Arc::new(NullVerificationApi::new(
            verifier.clone(),
            profile.id.clone(),
        ));
        let orchestrator = VoteOrchestrator::new(
            LedgerClient::new(ledger.clone(), ledger_config()),
            signer.clone(),
            api.clone(),
            journal.clone(),
            clock.clone(),
            orchestrator_config(),
        );

        Self {
            clock,
            ledger,
            store,
            verifier,
            signer,
            api,
            journal,
            orchestrator,
            session: Session::new(profile, "tok-alice"),
            election,
        }
    }

    /// A second device of the same user against the same ledger and Store.
    fn another_device(&self, journal: Arc<dyn AttemptJournal>) -> Arc<VoteOrchestrator> {
        VoteOrchestrator::new(
            LedgerClient::new(self.ledger.clone(), ledger_config()),
            self.signer.clone(),
            self.api.clone(),
            journal,
            self.clock.clone(),
            orchestrator_config(),
        )
    }

    fn user(&self) -> &UserId {
        self.session.user_id()
    }

    fn journal_entries(&self) -> usize {
        self.journal.list(self.user()).unwrap().len()
    }

    fn tally(&self) -> Vec<u64> {
        self.store
            .get_election(self.election.id)
            .unwrap()
            .unwrap()
            .candidates
            .iter()
            .map(|c| c.vote_count)
            .collect()
    }
}

#[tokio::test(start_paused = true)]
async fn approved_vote_is_recorded_and_counted() {
    let rig = Rig::new().await;
    assert_eq!(rig.tally(), vec![0, 0, 0]);

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(2))
        .await
        .unwrap();
    let state = attempt.wait_settled().await;

    assert!(matches!(
        state,
        VoteState::Recorded {
            status: VerifyStatus::Recorded,
            ..
        }
    ));
    let record = rig
        .store
        .get_vote_record(rig.user(), rig.election.id)
        .unwrap()
        .unwrap();
    assert_eq!(record.candidate_id, CandidateId(2));
    assert_eq!(Some(record.transaction_hash), state.tx_hash());
    assert_eq!(rig.tally(), vec![0, 1, 0]);
    assert_eq!(rig.signer.signatures(), 1);
    assert_eq!(rig.journal_entries(), 0);
    assert_eq!(
        rig.orchestrator.status(rig.user(), rig.election.id),
        Some(state)
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_signature_touches_nothing_and_allows_retry() {
    let rig = Rig::new().await;
    rig.signer.set_behavior(SignerBehavior::Reject);
    let calls_before = rig.ledger.calls();

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    let err = attempt.outcome().await.unwrap_err();

    assert!(matches!(err, VoteError::UserRejectedSignature));
    assert_eq!(
        attempt.state(),
        VoteState::Rejected {
            reason: RejectReason::UserRejected
        }
    );
    assert_eq!(rig.ledger.calls(), calls_before);
    assert_eq!(rig.api.calls(), 0);
    assert_eq!(rig.journal_entries(), 0);

    rig.signer.set_behavior(SignerBehavior::Approve);
    let mut retry = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    assert_eq!(retry.outcome().await.unwrap(), VerifyStatus::Recorded);
    assert_eq!(rig.ledger.sends(), 1);
}

#[tokio::test(start_paused = true)]
async fn unavailable_signer_is_reported_as_such() {
    let rig = Rig::new().await;
    rig.signer.set_behavior(SignerBehavior::Unavailable);

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();

    assert!(matches!(
        attempt.outcome().await,
        Err(VoteError::SignerUnavailable(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn store_outage_is_retried_until_recorded() {
    let rig = Rig::new().await;
    rig.api.fail_next(2);

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(3))
        .await
        .unwrap();

    assert_eq!(attempt.outcome().await.unwrap(), VerifyStatus::Recorded);
    assert_eq!(rig.api.calls(), 3);
    assert_eq!(rig.store.count_vote_records(rig.election.id).unwrap(), 1);
    assert_eq!(rig.ledger.sends(), 1);
}

#[tokio::test(start_paused = true)]
async fn second_begin_joins_the_running_attempt() {
    let rig = Rig::new().await;
    rig.signer.set_behavior(SignerBehavior::WaitForApproval);

    let mut first = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    let mut second = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    assert_eq!(first.key(), second.key());
    assert_eq!(second.state(), VoteState::AwaitingSignature);

    rig.signer.approve();
    let a = first.wait_settled().await;
    let b = second.wait_settled().await;

    assert_eq!(a, b);
    assert!(matches!(a, VoteState::Recorded { .. }));
    assert_eq!(rig.signer.requests(), 1);
    assert_eq!(rig.ledger.sends(), 1);
}

#[tokio::test(start_paused = true)]
async fn recorded_attempt_refuses_a_new_vote() {
    let rig = Rig::new().await;
    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    attempt.wait_settled().await;

    let again = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(2))
        .await;
    assert!(matches!(again, Err(VoteError::AlreadyVoted(_))));
    assert_eq!(rig.signer.requests(), 1);
}

#[tokio::test(start_paused = true)]
async fn local_preconditions_fail_without_any_call() {
    let rig = Rig::new().await;
    let calls_before = rig.ledger.calls();

    let mut closed = rig.election.clone();
    closed.closed = true;
    let err = rig
        .orchestrator
        .begin_vote(&rig.session, &closed, CandidateId(1))
        .await
        .unwrap_err();
    assert!(matches!(err, VoteError::ElectionClosed(_)));

    let err = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(9))
        .await
        .unwrap_err();
    assert!(matches!(err, VoteError::InvalidCandidate(CandidateId(9))));

    let voted = rig.session.clone().with_voted([rig.election.id]);
    let err = rig
        .orchestrator
        .begin_vote(&voted, &rig.election, CandidateId(1))
        .await
        .unwrap_err();
    assert!(matches!(err, VoteError::AlreadyVoted(_)));

    assert_eq!(rig.ledger.calls(), calls_before);
    assert_eq!(rig.signer.requests(), 0);
    assert_eq!(rig.journal_entries(), 0);
}

#[tokio::test(start_paused = true)]
async fn signer_for_another_wallet_is_refused() {
    let rig = Rig::new().await;
    let mut profile = rig.session.user.clone();
    profile.wallet = Some(VoterAddress::from_bytes([9; 20]));
    let session = Session::new(profile, "tok-alice");

    let err = rig
        .orchestrator
        .begin_vote(&session, &rig.election, CandidateId(1))
        .await
        .unwrap_err();
    assert!(matches!(err, VoteError::SignerUnavailable(_)));
}

#[tokio::test(start_paused = true)]
async fn cancel_only_while_awaiting_signature() {
    let rig = Rig::new().await;
    rig.signer.set_behavior(SignerBehavior::WaitForApproval);
    let calls_before = rig.ledger.calls();

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    rig.orchestrator.cancel(rig.user(), rig.election.id).unwrap();

    assert_eq!(
        attempt.wait_settled().await,
        VoteState::Rejected {
            reason: RejectReason::Cancelled
        }
    );
    assert!(matches!(
        rig.orchestrator.cancel(rig.user(), rig.election.id),
        Err(VoteError::CancelNotAllowed("rejected"))
    ));
    assert_eq!(rig.ledger.calls(), calls_before);
    assert_eq!(rig.journal_entries(), 0);
}

#[tokio::test(start_paused = true)]
async fn cancel_after_submission_is_refused() {
    let rig = Rig::new().await;
    rig.ledger.hold_mining(true);

    let attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    let mut rx = attempt.subscribe();
    rx.wait_for(|s| matches!(s, VoteState::AwaitingConfirmation { .. }))
        .await
        .unwrap();

    assert!(matches!(
        rig.orchestrator.cancel(rig.user(), rig.election.id),
        Err(VoteError::CancelNotAllowed("awaiting_confirmation"))
    ));
}

#[tokio::test(start_paused = true)]
async fn signature_timeout_rejects_the_attempt() {
    let rig = Rig::new().await;
    rig.signer.set_behavior(SignerBehavior::WaitForApproval);

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();

    assert_eq!(
        attempt.wait_settled().await,
        VoteState::Rejected {
            reason: RejectReason::SignatureTimedOut
        }
    );
    assert_eq!(rig.ledger.sends(), 0);
}

#[tokio::test(start_paused = true)]
async fn rejected_submission_ends_without_a_hash() {
    let rig = Rig::new().await;
    rig.ledger.reject_next_sends(1);

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();

    assert!(matches!(
        attempt.wait_settled().await,
        VoteState::ChainFailed { tx: None, .. }
    ));
    assert!(matches!(
        attempt.outcome().await,
        Err(VoteError::ChainSubmissionFailed(_))
    ));
    assert_eq!(rig.journal_entries(), 0);
}

#[tokio::test(start_paused = true)]
async fn send_lost_in_transit_is_polled_until_dropped() {
    let rig = Rig::new().await;
    rig.ledger.fail_next_sends(1);

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();

    assert!(matches!(
        attempt.wait_settled().await,
        VoteState::ChainFailed { tx: Some(_), .. }
    ));
    assert_eq!(rig.journal_entries(), 0);
    assert_eq!(rig.signer.signatures(), 1);
    assert_eq!(rig.ledger.sends(), 1);
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_submit_never_signs_twice() {
    let rig = Rig::new().await;
    rig.ledger.lose_next_send_responses(1);
    rig.ledger.fail_next_reads(1);

    let mut first = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    let mut second = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();

    assert_eq!(first.outcome().await.unwrap(), VerifyStatus::Recorded);
    assert_eq!(second.outcome().await.unwrap(), VerifyStatus::Recorded);
    assert_eq!(rig.signer.signatures(), 1);
    assert_eq!(rig.ledger.sends(), 1);
    assert_eq!(rig.ledger.vote_count(rig.election.id, CandidateId(1)), 1);
    assert!(rig
        .store
        .get_vote_record(rig.user(), rig.election.id)
        .unwrap()
        .is_some());
    assert_eq!(rig.journal_entries(), 0);

    assert!(matches!(
        rig.orchestrator
            .begin_vote(&rig.session, &rig.election, CandidateId(1))
            .await,
        Err(VoteError::AlreadyVoted(_))
    ));
    assert_eq!(rig.signer.signatures(), 1);
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_submit_keeps_journal_while_parked() {
    let rig = Rig::new().await;
    rig.ledger.hold_mining(true);
    rig.ledger.lose_next_send_responses(1);
    rig.ledger.fail_next_reads(1);

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    let parked = attempt.wait_settled().await;
    let VoteState::ConfirmationTimedOut { tx } = parked else {
        panic!("expected a parked attempt, got {parked:?}");
    };
    assert_eq!(rig.journal_entries(), 1);

    rig.ledger.hold_mining(false);
    rig.ledger.advance(2);
    let mut resumed = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    assert_eq!(resumed.outcome().await.unwrap(), VerifyStatus::Recorded);
    let record = rig
        .store
        .get_vote_record(rig.user(), rig.election.id)
        .unwrap()
        .unwrap();
    assert_eq!(record.transaction_hash, tx);
    assert_eq!(rig.signer.signatures(), 1);
}

#[tokio::test(start_paused = true)]
async fn lost_send_response_still_records() {
    let rig = Rig::new().await;
    rig.ledger.lose_next_send_responses(1);

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();

    assert_eq!(attempt.outcome().await.unwrap(), VerifyStatus::Recorded);
    assert_eq!(rig.ledger.sends(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_transaction_fails_the_attempt() {
    let rig = Rig::new().await;
    rig.ledger.drop_submissions(true);

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();

    assert!(matches!(
        attempt.wait_settled().await,
        VoteState::ChainFailed { tx: Some(_), .. }
    ));
    assert!(matches!(
        attempt.outcome().await,
        Err(VoteError::ChainReverted(_))
    ));
    assert_eq!(rig.journal_entries(), 0);
}

#[tokio::test(start_paused = true)]
async fn confirmation_timeout_parks_and_rebegin_resumes_same_hash() {
    let rig = Rig::new().await;
    rig.ledger.hold_mining(true);

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(2))
        .await
        .unwrap();
    let parked = attempt.wait_settled().await;
    let VoteState::ConfirmationTimedOut { tx } = parked else {
        panic!("expected parked attempt, got {parked:?}");
    };
    assert!(matches!(
        attempt.outcome().await,
        Err(VoteError::ConfirmationTimedOut(hash)) if hash == tx
    ));
    let entry = rig.journal.load(rig.user(), rig.election.id).unwrap().unwrap();
    assert_eq!(entry.tx_hash, Some(tx));
    assert_eq!(entry.stage, JournalStage::Submitted);

    rig.ledger.hold_mining(false);
    rig.ledger.advance(2);
    let mut resumed = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(2))
        .await
        .unwrap();

    let done = resumed.wait_settled().await;
    assert!(matches!(done, VoteState::Recorded { tx: hash, .. } if hash == tx));
    assert_eq!(rig.signer.signatures(), 1);
    assert_eq!(rig.ledger.sends(), 1);
    assert_eq!(rig.journal_entries(), 0);
}

#[tokio::test(start_paused = true)]
async fn restart_resumes_journaled_attempt_without_resigning() {
    let dir = tempfile::tempdir().unwrap();
    let journal: Arc<dyn AttemptJournal> = Arc::new(FileJournal::open(dir.path()).unwrap());
    let rig = Rig::with_journal(journal).await;
    rig.ledger.hold_mining(true);

    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    let parked = attempt.wait_settled().await;
    assert!(matches!(parked, VoteState::ConfirmationTimedOut { .. }));

    // A fresh process: new orchestrator, journal reopened from disk.
    let reopened: Arc<dyn AttemptJournal> = Arc::new(FileJournal::open(dir.path()).unwrap());
    let restarted = rig.another_device(reopened.clone());
    rig.ledger.hold_mining(false);
    rig.ledger.advance(2);

    let mut handles = restarted.resume_pending(&rig.session).unwrap();
    assert_eq!(handles.len(), 1);
    let done = handles[0].wait_settled().await;

    assert!(matches!(done, VoteState::Recorded { .. }));
    assert_eq!(done.tx_hash(), parked.tx_hash());
    assert_eq!(rig.signer.signatures(), 1);
    assert!(reopened.list(rig.user()).unwrap().is_empty());
    assert_eq!(rig.store.count_vote_records(rig.election.id).unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn unsigned_journal_entry_is_discarded_on_resume() {
    let rig = Rig::new().await;
    rig.signer.set_behavior(SignerBehavior::WaitForApproval);
    rig.orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    assert_eq!(rig.journal_entries(), 1);

    let restarted = rig.another_device(rig.journal.clone());
    let handles = restarted.resume_pending(&rig.session).unwrap();

    assert!(handles.is_empty());
    assert_eq!(rig.journal_entries(), 0);
}

#[tokio::test(start_paused = true)]
async fn two_devices_voting_at_once_leave_one_record() {
    let rig = Rig::new().await;
    let other = rig.another_device(Arc::new(MemoryJournal::new()));

    let mut a = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    let mut b = other
        .begin_vote(&rig.session, &rig.election, CandidateId(2))
        .await
        .unwrap();

    let mut names = vec![a.wait_settled().await.name(), b.wait_settled().await.name()];
    names.sort();

    assert_eq!(names, vec!["already_voted", "recorded"]);
    assert_eq!(rig.store.count_vote_records(rig.election.id).unwrap(), 1);
    assert_eq!(rig.tally().iter().sum::<u64>(), 1);
    assert_eq!(
        rig.ledger.vote_count(rig.election.id, CandidateId(1))
            + rig.ledger.vote_count(rig.election.id, CandidateId(2)),
        1
    );
}

#[tokio::test(start_paused = true)]
async fn verifying_twice_answers_duplicate() {
    let rig = Rig::new().await;
    let mut attempt = rig
        .orchestrator
        .begin_vote(&rig.session, &rig.election, CandidateId(1))
        .await
        .unwrap();
    let VoteState::Recorded { tx, .. } = attempt.wait_settled().await else {
        panic!("vote not recorded");
    };

    let claim = chainvote_types::VoteClaim {
        transaction_hash: tx,
        election_id: rig.election.id,
        candidate_id: CandidateId(1),
    };
    let again = rig.verifier.verify_vote(rig.user(), &claim).await.unwrap();

    assert_eq!(again, VerifyStatus::Duplicate);
    assert_eq!(rig.store.count_vote_records(rig.election.id).unwrap(), 1);
    assert!(rig.store.user_for_token("tok-alice").unwrap().is_some());
}
