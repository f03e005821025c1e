//! Nullable ledger: an in-memory voting contract with scripted faults.
//!
//! Submitted transactions are verified, queued in a mempool and executed
//! when a block is mined. Execution enforces the contract rules (unknown
//! election, closed election, invalid candidate, one vote per address) and
//! records the revert reason in the receipt. Reads honour `at_block`, so
//! finality pinning behaves as it would against a real chain.
//!
//! By default every accepted submission is mined straight away and buried
//! under `confirm_depth` empty blocks. `hold_mining` keeps submissions
//! pending until the test mines by hand.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chainvote_ledger::revert::{
    REVERT_ALREADY_VOTED, REVERT_ELECTION_CLOSED, REVERT_INVALID_CANDIDATE, REVERT_UNKNOWN_ELECTION,
};
use chainvote_ledger::{Ledger, LedgerError, SignedVoteTx, TxLookup};
use chainvote_types::{
    Candidate, CandidateId, Clock, ElectionBasic, ElectionId, LedgerEvent, SystemClock, Timestamp,
    TransactionReceipt, TxHash, TxOutcome, VoterAddress,
};

/// Parameters for an election created on the null ledger.
#[derive(Clone, Debug)]
pub struct NullLedgerElection {
    pub title: String,
    pub description: String,
    pub start_at: Option<Timestamp>,
    pub end_at: Option<Timestamp>,
    /// (name, party) per candidate; ids are assigned from 1.
    pub candidates: Vec<(String, String)>,
}

impl NullLedgerElection {
    pub fn new(title: &str, candidates: &[&str]) -> Self {
        Self {
            title: title.to_string(),
            description: String::new(),
            start_at: None,
            end_at: None,
            candidates: candidates
                .iter()
                .map(|name| (name.to_string(), "Independent".to_string()))
                .collect(),
        }
    }

    pub fn window(mut self, start_at: Timestamp, end_at: Timestamp) -> Self {
        self.start_at = Some(start_at);
        self.end_at = Some(end_at);
        self
    }
}

struct CastVote {
    block: u64,
    candidate: CandidateId,
    voter: VoterAddress,
}

struct ContractElection {
    id: ElectionId,
    setup: NullLedgerElection,
    closed_at: Option<u64>,
    votes: Vec<CastVote>,
}

impl ContractElection {
    fn basic(&self, at: u64) -> ElectionBasic {
        ElectionBasic {
            id: self.id,
            title: self.setup.title.clone(),
            description: self.setup.description.clone(),
            start_at: self.setup.start_at,
            end_at: self.setup.end_at,
            closed: self.closed_at.is_some_and(|block| block <= at),
            candidate_count: self.setup.candidates.len() as u64,
        }
    }

    fn candidate(&self, id: CandidateId, at: u64) -> Option<Candidate> {
        let index = usize::try_from(id.as_u64()).ok()?.checked_sub(1)?;
        let (name, party) = self.setup.candidates.get(index)?;
        let vote_count = self
            .votes
            .iter()
            .filter(|v| v.candidate == id && v.block <= at)
            .count() as u64;
        Some(Candidate {
            id,
            name: name.clone(),
            party: party.clone(),
            vote_count,
        })
    }

    fn accepts_at(&self, now: Timestamp) -> bool {
        self.closed_at.is_none()
            && self.setup.start_at.map_or(true, |start| now >= start)
            && self.setup.end_at.map_or(true, |end| now < end)
    }

    fn has_voted(&self, voter: &VoterAddress) -> bool {
        self.votes.iter().any(|v| &v.voter == voter)
    }
}

#[derive(Default)]
struct Faults {
    fail_sends: u32,
    reject_sends: u32,
    fail_reads: u32,
    lose_responses: u32,
    drop_sends: bool,
    hold_mining: bool,
}

struct Chain {
    head: u64,
    confirm_depth: u64,
    elections: BTreeMap<ElectionId, ContractElection>,
    mempool: Vec<(TxHash, SignedVoteTx)>,
    txs: HashMap<TxHash, TxLookup>,
    faults: Faults,
}

impl Chain {
    /// Mine one block holding every queued transaction.
    fn mine(&mut self, now: Timestamp) {
        self.head += 1;
        let block = self.head;
        for (hash, signed) in std::mem::take(&mut self.mempool) {
            let receipt = self.execute(hash, &signed, block, now);
            self.txs.insert(hash, TxLookup::Mined(receipt));
        }
    }

    fn execute(
        &mut self,
        hash: TxHash,
        signed: &SignedVoteTx,
        block: u64,
        now: Timestamp,
    ) -> TransactionReceipt {
        let tx = &signed.tx;
        let revert = match self.elections.get_mut(&tx.election_id) {
            None => Some(REVERT_UNKNOWN_ELECTION),
            Some(e) if !e.accepts_at(now) => Some(REVERT_ELECTION_CLOSED),
            Some(e) if e.candidate(tx.candidate_id, block).is_none() => {
                Some(REVERT_INVALID_CANDIDATE)
            }
            Some(e) if e.has_voted(&tx.from) => Some(REVERT_ALREADY_VOTED),
            Some(e) => {
                e.votes.push(CastVote {
                    block,
                    candidate: tx.candidate_id,
                    voter: tx.from.clone(),
                });
                None
            }
        };

        let (outcome, logs) = match revert {
            Some(reason) => (
                TxOutcome::Reverted {
                    reason: reason.to_string(),
                },
                Vec::new(),
            ),
            None => (
                TxOutcome::Success,
                vec![LedgerEvent::Voted {
                    election_id: tx.election_id,
                    candidate_id: tx.candidate_id,
                    voter: tx.from.clone(),
                }],
            ),
        };
        TransactionReceipt {
            transaction_hash: hash,
            block_number: block,
            from: tx.from.clone(),
            outcome,
            logs,
        }
    }

    fn bury(&mut self, now: Timestamp) {
        self.mine(now);
        for _ in 0..self.confirm_depth {
            self.mine(now);
        }
    }

    fn pinned(&self, at_block: Option<u64>) -> u64 {
        at_block.map_or(self.head, |at| at.min(self.head))
    }

    fn read_fault(&mut self) -> Result<(), LedgerError> {
        if self.faults.fail_reads > 0 {
            self.faults.fail_reads -= 1;
            return Err(LedgerError::Unreachable("injected read failure".into()));
        }
        Ok(())
    }
}

/// An in-memory ledger for testing.
pub struct NullLedger {
    clock: Arc<dyn Clock>,
    chain: Mutex<Chain>,
    calls: AtomicU64,
    sends: AtomicU64,
}

impl NullLedger {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Election windows are evaluated against `clock` when votes execute.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            chain: Mutex::new(Chain {
                head: 0,
                confirm_depth: 1,
                elections: BTreeMap::new(),
                mempool: Vec::new(),
                txs: HashMap::new(),
                faults: Faults::default(),
            }),
            calls: AtomicU64::new(0),
            sends: AtomicU64::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Chain> {
        self.chain.lock().unwrap()
    }

    /// Empty blocks mined on top of each auto-mined submission.
    pub fn set_confirm_depth(&self, depth: u64) {
        self.lock().confirm_depth = depth;
    }

    /// Create an election and return its id.
    pub fn create_election(&self, setup: NullLedgerElection) -> ElectionId {
        let mut chain = self.lock();
        let id = ElectionId(chain.elections.len() as u64 + 1);
        chain.elections.insert(
            id,
            ContractElection {
                id,
                setup,
                closed_at: None,
                votes: Vec::new(),
            },
        );
        id
    }

    /// Close an election in the next block and bury the close.
    pub fn close_election(&self, id: ElectionId) {
        let now = self.clock.now();
        let mut chain = self.lock();
        let block = chain.head + 1;
        if let Some(election) = chain.elections.get_mut(&id) {
            election.closed_at.get_or_insert(block);
        }
        chain.bury(now);
    }

    /// Record a vote directly, bypassing signatures. For seeding tallies.
    pub fn seed_vote(&self, election: ElectionId, candidate: CandidateId, voter: VoterAddress) {
        let mut chain = self.lock();
        let block = chain.head;
        if let Some(e) = chain.elections.get_mut(&election) {
            e.votes.push(CastVote {
                block,
                candidate,
                voter,
            });
        }
    }

    /// Mine one block.
    pub fn mine(&self) {
        let now = self.clock.now();
        self.lock().mine(now);
    }

    /// Mine `blocks` blocks.
    pub fn advance(&self, blocks: u64) {
        let now = self.clock.now();
        let mut chain = self.lock();
        for _ in 0..blocks {
            chain.mine(now);
        }
    }

    /// Keep submissions pending until mined by hand.
    pub fn hold_mining(&self, hold: bool) {
        self.lock().faults.hold_mining = hold;
    }

    /// The next `n` submissions fail in transit without reaching the ledger.
    pub fn fail_next_sends(&self, n: u32) {
        self.lock().faults.fail_sends = n;
    }

    /// The next `n` submissions are refused outright, as for a bad signature.
    pub fn reject_next_sends(&self, n: u32) {
        self.lock().faults.reject_sends = n;
    }

    /// The next `n` submissions are accepted but the response is lost.
    pub fn lose_next_send_responses(&self, n: u32) {
        self.lock().faults.lose_responses = n;
    }

    /// The next `n` read calls fail as unreachable.
    pub fn fail_next_reads(&self, n: u32) {
        self.lock().faults.fail_reads = n;
    }

    /// Accept submissions and forget them, as an evicting mempool would.
    pub fn drop_submissions(&self, drop: bool) {
        self.lock().faults.drop_sends = drop;
    }

    pub fn head(&self) -> u64 {
        self.lock().head
    }

    /// Latest vote count for a candidate, including unfinalized blocks.
    pub fn vote_count(&self, election: ElectionId, candidate: CandidateId) -> u64 {
        let chain = self.lock();
        let head = chain.head;
        chain
            .elections
            .get(&election)
            .and_then(|e| e.candidate(candidate, head))
            .map_or(0, |c| c.vote_count)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().mempool.len()
    }

    /// Every trait call made so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// `send_transaction` calls made so far, including failed ones.
    pub fn sends(&self) -> u64 {
        self.sends.load(Ordering::SeqCst)
    }

    fn count_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for NullLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Ledger for NullLedger {
    async fn send_transaction(&self, tx: &SignedVoteTx) -> Result<TxHash, LedgerError> {
        self.count_call();
        self.sends.fetch_add(1, Ordering::SeqCst);
        let now = self.clock.now();
        let mut chain = self.lock();

        if chain.faults.fail_sends > 0 {
            chain.faults.fail_sends -= 1;
            return Err(LedgerError::Unreachable("injected send failure".into()));
        }
        if chain.faults.reject_sends > 0 {
            chain.faults.reject_sends -= 1;
            return Err(LedgerError::Rejected("injected rejection".into()));
        }
        tx.verify()?;
        let hash = tx.hash()?;
        if chain.txs.contains_key(&hash) || chain.faults.drop_sends {
            return Ok(hash);
        }

        chain.txs.insert(hash, TxLookup::Pending);
        chain.mempool.push((hash, tx.clone()));
        if !chain.faults.hold_mining {
            chain.bury(now);
        }

        if chain.faults.lose_responses > 0 {
            chain.faults.lose_responses -= 1;
            return Err(LedgerError::Unreachable("connection reset".into()));
        }
        Ok(hash)
    }

    async fn transaction_status(&self, hash: &TxHash) -> Result<TxLookup, LedgerError> {
        self.count_call();
        let mut chain = self.lock();
        chain.read_fault()?;
        Ok(chain.txs.get(hash).cloned().unwrap_or(TxLookup::Unknown))
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.count_call();
        let mut chain = self.lock();
        chain.read_fault()?;
        Ok(chain.head)
    }

    async fn election_basic(
        &self,
        election: ElectionId,
        at_block: Option<u64>,
    ) -> Result<Option<ElectionBasic>, LedgerError> {
        self.count_call();
        let mut chain = self.lock();
        chain.read_fault()?;
        let at = chain.pinned(at_block);
        Ok(chain.elections.get(&election).map(|e| e.basic(at)))
    }

    async fn candidate(
        &self,
        election: ElectionId,
        candidate: CandidateId,
        at_block: Option<u64>,
    ) -> Result<Option<Candidate>, LedgerError> {
        self.count_call();
        let mut chain = self.lock();
        chain.read_fault()?;
        let at = chain.pinned(at_block);
        Ok(chain
            .elections
            .get(&election)
            .and_then(|e| e.candidate(candidate, at)))
    }

    async fn has_voted(
        &self,
        election: ElectionId,
        voter: &VoterAddress,
    ) -> Result<bool, LedgerError> {
        self.count_call();
        let mut chain = self.lock();
        chain.read_fault()?;
        Ok(chain
            .elections
            .get(&election)
            .is_some_and(|e| e.has_voted(voter)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainvote_crypto::{derive_address, keypair_from_seed, sign_message};
    use chainvote_ledger::UnsignedVoteTx;

    fn vote(seed: u8, election: ElectionId, candidate: u64, nonce: u64) -> SignedVoteTx {
        let kp = keypair_from_seed(&[seed; 32]);
        let tx = UnsignedVoteTx {
            from: derive_address(&kp.public),
            public_key: kp.public.clone(),
            election_id: election,
            candidate_id: CandidateId(candidate),
            nonce,
            issued_at: Timestamp::new(1),
        };
        let signature = sign_message(&tx.signing_bytes().unwrap(), &kp.private);
        SignedVoteTx { tx, signature }
    }

    #[tokio::test]
    async fn second_vote_from_same_address_reverts() {
        let ledger = NullLedger::new();
        let id = ledger.create_election(NullLedgerElection::new("Board", &["A", "B"]));

        let first = ledger.send_transaction(&vote(1, id, 1, 1)).await.unwrap();
        let second = ledger.send_transaction(&vote(1, id, 2, 2)).await.unwrap();

        let TxLookup::Mined(r1) = ledger.transaction_status(&first).await.unwrap() else {
            panic!("first vote not mined");
        };
        let TxLookup::Mined(r2) = ledger.transaction_status(&second).await.unwrap() else {
            panic!("second vote not mined");
        };
        assert!(r1.succeeded());
        assert_eq!(r2.revert_reason(), Some(REVERT_ALREADY_VOTED));
        assert_eq!(ledger.vote_count(id, CandidateId(1)), 1);
        assert_eq!(ledger.vote_count(id, CandidateId(2)), 0);
    }

    #[tokio::test]
    async fn reads_respect_at_block() {
        let ledger = NullLedger::new();
        let id = ledger.create_election(NullLedgerElection::new("Board", &["A"]));
        let before = ledger.head();
        ledger.send_transaction(&vote(1, id, 1, 1)).await.unwrap();

        let old = ledger.candidate(id, CandidateId(1), Some(before)).await.unwrap();
        let new = ledger.candidate(id, CandidateId(1), None).await.unwrap();
        assert_eq!(old.unwrap().vote_count, 0);
        assert_eq!(new.unwrap().vote_count, 1);
    }

    #[tokio::test]
    async fn held_transactions_stay_pending() {
        let ledger = NullLedger::new();
        let id = ledger.create_election(NullLedgerElection::new("Board", &["A"]));
        ledger.hold_mining(true);
        let hash = ledger.send_transaction(&vote(1, id, 1, 1)).await.unwrap();
        assert_eq!(
            ledger.transaction_status(&hash).await.unwrap(),
            TxLookup::Pending
        );
        ledger.mine();
        assert!(matches!(
            ledger.transaction_status(&hash).await.unwrap(),
            TxLookup::Mined(_)
        ));
    }

    #[tokio::test]
    async fn invalid_candidate_and_closed_election_revert() {
        let ledger = NullLedger::new();
        let id = ledger.create_election(NullLedgerElection::new("Board", &["A"]));
        let bad = ledger.send_transaction(&vote(1, id, 9, 1)).await.unwrap();
        ledger.close_election(id);
        let late = ledger.send_transaction(&vote(2, id, 1, 1)).await.unwrap();

        for (hash, reason) in [(bad, REVERT_INVALID_CANDIDATE), (late, REVERT_ELECTION_CLOSED)] {
            let TxLookup::Mined(r) = ledger.transaction_status(&hash).await.unwrap() else {
                panic!("not mined");
            };
            assert_eq!(r.revert_reason(), Some(reason));
        }
    }

    #[tokio::test]
    async fn injected_faults_fire_once() {
        let ledger = NullLedger::new();
        ledger.fail_next_reads(1);
        assert!(ledger.block_number().await.is_err());
        assert!(ledger.block_number().await.is_ok());
        assert_eq!(ledger.calls(), 2);
    }

    #[tokio::test]
    async fn rejected_send_leaves_no_trace() {
        let ledger = NullLedger::new();
        let id = ledger.create_election(NullLedgerElection::new("Board", &["A"]));
        ledger.reject_next_sends(1);
        let tx = vote(1, id, 1, 1);
        let err = ledger.send_transaction(&tx).await.unwrap_err();
        assert!(err.is_definite_rejection());
        let hash = tx.hash().unwrap();
        assert_eq!(ledger.transaction_status(&hash).await.unwrap(), TxLookup::Unknown);
        assert_eq!(ledger.send_transaction(&tx).await.unwrap(), hash);
    }
}
