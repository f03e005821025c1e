//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chainvote_store::{
    ElectionStore, InsertOutcome, PendingClaim, PendingClaimStore, StoreError, UserStore,
    VoteRecordStore, WalletChange,
};
use chainvote_types::{
    Candidate, Election, ElectionId, TxHash, UserId, UserProfile, VoteRecord, VoterAddress,
};

#[derive(Default)]
struct Tables {
    votes: BTreeMap<(UserId, ElectionId), VoteRecord>,
    vote_tx: HashMap<TxHash, (UserId, ElectionId)>,
    elections: BTreeMap<ElectionId, Election>,
    users: HashMap<UserId, UserProfile>,
    sessions: HashMap<String, UserId>,
    pending: BTreeMap<TxHash, PendingClaim>,
    inserts: u64,
}

/// Every Store table behind one mutex, so a guarded insert is a single
/// critical section just like one LMDB write transaction.
/// Thread-safe for use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullStore {
    tables: Mutex<Tables>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }

    /// Insert a user together with a session token.
    pub fn with_user(self, user: UserProfile, token: &str) -> Self {
        {
            let mut t = self.lock();
            t.sessions.insert(token.to_string(), user.id.clone());
            t.users.insert(user.id.clone(), user);
        }
        self
    }

    /// Number of successful inserts (for assertions).
    pub fn inserted_count(&self) -> u64 {
        self.lock().inserts
    }
}

impl VoteRecordStore for NullStore {
    fn insert_vote_record(&self, record: &VoteRecord) -> Result<InsertOutcome, StoreError> {
        let mut t = self.lock();
        let key = (record.user_id.clone(), record.election_id);
        if let Some(existing) = t.votes.get(&key) {
            return Ok(InsertOutcome::Duplicate(existing.clone()));
        }
        if let Some(owner) = t.vote_tx.get(&record.transaction_hash) {
            if let Some(existing) = t.votes.get(owner) {
                return Ok(InsertOutcome::TxAlreadyUsed(existing.clone()));
            }
        }
        t.vote_tx.insert(record.transaction_hash, key.clone());
        t.votes.insert(key, record.clone());
        t.inserts += 1;
        Ok(InsertOutcome::Inserted)
    }

    fn get_vote_record(
        &self,
        user: &UserId,
        election: ElectionId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        Ok(self.lock().votes.get(&(user.clone(), election)).cloned())
    }

    fn vote_record_by_tx(&self, hash: &TxHash) -> Result<Option<VoteRecord>, StoreError> {
        let t = self.lock();
        Ok(t.vote_tx.get(hash).and_then(|key| t.votes.get(key)).cloned())
    }

    fn vote_records_for_user(&self, user: &UserId) -> Result<Vec<VoteRecord>, StoreError> {
        let mut records: Vec<VoteRecord> = self
            .lock()
            .votes
            .values()
            .filter(|r| &r.user_id == user)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.recorded_at, r.election_id));
        Ok(records)
    }

    fn count_vote_records(&self, election: ElectionId) -> Result<u64, StoreError> {
        Ok(self
            .lock()
            .votes
            .values()
            .filter(|r| r.election_id == election)
            .count() as u64)
    }
}

impl ElectionStore for NullStore {
    fn put_election(&self, election: &Election) -> Result<(), StoreError> {
        let mut t = self.lock();
        let mut next = election.clone();
        if let Some(existing) = t.elections.get(&election.id) {
            next.absorb_stored(existing);
        }
        t.elections.insert(election.id, next);
        Ok(())
    }

    fn get_election(&self, id: ElectionId) -> Result<Option<Election>, StoreError> {
        Ok(self.lock().elections.get(&id).cloned())
    }

    fn list_elections(&self) -> Result<Vec<Election>, StoreError> {
        Ok(self.lock().elections.values().cloned().collect())
    }

    fn update_tally(
        &self,
        id: ElectionId,
        candidates: &[Candidate],
        at_block: u64,
    ) -> Result<bool, StoreError> {
        let mut t = self.lock();
        let election = t
            .elections
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("election {id}")))?;
        Ok(election.apply_tally(candidates, at_block))
    }

    fn mark_closed(&self, id: ElectionId) -> Result<(), StoreError> {
        let mut t = self.lock();
        let election = t
            .elections
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("election {id}")))?;
        election.closed = true;
        Ok(())
    }
}

impl UserStore for NullStore {
    fn get_user(&self, id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        Ok(self.lock().users.get(id).cloned())
    }

    fn put_user(&self, user: &UserProfile) -> Result<(), StoreError> {
        self.lock().users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn user_for_token(&self, token: &str) -> Result<Option<UserProfile>, StoreError> {
        let t = self.lock();
        Ok(t.sessions.get(token).and_then(|id| t.users.get(id)).cloned())
    }

    fn put_session(&self, token: &str, user: &UserId) -> Result<(), StoreError> {
        self.lock().sessions.insert(token.to_string(), user.clone());
        Ok(())
    }

    fn user_for_wallet(&self, address: &VoterAddress) -> Result<Option<UserProfile>, StoreError> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|u| u.wallet.as_ref() == Some(address))
            .cloned())
    }

    fn set_wallet(
        &self,
        user: &UserId,
        wallet: Option<&VoterAddress>,
    ) -> Result<WalletChange, StoreError> {
        let mut t = self.lock();
        let current = t
            .users
            .get(user)
            .ok_or_else(|| StoreError::NotFound(format!("user {user}")))?;
        if current.wallet.as_ref() == wallet {
            return Ok(WalletChange::Updated(current.clone()));
        }
        if t.votes.keys().any(|(owner, _)| owner == user) {
            return Ok(WalletChange::LockedByVote);
        }
        if let Some(address) = wallet {
            let taken = t
                .users
                .values()
                .find(|u| &u.id != user && u.wallet.as_ref() == Some(address));
            if let Some(owner) = taken {
                return Ok(WalletChange::AddressInUse(owner.id.clone()));
            }
        }
        let profile = t
            .users
            .get_mut(user)
            .ok_or_else(|| StoreError::NotFound(format!("user {user}")))?;
        profile.wallet = wallet.cloned();
        Ok(WalletChange::Updated(profile.clone()))
    }
}

impl PendingClaimStore for NullStore {
    fn park_claim(&self, claim: &PendingClaim) -> Result<(), StoreError> {
        self.lock()
            .pending
            .insert(claim.claim.transaction_hash, claim.clone());
        Ok(())
    }

    fn pending_claims(&self) -> Result<Vec<PendingClaim>, StoreError> {
        Ok(self.lock().pending.values().cloned().collect())
    }

    fn remove_claim(&self, hash: &TxHash) -> Result<(), StoreError> {
        self.lock().pending.remove(hash);
        Ok(())
    }
}
