//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RwTxn};

use chainvote_store::{
    ElectionStore, InsertOutcome, PendingClaim, PendingClaimStore, StoreError, UserStore,
    VoteRecordStore, WalletChange,
};
use chainvote_types::{
    Candidate, Election, ElectionId, TxHash, UserId, UserProfile, VoteRecord, VoterAddress,
};

use crate::{LmdbElectionStore, LmdbError, LmdbPendingClaimStore, LmdbUserStore, LmdbVoteStore};

/// The schema version this code reads and writes.
///
/// Version 2 added the `wallets` index and the elections' tally block.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

const MAX_DBS: u32 = 8;
const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

/// Wraps the LMDB environment and one handle per logical store.
///
/// Implements every store trait by delegating to the per-store handles, so a
/// single `Arc<LmdbEnvironment>` can serve as the whole Store backend.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    votes: LmdbVoteStore,
    elections: LmdbElectionStore,
    users: LmdbUserStore,
    pending: LmdbPendingClaimStore,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at `path`.
    ///
    /// Refuses to open a database written with a newer schema version.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)
            .map_err(|e| LmdbError::Heed(format!("create {}: {e}", path.display())))?;

        // SAFETY: the environment is opened once per process per path; the
        // node never opens the same directory twice.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };
        let env = Arc::new(env);

        let mut wtxn = env.write_txn()?;
        let votes_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("votes"))?;
        let vote_tx_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some("vote_tx"))?;
        let elections_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some("elections"))?;
        let users_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("users"))?;
        let sessions_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some("sessions"))?;
        let pending_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some("pending_claims"))?;
        let meta_db: Database<Bytes, Bytes> = env.create_database(&mut wtxn, Some("meta"))?;
        let wallets_db: Database<Bytes, Bytes> =
            env.create_database(&mut wtxn, Some("wallets"))?;

        let stored = match meta_db.get(&wtxn, SCHEMA_VERSION_KEY)? {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("schema version is not 4 bytes".into())
                })?;
                u32::from_le_bytes(arr)
            }
            None => 0,
        };
        if stored > CURRENT_SCHEMA_VERSION {
            return Err(LmdbError::SchemaTooNew {
                found: stored,
                supported: CURRENT_SCHEMA_VERSION,
            });
        }
        if stored == 1 {
            migrate_v1(&mut wtxn, elections_db, users_db, wallets_db)?;
        }
        if stored < CURRENT_SCHEMA_VERSION {
            tracing::info!(from = stored, to = CURRENT_SCHEMA_VERSION, "initializing schema");
            meta_db.put(
                &mut wtxn,
                SCHEMA_VERSION_KEY,
                &CURRENT_SCHEMA_VERSION.to_le_bytes(),
            )?;
        }
        wtxn.commit()?;

        tracing::info!(path = %path.display(), map_size, "LMDB environment opened");

        Ok(Self {
            votes: LmdbVoteStore {
                env: env.clone(),
                votes_db,
                vote_tx_db,
            },
            elections: LmdbElectionStore {
                env: env.clone(),
                elections_db,
            },
            users: LmdbUserStore {
                env: env.clone(),
                users_db,
                sessions_db,
                wallets_db,
                votes_db,
            },
            pending: LmdbPendingClaimStore {
                env: env.clone(),
                pending_db,
            },
            env,
        })
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn vote_store(&self) -> &LmdbVoteStore {
        &self.votes
    }

    pub fn election_store(&self) -> &LmdbElectionStore {
        &self.elections
    }

    pub fn user_store(&self) -> &LmdbUserStore {
        &self.users
    }

    pub fn pending_claim_store(&self) -> &LmdbPendingClaimStore {
        &self.pending
    }
}

/// Drop the election cache, whose record layout changed, and index the
/// wallets users already linked. Elections are re-synced from the ledger.
fn migrate_v1(
    wtxn: &mut RwTxn,
    elections_db: Database<Bytes, Bytes>,
    users_db: Database<Bytes, Bytes>,
    wallets_db: Database<Bytes, Bytes>,
) -> Result<(), LmdbError> {
    elections_db.clear(wtxn)?;
    let mut links = Vec::new();
    for entry in users_db.iter(wtxn)? {
        let (_key, val) = entry?;
        let user: UserProfile = bincode::deserialize(val)?;
        if let Some(wallet) = user.wallet {
            links.push((wallet, user.id));
        }
    }
    for (wallet, user) in &links {
        wallets_db.put(wtxn, wallet.as_str().as_bytes(), user.as_str().as_bytes())?;
    }
    tracing::info!(wallets = links.len(), "migrated schema v1: election cache cleared");
    Ok(())
}

impl VoteRecordStore for LmdbEnvironment {
    fn insert_vote_record(&self, record: &VoteRecord) -> Result<InsertOutcome, StoreError> {
        self.votes.insert_vote_record(record)
    }

    fn get_vote_record(
        &self,
        user: &UserId,
        election: ElectionId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        self.votes.get_vote_record(user, election)
    }

    fn vote_record_by_tx(&self, hash: &TxHash) -> Result<Option<VoteRecord>, StoreError> {
        self.votes.vote_record_by_tx(hash)
    }

    fn vote_records_for_user(&self, user: &UserId) -> Result<Vec<VoteRecord>, StoreError> {
        self.votes.vote_records_for_user(user)
    }

    fn count_vote_records(&self, election: ElectionId) -> Result<u64, StoreError> {
        self.votes.count_vote_records(election)
    }
}

impl ElectionStore for LmdbEnvironment {
    fn put_election(&self, election: &Election) -> Result<(), StoreError> {
        self.elections.put_election(election)
    }

    fn get_election(&self, id: ElectionId) -> Result<Option<Election>, StoreError> {
        self.elections.get_election(id)
    }

    fn list_elections(&self) -> Result<Vec<Election>, StoreError> {
        self.elections.list_elections()
    }

    fn update_tally(
        &self,
        id: ElectionId,
        candidates: &[Candidate],
        at_block: u64,
    ) -> Result<bool, StoreError> {
        self.elections.update_tally(id, candidates, at_block)
    }

    fn mark_closed(&self, id: ElectionId) -> Result<(), StoreError> {
        self.elections.mark_closed(id)
    }
}

impl UserStore for LmdbEnvironment {
    fn get_user(&self, id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        self.users.get_user(id)
    }

    fn put_user(&self, user: &UserProfile) -> Result<(), StoreError> {
        self.users.put_user(user)
    }

    fn user_for_token(&self, token: &str) -> Result<Option<UserProfile>, StoreError> {
        self.users.user_for_token(token)
    }

    fn put_session(&self, token: &str, user: &UserId) -> Result<(), StoreError> {
        self.users.put_session(token, user)
    }

    fn user_for_wallet(&self, address: &VoterAddress) -> Result<Option<UserProfile>, StoreError> {
        self.users.user_for_wallet(address)
    }

    fn set_wallet(
        &self,
        user: &UserId,
        wallet: Option<&VoterAddress>,
    ) -> Result<WalletChange, StoreError> {
        self.users.set_wallet(user, wallet)
    }
}

impl PendingClaimStore for LmdbEnvironment {
    fn park_claim(&self, claim: &PendingClaim) -> Result<(), StoreError> {
        self.pending.park_claim(claim)
    }

    fn pending_claims(&self) -> Result<Vec<PendingClaim>, StoreError> {
        self.pending.pending_claims()
    }

    fn remove_claim(&self, hash: &TxHash) -> Result<(), StoreError> {
        self.pending.remove_claim(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reopen_keeps_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        {
            let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
            drop(env);
        }
        let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
        let rtxn = env.env().read_txn().unwrap();
        let meta: Database<Bytes, Bytes> = env
            .env()
            .open_database(&rtxn, Some("meta"))
            .unwrap()
            .unwrap();
        assert_eq!(
            meta.get(&rtxn, SCHEMA_VERSION_KEY).unwrap(),
            Some(&CURRENT_SCHEMA_VERSION.to_le_bytes()[..])
        );
    }

    #[test]
    fn newer_schema_refused() {
        let dir = tempfile::tempdir().unwrap();
        {
            let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
            let mut wtxn = env.env().write_txn().unwrap();
            let meta: Database<Bytes, Bytes> = env
                .env()
                .create_database(&mut wtxn, Some("meta"))
                .unwrap();
            meta.put(&mut wtxn, SCHEMA_VERSION_KEY, &99u32.to_le_bytes())
                .unwrap();
            wtxn.commit().unwrap();
        }
        assert!(matches!(
            LmdbEnvironment::open(dir.path(), 1 << 20),
            Err(LmdbError::SchemaTooNew { found: 99, .. })
        ));
    }

    #[test]
    fn v1_database_gains_wallet_index() {
        let dir = tempfile::tempdir().unwrap();
        let wallet = VoterAddress::from_bytes([5; 20]);
        {
            let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
            env.put_user(&UserProfile {
                id: UserId::new("alice"),
                name: "Alice".into(),
                wallet: Some(wallet.clone()),
                role: Default::default(),
            })
            .unwrap();
            let mut wtxn = env.env().write_txn().unwrap();
            let mut open = |name| {
                env.env()
                    .create_database::<Bytes, Bytes>(&mut wtxn, Some(name))
                    .unwrap()
            };
            let (meta, wallets, elections) = (open("meta"), open("wallets"), open("elections"));
            wallets.clear(&mut wtxn).unwrap();
            elections.put(&mut wtxn, &1u64.to_be_bytes(), b"old layout").unwrap();
            meta.put(&mut wtxn, SCHEMA_VERSION_KEY, &1u32.to_le_bytes())
                .unwrap();
            wtxn.commit().unwrap();
        }

        let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
        assert_eq!(
            env.user_for_wallet(&wallet).unwrap().map(|u| u.id),
            Some(UserId::new("alice"))
        );
        assert!(env.list_elections().unwrap().is_empty());
    }
}
