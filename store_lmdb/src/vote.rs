//! LMDB implementation of VoteRecordStore.
//!
//! Key format for `votes`: `user_id bytes ++ 0x00 ++ election_id (u64 BE)`.
//! User ids never contain NUL, so a prefix scan on `user_id ++ 0x00` yields
//! exactly that user's records. `vote_tx` maps a transaction hash to the
//! `votes` key it backs.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env};

use chainvote_store::{InsertOutcome, StoreError, VoteRecordStore};
use chainvote_types::{ElectionId, TxHash, UserId, VoteRecord};

use crate::LmdbError;

pub struct LmdbVoteStore {
    pub(crate) env: Arc<Env>,
    pub(crate) votes_db: Database<Bytes, Bytes>,
    pub(crate) vote_tx_db: Database<Bytes, Bytes>,
}

pub(crate) fn user_prefix(user: &UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(user.as_str().len() + 9);
    key.extend_from_slice(user.as_str().as_bytes());
    key.push(0);
    key
}

fn vote_key(user: &UserId, election: ElectionId) -> Vec<u8> {
    let mut key = user_prefix(user);
    key.extend_from_slice(&election.as_u64().to_be_bytes());
    key
}

impl VoteRecordStore for LmdbVoteStore {
    fn insert_vote_record(&self, record: &VoteRecord) -> Result<InsertOutcome, StoreError> {
        let key = vote_key(&record.user_id, record.election_id);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;

        if let Some(existing) = self.votes_db.get(&wtxn, &key).map_err(LmdbError::from)? {
            let existing: VoteRecord = bincode::deserialize(existing).map_err(LmdbError::from)?;
            return Ok(InsertOutcome::Duplicate(existing));
        }

        let tx = record.transaction_hash.as_bytes();
        if let Some(other_key) = self.vote_tx_db.get(&wtxn, tx).map_err(LmdbError::from)? {
            let other = self
                .votes_db
                .get(&wtxn, other_key)
                .map_err(LmdbError::from)?
                .ok_or_else(|| {
                    StoreError::Corruption(format!(
                        "tx index points at missing record for {}",
                        record.transaction_hash
                    ))
                })?;
            let other: VoteRecord = bincode::deserialize(other).map_err(LmdbError::from)?;
            return Ok(InsertOutcome::TxAlreadyUsed(other));
        }

        let bytes = bincode::serialize(record).map_err(LmdbError::from)?;
        self.votes_db
            .put(&mut wtxn, &key, &bytes)
            .map_err(LmdbError::from)?;
        self.vote_tx_db
            .put(&mut wtxn, tx, &key)
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(InsertOutcome::Inserted)
    }

    fn get_vote_record(
        &self,
        user: &UserId,
        election: ElectionId,
    ) -> Result<Option<VoteRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self
            .votes_db
            .get(&rtxn, &vote_key(user, election))
            .map_err(LmdbError::from)?
        {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Ok(None),
        }
    }

    fn vote_record_by_tx(&self, hash: &TxHash) -> Result<Option<VoteRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let Some(key) = self
            .vote_tx_db
            .get(&rtxn, hash.as_bytes())
            .map_err(LmdbError::from)?
        else {
            return Ok(None);
        };
        match self.votes_db.get(&rtxn, key).map_err(LmdbError::from)? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes).map_err(LmdbError::from)?)),
            None => Err(StoreError::Corruption(format!(
                "tx index points at missing record for {hash}"
            ))),
        }
    }

    fn vote_records_for_user(&self, user: &UserId) -> Result<Vec<VoteRecord>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let prefix = user_prefix(user);
        let iter = self
            .votes_db
            .prefix_iter(&rtxn, &prefix)
            .map_err(LmdbError::from)?;
        let mut records = Vec::new();
        for entry in iter {
            let (_key, val) = entry.map_err(LmdbError::from)?;
            let record: VoteRecord = bincode::deserialize(val).map_err(LmdbError::from)?;
            records.push(record);
        }
        records.sort_by_key(|r| (r.recorded_at, r.election_id));
        Ok(records)
    }

    fn count_vote_records(&self, election: ElectionId) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let suffix = election.as_u64().to_be_bytes();
        let mut count = 0;
        for entry in self.votes_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (key, _val) = entry.map_err(LmdbError::from)?;
            if key.ends_with(&suffix) && key.len() > suffix.len() && key[key.len() - 9] == 0 {
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;
    use chainvote_types::{CandidateId, Timestamp, VoterAddress};

    fn record(user: &str, election: u64, tx: u8) -> VoteRecord {
        VoteRecord {
            user_id: UserId::new(user),
            election_id: ElectionId(election),
            candidate_id: CandidateId(1),
            transaction_hash: TxHash::new([tx; 32]),
            voter: VoterAddress::from_bytes([tx; 20]),
            block_number: 5,
            recorded_at: Timestamp::new(1_000 + election),
        }
    }

    #[test]
    fn second_insert_for_same_user_and_election_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
        let store = env.vote_store();

        let first = record("alice", 1, 1);
        assert_eq!(store.insert_vote_record(&first).unwrap(), InsertOutcome::Inserted);
        assert_eq!(
            store.insert_vote_record(&record("alice", 1, 2)).unwrap(),
            InsertOutcome::Duplicate(first)
        );
        assert_eq!(store.vote_record_by_tx(&TxHash::new([2; 32])).unwrap(), None);
    }

    #[test]
    fn tx_hash_backs_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
        let store = env.vote_store();

        store.insert_vote_record(&record("alice", 1, 7)).unwrap();
        assert!(matches!(
            store.insert_vote_record(&record("bob", 1, 7)).unwrap(),
            InsertOutcome::TxAlreadyUsed(r) if r.user_id.as_str() == "alice"
        ));
        assert_eq!(store.count_vote_records(ElectionId(1)).unwrap(), 1);
    }

    #[test]
    fn records_for_user_excludes_prefix_sharing_users() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
        let store = env.vote_store();

        store.insert_vote_record(&record("al", 1, 1)).unwrap();
        store.insert_vote_record(&record("alice", 2, 2)).unwrap();
        store.insert_vote_record(&record("alice", 1, 3)).unwrap();

        let alice = store.vote_records_for_user(&UserId::new("alice")).unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].election_id, ElectionId(1));
        assert_eq!(store.vote_records_for_user(&UserId::new("al")).unwrap().len(), 1);
    }

    #[test]
    fn uniqueness_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
            env.vote_store()
                .insert_vote_record(&record("alice", 3, 1))
                .unwrap();
        }
        let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
        assert!(matches!(
            env.vote_store()
                .insert_vote_record(&record("alice", 3, 9))
                .unwrap(),
            InsertOutcome::Duplicate(_)
        ));
        assert!(env
            .vote_store()
            .get_vote_record(&UserId::new("alice"), ElectionId(3))
            .unwrap()
            .is_some());
    }
}
