//! LMDB implementation of UserStore.
//!
//! `wallets` maps a linked address to its user id, so an address is linked
//! to at most one user. Wallet changes read `votes` inside the same write
//! transaction that updates the profile.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};

use chainvote_store::{StoreError, UserStore, WalletChange};
use chainvote_types::{UserId, UserProfile, VoterAddress};

use crate::vote::user_prefix;
use crate::LmdbError;

pub struct LmdbUserStore {
    pub(crate) env: Arc<Env>,
    pub(crate) users_db: Database<Bytes, Bytes>,
    /// token -> user id
    pub(crate) sessions_db: Database<Bytes, Bytes>,
    /// wallet address -> user id
    pub(crate) wallets_db: Database<Bytes, Bytes>,
    /// The vote store's `votes` table, read to freeze wallets of voters.
    pub(crate) votes_db: Database<Bytes, Bytes>,
}

impl LmdbUserStore {
    fn load(&self, txn: &RoTxn, id: &UserId) -> Result<Option<UserProfile>, LmdbError> {
        match self.users_db.get(txn, id.as_str().as_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
            None => Ok(None),
        }
    }

    fn wallet_owner(&self, txn: &RoTxn, address: &VoterAddress) -> Result<Option<UserId>, StoreError> {
        match self
            .wallets_db
            .get(txn, address.as_str().as_bytes())
            .map_err(LmdbError::from)?
        {
            Some(bytes) => String::from_utf8(bytes.to_vec())
                .map(|id| Some(UserId::new(id)))
                .map_err(|e| StoreError::Corruption(format!("wallet owner id: {e}"))),
            None => Ok(None),
        }
    }

    /// Store `user` and move its wallet index entry from `previous`.
    fn store(
        &self,
        txn: &mut RwTxn,
        user: &UserProfile,
        previous: Option<&VoterAddress>,
    ) -> Result<(), LmdbError> {
        if let Some(old) = previous.filter(|old| user.wallet.as_ref() != Some(*old)) {
            self.wallets_db.delete(txn, old.as_str().as_bytes())?;
        }
        if let Some(wallet) = &user.wallet {
            self.wallets_db
                .put(txn, wallet.as_str().as_bytes(), user.id.as_str().as_bytes())?;
        }
        let bytes = bincode::serialize(user)?;
        self.users_db.put(txn, user.id.as_str().as_bytes(), &bytes)?;
        Ok(())
    }

    fn has_votes(&self, txn: &RoTxn, user: &UserId) -> Result<bool, LmdbError> {
        let mut iter = self.votes_db.prefix_iter(txn, &user_prefix(user))?;
        Ok(iter.next().transpose()?.is_some())
    }
}

impl UserStore for LmdbUserStore {
    fn get_user(&self, id: &UserId) -> Result<Option<UserProfile>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        Ok(self.load(&rtxn, id)?)
    }

    fn put_user(&self, user: &UserProfile) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let previous = self.load(&wtxn, &user.id)?.and_then(|p| p.wallet);
        self.store(&mut wtxn, user, previous.as_ref())?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn user_for_token(&self, token: &str) -> Result<Option<UserProfile>, StoreError> {
        let user_id = {
            let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
            match self
                .sessions_db
                .get(&rtxn, token.as_bytes())
                .map_err(LmdbError::from)?
            {
                Some(bytes) => String::from_utf8(bytes.to_vec())
                    .map_err(|e| StoreError::Corruption(format!("session user id: {e}")))?,
                None => return Ok(None),
            }
        };
        self.get_user(&UserId::new(user_id))
    }

    fn put_session(&self, token: &str, user: &UserId) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        self.sessions_db
            .put(&mut wtxn, token.as_bytes(), user.as_str().as_bytes())
            .map_err(LmdbError::from)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn user_for_wallet(&self, address: &VoterAddress) -> Result<Option<UserProfile>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        match self.wallet_owner(&rtxn, address)? {
            Some(owner) => Ok(self.load(&rtxn, &owner)?),
            None => Ok(None),
        }
    }

    fn set_wallet(
        &self,
        user: &UserId,
        wallet: Option<&VoterAddress>,
    ) -> Result<WalletChange, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut profile = self
            .load(&wtxn, user)?
            .ok_or_else(|| StoreError::NotFound(format!("user {user}")))?;
        if profile.wallet.as_ref() == wallet {
            return Ok(WalletChange::Updated(profile));
        }
        if self.has_votes(&wtxn, user)? {
            return Ok(WalletChange::LockedByVote);
        }
        if let Some(address) = wallet {
            if let Some(owner) = self.wallet_owner(&wtxn, address)? {
                if &owner != user {
                    return Ok(WalletChange::AddressInUse(owner));
                }
            }
        }

        let previous = profile.wallet.take();
        profile.wallet = wallet.cloned();
        self.store(&mut wtxn, &profile, previous.as_ref())?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(WalletChange::Updated(profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;
    use chainvote_store::VoteRecordStore;
    use chainvote_types::{CandidateId, ElectionId, Role, Timestamp, TxHash, VoteRecord};

    #[test]
    fn token_resolves_to_user() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
        let store = env.user_store();
        let user = UserProfile {
            id: UserId::new("u1"),
            name: "Alice".into(),
            wallet: Some(VoterAddress::from_bytes([1; 20])),
            role: Role::Admin,
        };
        store.put_user(&user).unwrap();
        store.put_session("tok", &user.id).unwrap();

        assert_eq!(store.user_for_token("tok").unwrap(), Some(user));
        assert_eq!(store.user_for_token("other").unwrap(), None);
    }

    fn voter(id: &str) -> UserProfile {
        UserProfile {
            id: UserId::new(id),
            name: id.to_string(),
            wallet: None,
            role: Role::Voter,
        }
    }

    #[test]
    fn wallet_links_are_unique_and_indexed() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
        let store = env.user_store();
        let (a, b) = (VoterAddress::from_bytes([1; 20]), VoterAddress::from_bytes([2; 20]));
        store.put_user(&voter("alice")).unwrap();
        store.put_user(&voter("bob")).unwrap();

        let linked = store.set_wallet(&UserId::new("alice"), Some(&a)).unwrap();
        assert!(matches!(linked, WalletChange::Updated(p) if p.wallet == Some(a.clone())));
        assert_eq!(
            store.set_wallet(&UserId::new("bob"), Some(&a)).unwrap(),
            WalletChange::AddressInUse(UserId::new("alice"))
        );

        store.set_wallet(&UserId::new("alice"), Some(&b)).unwrap();
        assert_eq!(store.user_for_wallet(&a).unwrap(), None);
        assert_eq!(store.user_for_wallet(&b).unwrap().unwrap().id, UserId::new("alice"));
        assert!(matches!(
            store.set_wallet(&UserId::new("bob"), Some(&a)).unwrap(),
            WalletChange::Updated(_)
        ));

        store.set_wallet(&UserId::new("alice"), None).unwrap();
        assert_eq!(store.user_for_wallet(&b).unwrap(), None);
        assert!(matches!(
            store.set_wallet(&UserId::new("nobody"), Some(&b)),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn recorded_vote_freezes_the_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 1 << 20).unwrap();
        let wallet = VoterAddress::from_bytes([3; 20]);
        let mut alice = voter("alice");
        alice.wallet = Some(wallet.clone());
        env.user_store().put_user(&alice).unwrap();
        env.vote_store()
            .insert_vote_record(&VoteRecord {
                user_id: alice.id.clone(),
                election_id: ElectionId(1),
                candidate_id: CandidateId(1),
                transaction_hash: TxHash::new([7; 32]),
                voter: wallet.clone(),
                block_number: 4,
                recorded_at: Timestamp::new(10),
            })
            .unwrap();

        let store = env.user_store();
        assert_eq!(store.set_wallet(&alice.id, None).unwrap(), WalletChange::LockedByVote);
        assert_eq!(
            store
                .set_wallet(&alice.id, Some(&VoterAddress::from_bytes([4; 20])))
                .unwrap(),
            WalletChange::LockedByVote
        );
        assert!(matches!(
            store.set_wallet(&alice.id, Some(&wallet)).unwrap(),
            WalletChange::Updated(_)
        ));
        assert_eq!(store.get_user(&alice.id).unwrap().unwrap().wallet, Some(wallet));
    }
}
