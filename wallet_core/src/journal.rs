//! Durable record of in-flight vote attempts.
//!
//! An entry is written when an attempt starts and updated with the
//! transaction hash before the transaction is submitted. After a restart an
//! entry with a hash is resumed from that hash; one without is discarded,
//! since nothing reached the ledger.

use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chainvote_types::{CandidateId, ElectionId, Timestamp, TxHash, UserId, VoterAddress};
use serde::{Deserialize, Serialize};

use crate::JournalError;

/// How far an attempt got before it was journaled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalStage {
    AwaitingSignature,
    Submitted,
    Confirmed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAttempt {
    pub user_id: UserId,
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
    pub voter: VoterAddress,
    pub tx_hash: Option<TxHash>,
    pub stage: JournalStage,
    pub updated_at: Timestamp,
}

/// Attempt storage keyed by (user, election).
pub trait AttemptJournal: Send + Sync {
    fn save(&self, attempt: &PersistedAttempt) -> Result<(), JournalError>;

    fn load(
        &self,
        user: &UserId,
        election: ElectionId,
    ) -> Result<Option<PersistedAttempt>, JournalError>;

    fn remove(&self, user: &UserId, election: ElectionId) -> Result<(), JournalError>;

    /// All entries of `user`, ordered by election.
    fn list(&self, user: &UserId) -> Result<Vec<PersistedAttempt>, JournalError>;
}

/// One JSON file per attempt. Each save is flushed to disk and then renamed
/// over the old entry, so a crash never leaves a half-written one.
pub struct FileJournal {
    dir: PathBuf,
}

impl FileJournal {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn user_prefix(user: &UserId) -> String {
        format!("{}-", hex::encode(user.as_str()))
    }

    fn path(&self, user: &UserId, election: ElectionId) -> PathBuf {
        self.dir
            .join(format!("{}{}.json", Self::user_prefix(user), election))
    }
}

impl AttemptJournal for FileJournal {
    fn save(&self, attempt: &PersistedAttempt) -> Result<(), JournalError> {
        let path = self.path(&attempt.user_id, attempt.election_id);
        let tmp = path.with_extension("json.tmp");
        let mut file = File::create(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(attempt)?)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn load(
        &self,
        user: &UserId,
        election: ElectionId,
    ) -> Result<Option<PersistedAttempt>, JournalError> {
        match std::fs::read(self.path(user, election)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, user: &UserId, election: ElectionId) -> Result<(), JournalError> {
        match std::fs::remove_file(self.path(user, election)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, user: &UserId) -> Result<Vec<PersistedAttempt>, JournalError> {
        let prefix = Self::user_prefix(user);
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with(&prefix) && name.ends_with(".json") {
                let bytes = std::fs::read(entry.path())?;
                out.push(serde_json::from_slice::<PersistedAttempt>(&bytes)?);
            }
        }
        out.sort_by_key(|a| a.election_id);
        Ok(out)
    }
}

/// In-memory journal for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryJournal {
    entries: Mutex<HashMap<(UserId, ElectionId), PersistedAttempt>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<(UserId, ElectionId), PersistedAttempt>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl AttemptJournal for MemoryJournal {
    fn save(&self, attempt: &PersistedAttempt) -> Result<(), JournalError> {
        self.entries().insert(
            (attempt.user_id.clone(), attempt.election_id),
            attempt.clone(),
        );
        Ok(())
    }

    fn load(
        &self,
        user: &UserId,
        election: ElectionId,
    ) -> Result<Option<PersistedAttempt>, JournalError> {
        Ok(self.entries().get(&(user.clone(), election)).cloned())
    }

    fn remove(&self, user: &UserId, election: ElectionId) -> Result<(), JournalError> {
        self.entries().remove(&(user.clone(), election));
        Ok(())
    }

    fn list(&self, user: &UserId) -> Result<Vec<PersistedAttempt>, JournalError> {
        let mut out: Vec<_> = self
            .entries()
            .values()
            .filter(|a| &a.user_id == user)
            .cloned()
            .collect();
        out.sort_by_key(|a| a.election_id);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(user: &str, election: u64, tx: Option<u8>) -> PersistedAttempt {
        PersistedAttempt {
            user_id: UserId::new(user),
            election_id: ElectionId(election),
            candidate_id: CandidateId(1),
            voter: VoterAddress::from_bytes([1; 20]),
            tx_hash: tx.map(|b| TxHash::new([b; 32])),
            stage: JournalStage::Submitted,
            updated_at: Timestamp::new(50),
        }
    }

    #[test]
    fn file_journal_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let journal = FileJournal::open(dir.path()).unwrap();
            journal.save(&attempt("alice", 2, Some(9))).unwrap();
            journal.save(&attempt("alice", 1, None)).unwrap();
            journal.save(&attempt("bob", 1, None)).unwrap();
        }
        let journal = FileJournal::open(dir.path()).unwrap();
        let alice = journal.list(&UserId::new("alice")).unwrap();
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[1].tx_hash, Some(TxHash::new([9; 32])));

        journal.remove(&UserId::new("alice"), ElectionId(2)).unwrap();
        journal.remove(&UserId::new("alice"), ElectionId(2)).unwrap();
        assert!(journal
            .load(&UserId::new("alice"), ElectionId(2))
            .unwrap()
            .is_none());
    }

    #[test]
    fn resave_replaces_entry_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let journal = FileJournal::open(dir.path()).unwrap();
        journal.save(&attempt("alice", 1, None)).unwrap();
        let mut confirmed = attempt("alice", 1, Some(4));
        confirmed.stage = JournalStage::Confirmed;
        journal.save(&confirmed).unwrap();

        let loaded = journal.load(&UserId::new("alice"), ElectionId(1)).unwrap().unwrap();
        assert_eq!(loaded, confirmed);
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".json"));
    }

    #[test]
    fn leftover_temp_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let journal = FileJournal::open(dir.path()).unwrap();
        journal.save(&attempt("alice", 1, Some(1))).unwrap();
        let path = journal.path(&UserId::new("alice"), ElectionId(2));
        std::fs::write(path.with_extension("json.tmp"), b"{\"truncated").unwrap();
        assert_eq!(journal.list(&UserId::new("alice")).unwrap().len(), 1);
    }

    #[test]
    fn user_names_cannot_collide_through_dashes() {
        let dir = tempfile::tempdir().unwrap();
        let journal = FileJournal::open(dir.path()).unwrap();
        journal.save(&attempt("a", 1, None)).unwrap();
        journal.save(&attempt("a-1", 1, None)).unwrap();
        assert_eq!(journal.list(&UserId::new("a")).unwrap().len(), 1);
    }

    #[test]
    fn memory_journal_scopes_by_user() {
        let journal = MemoryJournal::new();
        journal.save(&attempt("alice", 1, Some(1))).unwrap();
        journal.save(&attempt("bob", 1, Some(2))).unwrap();
        assert_eq!(journal.list(&UserId::new("alice")).unwrap().len(), 1);
    }
}
