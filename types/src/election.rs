//! Elections and candidates.

use serde::{Deserialize, Serialize};

use crate::{CandidateId, ElectionId, Timestamp};

/// A candidate standing in one election.
///
/// `vote_count` is authoritative on the ledger; copies held by the Store are
/// a cache refreshed from finalized ledger state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
    pub party: String,
    pub vote_count: u64,
}

/// The ledger's summary view of an election (`getElectionBasic`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionBasic {
    pub id: ElectionId,
    pub title: String,
    pub description: String,
    pub start_at: Option<Timestamp>,
    pub end_at: Option<Timestamp>,
    pub closed: bool,
    pub candidate_count: u64,
}

/// Where a point in time falls relative to an election's voting window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElectionWindow {
    NotStarted,
    Open,
    Ended,
    Closed,
}

/// An election as held by the Store: ledger state plus off-chain metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Election {
    pub id: ElectionId,
    pub title: String,
    pub description: String,
    pub start_at: Option<Timestamp>,
    pub end_at: Option<Timestamp>,
    /// Monotonic: once true it never returns to false.
    pub closed: bool,
    pub candidates: Vec<Candidate>,
    /// Finalized ledger block the candidate counts were read at; 0 if unknown.
    #[serde(default)]
    pub tally_block: u64,
}

impl Election {
    /// Build an election from the ledger summary and its candidates.
    pub fn from_basic(basic: ElectionBasic, candidates: Vec<Candidate>) -> Self {
        Self {
            id: basic.id,
            title: basic.title,
            description: basic.description,
            start_at: basic.start_at,
            end_at: basic.end_at,
            closed: basic.closed,
            candidates,
            tally_block: 0,
        }
    }

    /// Classify `now` against the voting window. Start is inclusive, end exclusive.
    pub fn window_at(&self, now: Timestamp) -> ElectionWindow {
        if self.closed {
            return ElectionWindow::Closed;
        }
        if self.start_at.is_some_and(|start| now < start) {
            return ElectionWindow::NotStarted;
        }
        if self.end_at.is_some_and(|end| now >= end) {
            return ElectionWindow::Ended;
        }
        ElectionWindow::Open
    }

    /// Whether a vote cast at `now` can be accepted.
    pub fn accepts_votes_at(&self, now: Timestamp) -> bool {
        self.window_at(now) == ElectionWindow::Open
    }

    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    pub fn total_votes(&self) -> u64 {
        self.candidates.iter().map(|c| c.vote_count).sum()
    }

    /// Merge ledger state read at `at_block` into this cached copy.
    ///
    /// The closed flag never reverts and off-chain metadata (description,
    /// schedule) is kept when the ledger leaves it empty. Candidates read at an
    /// older block than the cached counts are ignored.
    pub fn merge_ledger_state(
        &mut self,
        basic: &ElectionBasic,
        candidates: Vec<Candidate>,
        at_block: u64,
    ) {
        self.title = basic.title.clone();
        if !basic.description.is_empty() {
            self.description = basic.description.clone();
        }
        self.start_at = basic.start_at.or(self.start_at);
        self.end_at = basic.end_at.or(self.end_at);
        self.closed = self.closed || basic.closed;
        if !candidates.is_empty() && at_block >= self.tally_block {
            self.candidates = candidates;
            self.tally_block = at_block;
        }
    }

    /// Apply vote counts read at `at_block`. Returns false, changing nothing,
    /// when the held counts were read at a later block.
    pub fn apply_tally(&mut self, candidates: &[Candidate], at_block: u64) -> bool {
        if at_block < self.tally_block {
            return false;
        }
        for fresh in candidates {
            match self.candidates.iter_mut().find(|c| c.id == fresh.id) {
                Some(c) => c.vote_count = fresh.vote_count,
                None => self.candidates.push(fresh.clone()),
            }
        }
        self.tally_block = at_block;
        true
    }

    /// Prepare this copy to overwrite `stored`: a closed flag stays set and
    /// counts read at a later block survive.
    pub fn absorb_stored(&mut self, stored: &Election) {
        self.closed |= stored.closed;
        if stored.tally_block > self.tally_block {
            self.candidates = stored.candidates.clone();
            self.tally_block = stored.tally_block;
        }
    }
}
