//! The signed-in user as the vote pipeline sees it.

use std::collections::HashSet;

use chainvote_types::{ElectionId, UserId, UserProfile, VoterAddress};

/// An authenticated Store session and what it already knows about the
/// user's votes. Passed explicitly into every orchestrator call.
#[derive(Clone, Debug)]
pub struct Session {
    pub user: UserProfile,
    pub token: String,
    voted: HashSet<ElectionId>,
}

impl Session {
    pub fn new(user: UserProfile, token: impl Into<String>) -> Self {
        Self {
            user,
            token: token.into(),
            voted: HashSet::new(),
        }
    }

    /// Seed the elections the Store reports as voted.
    pub fn with_voted(mut self, elections: impl IntoIterator<Item = ElectionId>) -> Self {
        self.voted.extend(elections);
        self
    }

    pub fn user_id(&self) -> &UserId {
        &self.user.id
    }

    pub fn wallet(&self) -> Option<&VoterAddress> {
        self.user.wallet.as_ref()
    }

    pub fn has_voted(&self, election: ElectionId) -> bool {
        self.voted.contains(&election)
    }

    pub fn mark_voted(&mut self, election: ElectionId) {
        self.voted.insert(election);
    }
}
