//! Vote intents, claims and durable vote records.

use serde::{Deserialize, Serialize};

use crate::{CandidateId, ElectionId, Timestamp, TxHash, UserId, VoterAddress};

/// A user's choice, held only by the client while an attempt is in flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteIntent {
    pub user_id: UserId,
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
}

/// What a client asks the Store to verify: `POST /verify/vote`.
///
/// Every field is a hint; the Store re-derives the facts from the receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteClaim {
    pub transaction_hash: TxHash,
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
}

/// The durable proof that a user voted. Unique on `(user_id, election_id)`
/// and immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRecord {
    pub user_id: UserId,
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
    pub transaction_hash: TxHash,
    pub voter: VoterAddress,
    pub block_number: u64,
    pub recorded_at: Timestamp,
}

/// Successful outcome of a verification request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyStatus {
    /// This request created the vote record.
    Recorded,
    /// A record for this user and election already existed.
    Duplicate,
}

impl VerifyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Recorded => "recorded",
            Self::Duplicate => "duplicate",
        }
    }
}
