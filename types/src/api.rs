//! Request and response bodies of the Store HTTP API.

use serde::{Deserialize, Serialize};

use crate::{Candidate, Election, ElectionId, ErrorCode, VerifyStatus, VoteRecord};

/// `POST /verify/vote` success body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: VerifyStatus,
}

/// Body of every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

/// `GET /vote/status/{electionId}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStatusView {
    pub election_id: ElectionId,
    pub has_voted: bool,
    pub record: Option<VoteRecord>,
}

/// One election's cached results, as served by `GET /elections/results`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElectionResults {
    pub election_id: ElectionId,
    pub title: String,
    pub closed: bool,
    pub total_votes: u64,
    pub candidates: Vec<Candidate>,
}

impl From<&Election> for ElectionResults {
    fn from(e: &Election) -> Self {
        Self {
            election_id: e.id,
            title: e.title.clone(),
            closed: e.closed,
            total_votes: e.total_votes(),
            candidates: e.candidates.clone(),
        }
    }
}
