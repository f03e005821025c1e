//! Ledger transaction receipts and decoded event logs.

use serde::{Deserialize, Serialize};

use crate::{CandidateId, ElectionId, TxHash, VoterAddress};

/// An event emitted by the voting contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum LedgerEvent {
    #[serde(rename_all = "camelCase")]
    Voted {
        election_id: ElectionId,
        candidate_id: CandidateId,
        voter: VoterAddress,
    },
    #[serde(rename_all = "camelCase")]
    ElectionClosed { election_id: ElectionId },
}

/// Execution result of a mined transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum TxOutcome {
    Success,
    Reverted { reason: String },
}

/// Proof of an on-chain state change, produced by the ledger once a
/// transaction is mined.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub from: VoterAddress,
    pub outcome: TxOutcome,
    #[serde(default)]
    pub logs: Vec<LedgerEvent>,
}

impl TransactionReceipt {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, TxOutcome::Success)
    }

    pub fn revert_reason(&self) -> Option<&str> {
        match &self.outcome {
            TxOutcome::Reverted { reason } => Some(reason),
            TxOutcome::Success => None,
        }
    }

    /// The `Voted` event cast by `voter`, if this receipt carries one.
    pub fn vote_by(&self, voter: &VoterAddress) -> Option<(ElectionId, CandidateId)> {
        self.logs.iter().find_map(|log| match log {
            LedgerEvent::Voted {
                election_id,
                candidate_id,
                voter: v,
            } if v == voter => Some((*election_id, *candidate_id)),
            _ => None,
        })
    }

    /// Number of blocks on top of (and including) this receipt's block at `head`.
    pub fn confirmations(&self, head: u64) -> u64 {
        if head < self.block_number {
            0
        } else {
            head - self.block_number + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(b: u8) -> VoterAddress {
        VoterAddress::from_bytes([b; 20])
    }

    fn receipt(logs: Vec<LedgerEvent>) -> TransactionReceipt {
        TransactionReceipt {
            transaction_hash: TxHash::new([7; 32]),
            block_number: 10,
            from: addr(1),
            outcome: TxOutcome::Success,
            logs,
        }
    }

    #[test]
    fn vote_by_matches_voter_only() {
        let r = receipt(vec![LedgerEvent::Voted {
            election_id: ElectionId(3),
            candidate_id: CandidateId(2),
            voter: addr(1),
        }]);
        assert_eq!(r.vote_by(&addr(1)), Some((ElectionId(3), CandidateId(2))));
        assert_eq!(r.vote_by(&addr(2)), None);
    }

    #[test]
    fn confirmations_count_inclusive_block() {
        let r = receipt(vec![]);
        assert_eq!(r.confirmations(9), 0);
        assert_eq!(r.confirmations(10), 1);
        assert_eq!(r.confirmations(12), 3);
    }

    #[test]
    fn receipt_json_shape() {
        let r = TransactionReceipt {
            outcome: TxOutcome::Reverted {
                reason: "already voted".into(),
            },
            ..receipt(vec![])
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["outcome"]["status"], "reverted");
        assert_eq!(json["outcome"]["reason"], "already voted");
        assert_eq!(json["blockNumber"], 10);
    }
}
