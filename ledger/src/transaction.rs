//! Vote transactions: building, signing bytes, hashing, verification.

use chainvote_crypto::{blake2b_256_multi, derive_address, verify_signature};
use chainvote_types::{
    CandidateId, ElectionId, PublicKey, Signature, Timestamp, TxHash, VoterAddress,
};
use serde::{Deserialize, Serialize};

use crate::LedgerError;

/// Domain separator mixed into every signed vote payload.
const VOTE_TX_DOMAIN: &[u8] = b"chainvote/vote-tx/v1";

/// A `vote(electionId, candidateId)` call before signing.
///
/// The nonce is chosen by the client, so building a transaction needs no
/// ledger round trip and two attempts never share a hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedVoteTx {
    pub from: VoterAddress,
    pub public_key: PublicKey,
    pub election_id: ElectionId,
    pub candidate_id: CandidateId,
    pub nonce: u64,
    pub issued_at: Timestamp,
}

impl UnsignedVoteTx {
    /// Canonical bytes the signer signs.
    pub fn signing_bytes(&self) -> Result<Vec<u8>, LedgerError> {
        let body = bincode::serialize(self)?;
        let mut bytes = Vec::with_capacity(VOTE_TX_DOMAIN.len() + body.len());
        bytes.extend_from_slice(VOTE_TX_DOMAIN);
        bytes.extend_from_slice(&body);
        Ok(bytes)
    }
}

/// A vote transaction carrying the voter's signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedVoteTx {
    pub tx: UnsignedVoteTx,
    pub signature: Signature,
}

impl SignedVoteTx {
    /// The transaction hash, known before submission.
    pub fn hash(&self) -> Result<TxHash, LedgerError> {
        let bytes = self.tx.signing_bytes()?;
        Ok(TxHash::new(blake2b_256_multi(&[
            bytes.as_slice(),
            self.signature.as_bytes().as_slice(),
        ])))
    }

    /// Check the signature and that `from` is the address of the signing key.
    pub fn verify(&self) -> Result<(), LedgerError> {
        if derive_address(&self.tx.public_key) != self.tx.from {
            return Err(LedgerError::Rejected(format!(
                "sender {} does not match signing key",
                self.tx.from
            )));
        }
        let bytes = self.tx.signing_bytes()?;
        if !verify_signature(&bytes, &self.signature, &self.tx.public_key) {
            return Err(LedgerError::Rejected("invalid signature".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainvote_crypto::{keypair_from_seed, sign_message};

    fn signed(nonce: u64) -> SignedVoteTx {
        let kp = keypair_from_seed(&[4u8; 32]);
        let tx = UnsignedVoteTx {
            from: derive_address(&kp.public),
            public_key: kp.public.clone(),
            election_id: ElectionId(1),
            candidate_id: CandidateId(2),
            nonce,
            issued_at: Timestamp::new(1_700_000_000),
        };
        let signature = sign_message(&tx.signing_bytes().unwrap(), &kp.private);
        SignedVoteTx { tx, signature }
    }

    #[test]
    fn signed_tx_verifies() {
        signed(1).verify().unwrap();
    }

    #[test]
    fn tampered_candidate_fails_verification() {
        let mut tx = signed(1);
        tx.tx.candidate_id = CandidateId(3);
        assert!(matches!(tx.verify(), Err(LedgerError::Rejected(_))));
    }

    #[test]
    fn foreign_sender_fails_verification() {
        let mut tx = signed(1);
        tx.tx.from = VoterAddress::from_bytes([0xEE; 20]);
        assert!(tx.verify().is_err());
    }

    #[test]
    fn nonce_changes_hash() {
        assert_ne!(signed(1).hash().unwrap(), signed(2).hash().unwrap());
    }

    #[test]
    fn hash_is_stable() {
        assert_eq!(signed(9).hash().unwrap(), signed(9).hash().unwrap());
    }
}
