//! The wallet signer seam and a local key-backed implementation.

use std::path::Path;

use async_trait::async_trait;
use chainvote_crypto::{derive_address, generate_keypair, keypair_from_seed, public_from_private, sign_message};
use chainvote_ledger::UnsignedVoteTx;
use chainvote_types::{KeyPair, PublicKey, Signature, VoterAddress};
use tracing::debug;

use crate::keystore::{decrypt_keystore, encrypt_keystore, load_keystore, KeystoreFile};
use crate::SignerError;

/// The account a signer signs for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignerIdentity {
    pub address: VoterAddress,
    pub public_key: PublicKey,
}

/// A user-controlled key custodian.
///
/// `sign_vote` may wait indefinitely for user approval; callers bound it.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    async fn identity(&self) -> Result<SignerIdentity, SignerError>;

    async fn sign_vote(&self, tx: &UnsignedVoteTx) -> Result<Signature, SignerError>;
}

/// Signs with a key held in memory. Approves every request for its own
/// address and refuses transactions sent from any other.
pub struct LocalSigner {
    keypair: KeyPair,
    address: VoterAddress,
}

impl LocalSigner {
    pub fn new(keypair: KeyPair) -> Self {
        let address = derive_address(&keypair.public);
        Self { keypair, address }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self::new(keypair_from_seed(seed))
    }

    pub fn generate() -> Result<Self, SignerError> {
        generate_keypair()
            .map(Self::new)
            .map_err(|e| SignerError::Unavailable(e.to_string()))
    }

    /// Unlock a keystore file.
    pub fn from_keystore(path: &Path, password: &str) -> Result<Self, SignerError> {
        let keystore = load_keystore(path)?;
        let private = decrypt_keystore(&keystore, password)?;
        let public = public_from_private(&private);
        Ok(Self::new(KeyPair { public, private }))
    }

    pub fn address(&self) -> &VoterAddress {
        &self.address
    }

    /// Encrypt this signer's key into a keystore file.
    pub fn export_keystore(&self, password: &str) -> Result<KeystoreFile, SignerError> {
        encrypt_keystore(&self.keypair.private, password)
    }
}

#[async_trait]
impl WalletSigner for LocalSigner {
    async fn identity(&self) -> Result<SignerIdentity, SignerError> {
        Ok(SignerIdentity {
            address: self.address.clone(),
            public_key: self.keypair.public.clone(),
        })
    }

    async fn sign_vote(&self, tx: &UnsignedVoteTx) -> Result<Signature, SignerError> {
        if tx.from != self.address || tx.public_key != self.keypair.public {
            return Err(SignerError::Unavailable(format!(
                "no key for sender {}",
                tx.from
            )));
        }
        let bytes = tx
            .signing_bytes()
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;
        debug!(election = %tx.election_id, "signing vote");
        Ok(sign_message(&bytes, &self.keypair.private))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainvote_ledger::SignedVoteTx;
    use chainvote_types::{CandidateId, ElectionId, Timestamp};

    fn unsigned(signer: &LocalSigner, from: VoterAddress) -> UnsignedVoteTx {
        UnsignedVoteTx {
            from,
            public_key: signer.keypair.public.clone(),
            election_id: ElectionId(1),
            candidate_id: CandidateId(1),
            nonce: 5,
            issued_at: Timestamp::new(100),
        }
    }

    #[tokio::test]
    async fn signature_verifies() {
        let signer = LocalSigner::from_seed(&[1; 32]);
        let tx = unsigned(&signer, signer.address().clone());
        let signature = signer.sign_vote(&tx).await.unwrap();
        SignedVoteTx { tx, signature }.verify().unwrap();
    }

    #[tokio::test]
    async fn refuses_foreign_sender() {
        let signer = LocalSigner::from_seed(&[1; 32]);
        let tx = unsigned(&signer, VoterAddress::from_bytes([3; 20]));
        assert!(matches!(
            signer.sign_vote(&tx).await,
            Err(SignerError::Unavailable(_))
        ));
    }
}
