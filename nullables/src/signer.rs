//! Nullable wallet signer: scripted approval for testing.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chainvote_crypto::{derive_address, keypair_from_seed, sign_message};
use chainvote_ledger::UnsignedVoteTx;
use chainvote_types::{KeyPair, Signature, VoterAddress};
use chainvote_wallet::{SignerError, SignerIdentity, WalletSigner};
use tokio::sync::Notify;

/// How the signer answers the next signature requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignerBehavior {
    Approve,
    Reject,
    Unavailable,
    /// Wait until [`NullSigner::approve`] is called.
    WaitForApproval,
}

/// A deterministic signer for testing. Counts requests and signatures.
pub struct NullSigner {
    keypair: KeyPair,
    address: VoterAddress,
    behavior: Mutex<SignerBehavior>,
    gate: Notify,
    requests: AtomicU32,
    signatures: AtomicU32,
}

impl NullSigner {
    pub fn new(seed: u8) -> Self {
        let keypair = keypair_from_seed(&[seed; 32]);
        let address = derive_address(&keypair.public);
        Self {
            keypair,
            address,
            behavior: Mutex::new(SignerBehavior::Approve),
            gate: Notify::new(),
            requests: AtomicU32::new(0),
            signatures: AtomicU32::new(0),
        }
    }

    pub fn with_behavior(self, behavior: SignerBehavior) -> Self {
        self.set_behavior(behavior);
        self
    }

    pub fn set_behavior(&self, behavior: SignerBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    /// Release one request waiting for approval.
    pub fn approve(&self) {
        self.gate.notify_one();
    }

    pub fn address(&self) -> &VoterAddress {
        &self.address
    }

    /// Signature requests received so far.
    pub fn requests(&self) -> u32 {
        self.requests.load(Ordering::SeqCst)
    }

    /// Signatures actually produced so far.
    pub fn signatures(&self) -> u32 {
        self.signatures.load(Ordering::SeqCst)
    }

    fn sign(&self, tx: &UnsignedVoteTx) -> Result<Signature, SignerError> {
        let bytes = tx
            .signing_bytes()
            .map_err(|e| SignerError::Unavailable(e.to_string()))?;
        self.signatures.fetch_add(1, Ordering::SeqCst);
        Ok(sign_message(&bytes, &self.keypair.private))
    }
}

#[async_trait]
impl WalletSigner for NullSigner {
    async fn identity(&self) -> Result<SignerIdentity, SignerError> {
        Ok(SignerIdentity {
            address: self.address.clone(),
            public_key: self.keypair.public.clone(),
        })
    }

    async fn sign_vote(&self, tx: &UnsignedVoteTx) -> Result<Signature, SignerError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            SignerBehavior::Approve => self.sign(tx),
            SignerBehavior::Reject => Err(SignerError::Rejected),
            SignerBehavior::Unavailable => Err(SignerError::Unavailable("wallet locked".into())),
            SignerBehavior::WaitForApproval => {
                self.gate.notified().await;
                self.sign(tx)
            }
        }
    }
}
