//! Ed25519 key generation.

use chainvote_types::{KeyPair, PrivateKey, PublicKey};
use ed25519_dalek::SigningKey;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("system randomness unavailable: {0}")]
    Randomness(String),
}

/// Generate a new Ed25519 key pair from the operating system's random source.
pub fn generate_keypair() -> Result<KeyPair, CryptoError> {
    let mut seed = [0u8; 32];
    getrandom::getrandom(&mut seed).map_err(|e| CryptoError::Randomness(e.to_string()))?;
    Ok(keypair_from_seed(&seed))
}

/// Derive the public key from a private key.
pub fn public_from_private(private: &PrivateKey) -> PublicKey {
    let signing_key = SigningKey::from_bytes(&private.0);
    PublicKey(signing_key.verifying_key().to_bytes())
}

/// Derive a key pair from a 32-byte seed (deterministic).
pub fn keypair_from_seed(seed: &[u8; 32]) -> KeyPair {
    let signing_key = SigningKey::from_bytes(seed);
    let verifying_key = signing_key.verifying_key();
    KeyPair {
        public: PublicKey(verifying_key.to_bytes()),
        private: PrivateKey(signing_key.to_bytes()),
    }
}

/// A random 64-bit value, used as the client-chosen transaction nonce.
pub fn random_u64() -> Result<u64, CryptoError> {
    let mut bytes = [0u8; 8];
    getrandom::getrandom(&mut bytes).map_err(|e| CryptoError::Randomness(e.to_string()))?;
    Ok(u64::from_le_bytes(bytes))
}
