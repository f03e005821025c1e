//! Password-encrypted keystore for the voter's Ed25519 secret key.
//!
//! 1. Argon2id derives a 32-byte encryption key from the password and a random salt
//! 2. AES-256-GCM encrypts the secret key with a random nonce
//! 3. The result is a JSON file carrying the KDF parameters and the voter
//!    address, so the address can be shown without unlocking the key

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use chainvote_crypto::{derive_address, public_from_private};
use chainvote_types::{PrivateKey, VoterAddress};
use serde::{Deserialize, Serialize};
use std::path::Path;
use zeroize::Zeroizing;

use crate::SignerError;

pub const KEYSTORE_VERSION: u32 = 1;

const SALT_LEN: usize = 32;
/// AES-GCM nonce length (96 bits).
const NONCE_LEN: usize = 12;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeystoreFile {
    pub version: u32,
    pub address: VoterAddress,
    pub crypto: KeystoreCrypto,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KeystoreCrypto {
    pub cipher: String,
    pub kdf: String,
    pub kdf_params: KdfParams,
    /// Hex-encoded.
    pub salt: String,
    /// Hex-encoded.
    pub nonce: String,
    /// Hex-encoded.
    pub ciphertext: String,
}

/// Argon2id cost parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// KiB.
    pub memory: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// 64 MiB, 3 passes, 1 lane.
    fn default() -> Self {
        Self {
            memory: 65536,
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// Encrypt `secret` under `password` with the default KDF cost.
pub fn encrypt_keystore(secret: &PrivateKey, password: &str) -> Result<KeystoreFile, SignerError> {
    encrypt_keystore_with(secret, password, KdfParams::default())
}

pub fn encrypt_keystore_with(
    secret: &PrivateKey,
    password: &str,
    params: KdfParams,
) -> Result<KeystoreFile, SignerError> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    getrandom::getrandom(&mut salt).map_err(|e| SignerError::Keystore(e.to_string()))?;
    getrandom::getrandom(&mut nonce_bytes).map_err(|e| SignerError::Keystore(e.to_string()))?;

    let key = derive_key(password, &salt, params)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| SignerError::Keystore(format!("AES key init failed: {e}")))?;
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce_bytes), &secret.0[..])
        .map_err(|e| SignerError::Keystore(format!("encryption failed: {e}")))?;

    Ok(KeystoreFile {
        version: KEYSTORE_VERSION,
        address: derive_address(&public_from_private(secret)),
        crypto: KeystoreCrypto {
            cipher: "aes-256-gcm".to_string(),
            kdf: "argon2id".to_string(),
            kdf_params: params,
            salt: hex::encode(salt),
            nonce: hex::encode(nonce_bytes),
            ciphertext: hex::encode(ciphertext),
        },
    })
}

/// Decrypt a keystore, checking the key against the recorded address.
pub fn decrypt_keystore(keystore: &KeystoreFile, password: &str) -> Result<PrivateKey, SignerError> {
    if keystore.version != KEYSTORE_VERSION {
        return Err(SignerError::Keystore(format!(
            "unsupported keystore version: {}",
            keystore.version
        )));
    }

    let decode = |field: &str, value: &str| {
        hex::decode(value).map_err(|e| SignerError::Keystore(format!("invalid {field} hex: {e}")))
    };
    let salt = decode("salt", &keystore.crypto.salt)?;
    let nonce_bytes = decode("nonce", &keystore.crypto.nonce)?;
    let ciphertext = decode("ciphertext", &keystore.crypto.ciphertext)?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(SignerError::Keystore(format!(
            "invalid nonce length: expected {NONCE_LEN}, got {}",
            nonce_bytes.len()
        )));
    }

    let key = derive_key(password, &salt, keystore.crypto.kdf_params)?;
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|e| SignerError::Keystore(format!("AES key init failed: {e}")))?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| {
                SignerError::Keystore("decryption failed: wrong password or corrupted data".into())
            })?,
    );

    let bytes: [u8; 32] = plaintext.as_slice().try_into().map_err(|_| {
        SignerError::Keystore(format!(
            "decrypted key has wrong length: expected 32, got {}",
            plaintext.len()
        ))
    })?;
    let secret = PrivateKey(bytes);
    if derive_address(&public_from_private(&secret)) != keystore.address {
        return Err(SignerError::Keystore(
            "decrypted key does not match keystore address".into(),
        ));
    }
    Ok(secret)
}

pub fn save_keystore(keystore: &KeystoreFile, path: &Path) -> Result<(), SignerError> {
    let json = serde_json::to_string_pretty(keystore)
        .map_err(|e| SignerError::Keystore(format!("JSON serialization failed: {e}")))?;
    std::fs::write(path, json)
        .map_err(|e| SignerError::Keystore(format!("failed to write keystore file: {e}")))?;
    Ok(())
}

pub fn load_keystore(path: &Path) -> Result<KeystoreFile, SignerError> {
    let json = std::fs::read_to_string(path)
        .map_err(|e| SignerError::Keystore(format!("failed to read keystore file: {e}")))?;
    serde_json::from_str(&json)
        .map_err(|e| SignerError::Keystore(format!("invalid keystore JSON: {e}")))
}

fn derive_key(
    password: &str,
    salt: &[u8],
    params: KdfParams,
) -> Result<Zeroizing<[u8; 32]>, SignerError> {
    let params = Params::new(params.memory, params.iterations, params.parallelism, Some(32))
        .map_err(|e| SignerError::Keystore(format!("Argon2 params error: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut output = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut output[..])
        .map_err(|e| SignerError::Keystore(format!("Argon2 hashing failed: {e}")))?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cheap parameters so tests stay fast.
    fn light() -> KdfParams {
        KdfParams {
            memory: 256,
            iterations: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn roundtrip_recovers_key() {
        let secret = PrivateKey([7u8; 32]);
        let ks = encrypt_keystore_with(&secret, "correct horse", light()).unwrap();
        let back = decrypt_keystore(&ks, "correct horse").unwrap();
        assert_eq!(back.0, secret.0);
        assert_eq!(ks.address, derive_address(&public_from_private(&secret)));
    }

    #[test]
    fn wrong_password_fails() {
        let ks = encrypt_keystore_with(&PrivateKey([7u8; 32]), "right", light()).unwrap();
        assert!(matches!(
            decrypt_keystore(&ks, "wrong"),
            Err(SignerError::Keystore(_))
        ));
    }

    #[test]
    fn tampered_address_detected() {
        let mut ks = encrypt_keystore_with(&PrivateKey([7u8; 32]), "pw", light()).unwrap();
        ks.address = VoterAddress::from_bytes([0; 20]);
        assert!(decrypt_keystore(&ks, "pw").is_err());
    }

    #[test]
    fn save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voter.json");
        let ks = encrypt_keystore_with(&PrivateKey([9u8; 32]), "pw", light()).unwrap();
        save_keystore(&ks, &path).unwrap();
        let loaded = load_keystore(&path).unwrap();
        assert_eq!(loaded.address, ks.address);
        assert_eq!(loaded.crypto.kdf_params, light());
        assert_eq!(decrypt_keystore(&loaded, "pw").unwrap().0, [9u8; 32]);
    }
}
