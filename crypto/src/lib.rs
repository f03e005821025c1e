//! Cryptographic primitives for chainvote.
//!
//! - **Ed25519** for signing vote transactions and verifying them ledger-side
//! - **Blake2b** for transaction hashes and address derivation
//! - Voter address derivation (`0x` + last 20 bytes of the key hash)

pub mod address;
pub mod hash;
pub mod keys;
pub mod sign;

pub use address::derive_address;
pub use hash::{blake2b_256, blake2b_256_multi};
pub use keys::{generate_keypair, keypair_from_seed, public_from_private, random_u64, CryptoError};
pub use sign::{sign_message, verify_signature};
