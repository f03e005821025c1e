//! Voter address derivation from public keys.
//!
//! Address = `0x` + hex(last 20 bytes of Blake2b-256(public_key)).

use chainvote_types::{PublicKey, VoterAddress};

use crate::hash::blake2b_256;

/// Derive the voter address that owns `public_key`.
pub fn derive_address(public_key: &PublicKey) -> VoterAddress {
    let digest = blake2b_256(public_key.as_bytes());
    let mut bytes = [0u8; VoterAddress::LEN];
    bytes.copy_from_slice(&digest[32 - VoterAddress::LEN..]);
    VoterAddress::from_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keypair_from_seed;

    #[test]
    fn address_is_stable_for_a_key() {
        let kp = keypair_from_seed(&[1u8; 32]);
        assert_eq!(derive_address(&kp.public), derive_address(&kp.public));
    }

    #[test]
    fn different_keys_different_addresses() {
        let a = keypair_from_seed(&[1u8; 32]);
        let b = keypair_from_seed(&[2u8; 32]);
        assert_ne!(derive_address(&a.public), derive_address(&b.public));
    }

    #[test]
    fn address_has_wire_shape() {
        let kp = keypair_from_seed(&[9u8; 32]);
        let addr = derive_address(&kp.public);
        assert!(addr.as_str().starts_with("0x"));
        assert_eq!(addr.as_str().len(), 42);
        assert_eq!(addr.as_str().parse::<VoterAddress>().unwrap(), addr);
    }
}
