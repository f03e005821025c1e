//! Voter address type.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::TypesError;

/// The on-chain identity of a voter: `0x` followed by 40 lowercase hex characters.
///
/// Derived from the signer's public key by `chainvote_crypto::derive_address`.
/// Parsing normalizes case so two spellings of the same address compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoterAddress(String);

impl VoterAddress {
    pub const PREFIX: &'static str = "0x";
    /// Number of address bytes.
    pub const LEN: usize = 20;

    /// Build an address from its 20 raw bytes.
    pub fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(format!("{}{}", Self::PREFIX, hex::encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VoterAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for VoterAddress {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s
            .strip_prefix(Self::PREFIX)
            .ok_or_else(|| TypesError::InvalidAddress(format!("missing 0x prefix: {s}")))?;
        if digits.len() != Self::LEN * 2 {
            return Err(TypesError::InvalidAddress(format!(
                "expected {} hex characters, got {}",
                Self::LEN * 2,
                digits.len()
            )));
        }
        let mut bytes = [0u8; Self::LEN];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| TypesError::InvalidAddress(e.to_string()))?;
        Ok(Self::from_bytes(bytes))
    }
}

impl Serialize for VoterAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for VoterAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_normalizes_case() {
        let upper: VoterAddress = "0xABCDEF0123456789ABCDEF0123456789ABCDEF01".parse().unwrap();
        let lower: VoterAddress = "0xabcdef0123456789abcdef0123456789abcdef01".parse().unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!("abcdef0123456789abcdef0123456789abcdef01"
            .parse::<VoterAddress>()
            .is_err());
    }

    #[test]
    fn rejects_short_address() {
        assert!("0xabcd".parse::<VoterAddress>().is_err());
    }
}
