//! Revert reasons raised by the voting contract.

use std::fmt;

pub const REVERT_ALREADY_VOTED: &str = "already voted";
pub const REVERT_ELECTION_CLOSED: &str = "election closed";
pub const REVERT_INVALID_CANDIDATE: &str = "invalid candidate";
pub const REVERT_UNKNOWN_ELECTION: &str = "unknown election";

/// A revert reason classified by what the pipeline must do about it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RevertReason {
    /// The contract's double-vote guard fired. Never retry.
    AlreadyVoted,
    ElectionClosed,
    InvalidCandidate,
    UnknownElection,
    Other(String),
}

impl RevertReason {
    /// Classify a raw revert string. Matching is case-insensitive and
    /// tolerates prefixes such as `execution reverted: `.
    pub fn parse(raw: &str) -> Self {
        let lower = raw.to_ascii_lowercase();
        if lower.contains(REVERT_ALREADY_VOTED) {
            Self::AlreadyVoted
        } else if lower.contains(REVERT_ELECTION_CLOSED) {
            Self::ElectionClosed
        } else if lower.contains(REVERT_INVALID_CANDIDATE) {
            Self::InvalidCandidate
        } else if lower.contains(REVERT_UNKNOWN_ELECTION) {
            Self::UnknownElection
        } else {
            Self::Other(raw.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::AlreadyVoted => REVERT_ALREADY_VOTED,
            Self::ElectionClosed => REVERT_ELECTION_CLOSED,
            Self::InvalidCandidate => REVERT_INVALID_CANDIDATE,
            Self::UnknownElection => REVERT_UNKNOWN_ELECTION,
            Self::Other(s) => s,
        }
    }

    /// Whether a fresh attempt (new signature, new transaction) may succeed.
    pub fn allows_fresh_attempt(&self) -> bool {
        !matches!(self, Self::AlreadyVoted | Self::ElectionClosed)
    }
}

impl fmt::Display for RevertReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefixed_reason() {
        assert_eq!(
            RevertReason::parse("execution reverted: Already voted"),
            RevertReason::AlreadyVoted
        );
    }

    #[test]
    fn unknown_reason_kept_verbatim() {
        let r = RevertReason::parse("out of gas");
        assert_eq!(r, RevertReason::Other("out of gas".into()));
        assert!(r.allows_fresh_attempt());
    }

    #[test]
    fn already_voted_blocks_retry() {
        assert!(!RevertReason::AlreadyVoted.allows_fresh_attempt());
    }
}
