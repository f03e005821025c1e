use chainvote_types::{CandidateId, ElectionId, ErrorCode, TxHash};
use thiserror::Error;

/// Failures of the key custodian.
#[derive(Debug, Error)]
pub enum SignerError {
    /// No key is available (locked, missing, or not linked).
    #[error("signer unavailable: {0}")]
    Unavailable(String),

    /// The user declined to sign.
    #[error("signature rejected by user")]
    Rejected,

    #[error("keystore error: {0}")]
    Keystore(String),
}

/// Failures talking to the Store's verification API.
#[derive(Debug, Error)]
pub enum VerificationClientError {
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// A non-2xx response without a parseable error body.
    #[error("store returned HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// A structured `{code, message}` rejection.
    #[error("{code}: {message}")]
    Api { code: ErrorCode, message: String },

    #[error("invalid store response: {0}")]
    InvalidResponse(String),
}

impl VerificationClientError {
    /// Whether the same request may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unreachable(_) => true,
            Self::Server { status, .. } => *status >= 500,
            Self::Api { code, .. } => code.is_retryable(),
            Self::InvalidResponse(_) => false,
        }
    }

    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("journal entry corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Everything a vote attempt can end in, short of success.
#[derive(Debug, Error)]
pub enum VoteError {
    #[error("wallet signer unavailable: {0}")]
    SignerUnavailable(String),

    #[error("signature request rejected")]
    UserRejectedSignature,

    #[error("election {0} is not accepting votes")]
    ElectionClosed(ElectionId),

    #[error("already voted in election {0}")]
    AlreadyVoted(ElectionId),

    #[error("transaction submission failed: {0}")]
    ChainSubmissionFailed(String),

    #[error("transaction failed on chain: {0}")]
    ChainReverted(String),

    #[error("transaction {0} not confirmed yet")]
    ConfirmationTimedOut(TxHash),

    #[error("vote {tx} could not be verified: {reason}")]
    VerificationFailed { tx: TxHash, reason: String },

    /// The Store already held this vote. Never surfaced to users as a failure.
    #[error("duplicate verification ignored")]
    DuplicateIgnored,

    #[error("candidate {0} is not standing in this election")]
    InvalidCandidate(CandidateId),

    #[error("attempt can no longer be cancelled (state: {0})")]
    CancelNotAllowed(&'static str),

    #[error(transparent)]
    Journal(#[from] JournalError),
}

impl VoteError {
    /// Text suitable for showing to the voter.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::SignerUnavailable(_) => {
                "Connect your wallet with the address linked to your account to vote."
            }
            Self::UserRejectedSignature => "You cancelled the signature request. Your vote was not cast.",
            Self::ElectionClosed(_) => "This election is not accepting votes.",
            Self::AlreadyVoted(_) => "You have already voted in this election.",
            Self::ChainSubmissionFailed(_) => {
                "Your vote could not be sent to the network. Nothing was cast; please try again."
            }
            Self::ChainReverted(_) => "The network rejected your vote transaction.",
            Self::ConfirmationTimedOut(_) => {
                "Your vote was sent and is waiting for confirmation. We'll keep checking."
            }
            Self::VerificationFailed { .. } => {
                "Your vote is on the ledger but we could not record it yet. We'll keep checking."
            }
            Self::DuplicateIgnored => "Your vote is recorded.",
            Self::InvalidCandidate(_) => "That candidate is not part of this election.",
            Self::CancelNotAllowed(_) => "Your vote has already been signed and cannot be cancelled.",
            Self::Journal(_) => "Your vote could not be saved on this device. Please try again.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_outcomes_read_as_keep_checking() {
        let tx = TxHash::new([1; 32]);
        for e in [
            VoteError::ConfirmationTimedOut(tx),
            VoteError::VerificationFailed {
                tx,
                reason: "store down".into(),
            },
        ] {
            assert!(e.user_message().contains("keep checking"));
        }
    }

    #[test]
    fn client_error_retryability() {
        assert!(VerificationClientError::Unreachable("refused".into()).is_retryable());
        assert!(VerificationClientError::Server {
            status: 503,
            message: String::new()
        }
        .is_retryable());
        assert!(VerificationClientError::Api {
            code: ErrorCode::NotConfirmed,
            message: String::new()
        }
        .is_retryable());
        assert!(!VerificationClientError::Api {
            code: ErrorCode::ReceiptMismatch,
            message: String::new()
        }
        .is_retryable());
    }
}
