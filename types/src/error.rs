//! Parse errors and the Store API error taxonomy.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing wire representations of core types.
#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid transaction hash: {0}")]
    InvalidHash(String),

    #[error("invalid voter address: {0}")]
    InvalidAddress(String),
}

/// Machine-readable error code returned by the Store API.
///
/// Clients branch on this value, never on the human-readable message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    BadRequest,
    NotFound,
    /// The caller has no linked wallet address to match receipts against.
    WalletNotLinked,
    /// The transaction is unknown, pending, or not yet past finality.
    NotConfirmed,
    /// The transaction was mined but reverted.
    TransactionReverted,
    /// The receipt does not carry a vote matching the caller and the claim.
    ReceiptMismatch,
    ElectionClosed,
    /// The account has recorded votes, so its wallet link is frozen.
    WalletLocked,
    /// The address is already linked to another account.
    WalletInUse,
    /// The Store could not reach the ledger to re-validate.
    LedgerUnavailable,
    Internal,
}

impl ErrorCode {
    /// Whether the same request may succeed later without any change.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotConfirmed | Self::LedgerUnavailable | Self::Internal
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::BadRequest => "bad_request",
            Self::NotFound => "not_found",
            Self::WalletNotLinked => "wallet_not_linked",
            Self::NotConfirmed => "not_confirmed",
            Self::TransactionReverted => "transaction_reverted",
            Self::ReceiptMismatch => "receipt_mismatch",
            Self::ElectionClosed => "election_closed",
            Self::WalletLocked => "wallet_locked",
            Self::WalletInUse => "wallet_in_use",
            Self::LedgerUnavailable => "ledger_unavailable",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_match_display() {
        for code in [
            ErrorCode::NotConfirmed,
            ErrorCode::ReceiptMismatch,
            ErrorCode::LedgerUnavailable,
            ErrorCode::WalletInUse,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            assert_eq!(json, format!("\"{}\"", code.as_str()));
        }
    }

    #[test]
    fn only_transient_codes_retry() {
        assert!(ErrorCode::NotConfirmed.is_retryable());
        assert!(ErrorCode::LedgerUnavailable.is_retryable());
        assert!(!ErrorCode::ReceiptMismatch.is_retryable());
        assert!(!ErrorCode::WalletNotLinked.is_retryable());
        assert!(!ErrorCode::WalletLocked.is_retryable());
    }
}
