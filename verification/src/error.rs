use chainvote_ledger::LedgerError;
use chainvote_store::StoreError;
use chainvote_types::{ElectionId, ErrorCode, TxHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("unknown user")]
    UnknownUser,

    #[error("no wallet address is linked to this account")]
    WalletNotLinked,

    #[error("transaction {0} is not confirmed yet")]
    NotConfirmed(TxHash),

    #[error("transaction reverted: {0}")]
    TransactionReverted(String),

    #[error("receipt does not match the claim: {0}")]
    ReceiptMismatch(String),

    #[error("election {0} not found")]
    UnknownElection(ElectionId),

    #[error("election {0} is still open on the ledger")]
    StillOpenOnLedger(ElectionId),

    #[error("ledger unavailable: {0}")]
    Ledger(#[from] LedgerError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl VerifyError {
    /// The wire code reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownUser => ErrorCode::Unauthorized,
            Self::WalletNotLinked => ErrorCode::WalletNotLinked,
            Self::NotConfirmed(_) => ErrorCode::NotConfirmed,
            Self::TransactionReverted(_) => ErrorCode::TransactionReverted,
            Self::ReceiptMismatch(_) => ErrorCode::ReceiptMismatch,
            Self::UnknownElection(_) => ErrorCode::NotFound,
            Self::StillOpenOnLedger(_) => ErrorCode::BadRequest,
            Self::Ledger(_) => ErrorCode::LedgerUnavailable,
            Self::Store(_) => ErrorCode::Internal,
        }
    }

    /// Whether a later pass over the same claim may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotConfirmed(_))
            || matches!(self, Self::Ledger(e) if e.is_transient())
    }
}
