use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("ledger error: {0}")]
    Ledger(#[from] chainvote_ledger::LedgerError),

    #[error("store error: {0}")]
    Store(#[from] chainvote_store::StoreError),

    #[error("LMDB error: {0}")]
    Lmdb(#[from] chainvote_store_lmdb::LmdbError),

    #[error("verification error: {0}")]
    Verify(#[from] chainvote_verification::VerifyError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("node already started")]
    AlreadyStarted,

    #[error("{0}")]
    Other(String),
}
