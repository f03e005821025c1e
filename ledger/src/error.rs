use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// The RPC endpoint could not be reached or timed out.
    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    /// The endpoint answered with a JSON-RPC error object.
    #[error("ledger RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The transaction was refused before it could be mined (bad signature,
    /// duplicate hash, malformed payload).
    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),

    #[error("transaction encoding failed: {0}")]
    Encoding(String),
}

impl LedgerError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }

    /// Whether a failed submission certainly never reached the mempool.
    ///
    /// Any other submit error leaves the transaction's fate unknown.
    pub fn is_definite_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_) | Self::Encoding(_))
    }
}

impl From<bincode::Error> for LedgerError {
    fn from(e: bincode::Error) -> Self {
        LedgerError::Encoding(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_refusals_are_definite() {
        assert!(LedgerError::Rejected("bad signature".into()).is_definite_rejection());
        assert!(LedgerError::Encoding("truncated".into()).is_definite_rejection());
        assert!(!LedgerError::Unreachable("reset".into()).is_definite_rejection());
        assert!(!LedgerError::InvalidResponse("wrong hash".into()).is_definite_rejection());
        let rpc = LedgerError::Rpc {
            code: -32000,
            message: "busy".into(),
        };
        assert!(!rpc.is_definite_rejection());
        assert!(!rpc.is_transient());
    }
}
