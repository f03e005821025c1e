//! JSON-RPC 2.0 transport to a ledger node.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chainvote_types::{
    Candidate, CandidateId, ElectionBasic, ElectionId, TransactionReceipt, TxHash, VoterAddress,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{Ledger, LedgerError, SignedVoteTx, TxLookup};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON-RPC error code a node uses when it refuses a transaction outright.
pub const TX_REJECTED_CODE: i64 = -32000;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// [`Ledger`] backed by a node's JSON-RPC endpoint.
pub struct HttpLedger {
    url: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl HttpLedger {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_timeout(url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            url: url.into(),
            http,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Unreachable(format!("{method} timed out: {e}"))
                } else if e.is_connect() {
                    LedgerError::Unreachable(format!("connection failed: {e}"))
                } else {
                    LedgerError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() {
            return Err(LedgerError::Unreachable(format!("node returned HTTP {status}")));
        }
        if !status.is_success() {
            return Err(LedgerError::InvalidResponse(format!("node returned HTTP {status}")));
        }

        let rpc: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("invalid JSON-RPC body: {e}")))?;

        if let Some(err) = rpc.error {
            return Err(if err.code == TX_REJECTED_CODE {
                LedgerError::Rejected(err.message)
            } else {
                LedgerError::Rpc {
                    code: err.code,
                    message: err.message,
                }
            });
        }

        serde_json::from_value(rpc.result.unwrap_or(Value::Null))
            .map_err(|e| LedgerError::InvalidResponse(format!("{method}: {e}")))
    }
}

#[async_trait]
impl Ledger for HttpLedger {
    async fn send_transaction(&self, tx: &SignedVoteTx) -> Result<TxHash, LedgerError> {
        self.call("vote_sendTransaction", json!([tx])).await
    }

    async fn transaction_status(&self, hash: &TxHash) -> Result<TxLookup, LedgerError> {
        let receipt: Option<TransactionReceipt> = self
            .call("vote_getTransactionReceipt", json!([hash]))
            .await?;
        if let Some(receipt) = receipt {
            return Ok(TxLookup::Mined(receipt));
        }
        let pending: Option<SignedVoteTx> = self.call("vote_getTransaction", json!([hash])).await?;
        Ok(match pending {
            Some(_) => TxLookup::Pending,
            None => TxLookup::Unknown,
        })
    }

    async fn block_number(&self) -> Result<u64, LedgerError> {
        self.call("vote_blockNumber", json!([])).await
    }

    async fn election_basic(
        &self,
        election: ElectionId,
        at_block: Option<u64>,
    ) -> Result<Option<ElectionBasic>, LedgerError> {
        self.call("vote_getElectionBasic", json!([election, at_block]))
            .await
    }

    async fn candidate(
        &self,
        election: ElectionId,
        candidate: CandidateId,
        at_block: Option<u64>,
    ) -> Result<Option<Candidate>, LedgerError> {
        self.call("vote_getCandidate", json!([election, candidate, at_block]))
            .await
    }

    async fn has_voted(
        &self,
        election: ElectionId,
        voter: &VoterAddress,
    ) -> Result<bool, LedgerError> {
        self.call("vote_hasVoted", json!([election, voter])).await
    }
}
