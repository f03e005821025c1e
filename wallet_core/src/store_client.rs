//! HTTP client for the Authoritative Store.

use std::time::Duration;

use async_trait::async_trait;
use chainvote_types::{
    ApiErrorBody, Election, ElectionId, ElectionResults, UserProfile, VerifyResponse,
    VerifyStatus, VoteClaim, VoteRecord, VoteStatusView, VoterAddress,
};
use serde::de::DeserializeOwned;

use crate::VerificationClientError;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The verification half of the Store API, as the orchestrator needs it.
#[async_trait]
pub trait VerificationApi: Send + Sync {
    /// Ask the Store to re-validate `claim` against the ledger and record it.
    async fn verify_vote(&self, claim: &VoteClaim) -> Result<VerifyStatus, VerificationClientError>;
}

/// Authenticated client for one Store session.
pub struct StoreClient {
    base_url: String,
    token: String,
    http: reqwest::Client,
}

impl StoreClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            http,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, VerificationClientError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VerificationClientError::Unreachable(format!("request timed out: {e}"))
                } else if e.is_connect() {
                    VerificationClientError::Unreachable(format!("connection failed: {e}"))
                } else {
                    VerificationClientError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json().await.map_err(|e| {
                VerificationClientError::InvalidResponse(format!("failed to parse body: {e}"))
            });
        }

        let text = response.text().await.unwrap_or_default();
        match serde_json::from_str::<ApiErrorBody>(&text) {
            Ok(body) => Err(VerificationClientError::Api {
                code: body.code,
                message: body.message,
            }),
            Err(_) => Err(VerificationClientError::Server {
                status: status.as_u16(),
                message: text,
            }),
        }
    }

    /// `GET /vote/status/{electionId}`
    pub async fn vote_status(
        &self,
        election: ElectionId,
    ) -> Result<VoteStatusView, VerificationClientError> {
        self.send(self.http.get(self.url(&format!("/vote/status/{election}"))))
            .await
    }

    /// `GET /elections/{id}`
    pub async fn election(&self, id: ElectionId) -> Result<Election, VerificationClientError> {
        self.send(self.http.get(self.url(&format!("/elections/{id}"))))
            .await
    }

    /// `GET /elections/active`
    pub async fn active_elections(&self) -> Result<Vec<Election>, VerificationClientError> {
        self.send(self.http.get(self.url("/elections/active"))).await
    }

    /// `GET /elections/results[?electionId=]`
    pub async fn results(
        &self,
        election: Option<ElectionId>,
    ) -> Result<Vec<ElectionResults>, VerificationClientError> {
        let mut request = self.http.get(self.url("/elections/results"));
        if let Some(id) = election {
            request = request.query(&[("electionId", id.as_u64())]);
        }
        self.send(request).await
    }

    /// `GET /vote/history`
    pub async fn vote_history(&self) -> Result<Vec<VoteRecord>, VerificationClientError> {
        self.send(self.http.get(self.url("/vote/history"))).await
    }

    /// `GET /auth/me`
    pub async fn me(&self) -> Result<UserProfile, VerificationClientError> {
        self.send(self.http.get(self.url("/auth/me"))).await
    }

    /// `POST /auth/wallet`. Refused once the account has a recorded vote.
    pub async fn link_wallet(
        &self,
        address: &VoterAddress,
    ) -> Result<UserProfile, VerificationClientError> {
        let body = serde_json::json!({ "walletAddress": address });
        self.send(self.http.post(self.url("/auth/wallet")).json(&body))
            .await
    }

    /// `DELETE /auth/wallet`
    pub async fn unlink_wallet(&self) -> Result<UserProfile, VerificationClientError> {
        self.send(self.http.delete(self.url("/auth/wallet"))).await
    }
}

#[async_trait]
impl VerificationApi for StoreClient {
    async fn verify_vote(&self, claim: &VoteClaim) -> Result<VerifyStatus, VerificationClientError> {
        let response: VerifyResponse = self
            .send(self.http.post(self.url("/verify/vote")).json(claim))
            .await?;
        Ok(response.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use chainvote_types::{CandidateId, ErrorCode, TxHash};

    async fn verify(headers: HeaderMap, Json(claim): Json<VoteClaim>) -> (StatusCode, String) {
        if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some("Bearer tok") {
            return (
                StatusCode::UNAUTHORIZED,
                r#"{"code":"unauthorized","message":"missing token"}"#.into(),
            );
        }
        if claim.candidate_id == CandidateId(9) {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                r#"{"code":"receipt_mismatch","message":"wrong candidate"}"#.into(),
            );
        }
        (StatusCode::OK, r#"{"status":"recorded"}"#.into())
    }

    async fn serve() -> String {
        let app = Router::new()
            .route("/verify/vote", post(verify))
            .route(
                "/auth/me",
                get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn claim(candidate: u64) -> VoteClaim {
        VoteClaim {
            transaction_hash: TxHash::new([1; 32]),
            election_id: ElectionId(1),
            candidate_id: CandidateId(candidate),
        }
    }

    #[tokio::test]
    async fn verify_success_parses_status() {
        let client = StoreClient::new(serve().await, "tok");
        assert_eq!(
            client.verify_vote(&claim(1)).await.unwrap(),
            VerifyStatus::Recorded
        );
    }

    #[tokio::test]
    async fn structured_rejection_is_final() {
        let client = StoreClient::new(serve().await, "tok");
        let err = client.verify_vote(&claim(9)).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::ReceiptMismatch));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn bad_token_is_unauthorized() {
        let client = StoreClient::new(serve().await, "nope");
        let err = client.verify_vote(&claim(1)).await.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::Unauthorized));
    }

    #[tokio::test]
    async fn unstructured_5xx_is_retryable() {
        let client = StoreClient::new(serve().await, "tok");
        let err = client.me().await.unwrap_err();
        assert!(matches!(err, VerificationClientError::Server { status: 502, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn unreachable_store_is_retryable() {
        let client = StoreClient::new("http://127.0.0.1:1", "tok");
        assert!(client.verify_vote(&claim(1)).await.unwrap_err().is_retryable());
    }
}
