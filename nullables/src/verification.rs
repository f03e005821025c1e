//! Nullable verification API: the Store verifier called in-process.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chainvote_types::{UserId, VerifyStatus, VoteClaim};
use chainvote_verification::VoteVerifier;
use chainvote_wallet::{VerificationApi, VerificationClientError};

/// Routes claims straight into a [`VoteVerifier`] on behalf of one user,
/// skipping HTTP. Can fail the next calls as if the Store were unreachable.
pub struct NullVerificationApi {
    verifier: Arc<VoteVerifier>,
    user: UserId,
    fail_next: AtomicU32,
    calls: AtomicU32,
}

impl NullVerificationApi {
    pub fn new(verifier: Arc<VoteVerifier>, user: UserId) -> Self {
        Self {
            verifier,
            user,
            fail_next: AtomicU32::new(0),
            calls: AtomicU32::new(0),
        }
    }

    /// The next `n` calls fail as unreachable without reaching the verifier.
    pub fn fail_next(&self, n: u32) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VerificationApi for NullVerificationApi {
    async fn verify_vote(&self, claim: &VoteClaim) -> Result<VerifyStatus, VerificationClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(VerificationClientError::Unreachable(
                "injected store outage".into(),
            ));
        }
        self.verifier
            .verify_vote(&self.user, claim)
            .await
            .map_err(|e| VerificationClientError::Api {
                code: e.code(),
                message: e.to_string(),
            })
    }
}
