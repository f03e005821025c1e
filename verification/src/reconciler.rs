//! Background re-verification of parked claims.

use std::sync::Arc;

use chainvote_store::PendingClaimStore;
use chainvote_types::VerifyStatus;
use tracing::{info, warn};

use crate::{VerifyError, VoteVerifier};

/// Verification passes a claim gets before it is dropped.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Outcome counts of one reconciliation pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub recorded: u32,
    pub duplicate: u32,
    pub still_pending: u32,
    pub failed: u32,
}

/// Re-drives parked claims until they are recorded, turn out duplicate, or
/// fail permanently.
pub struct Reconciler {
    verifier: Arc<VoteVerifier>,
    max_attempts: u32,
}

impl Reconciler {
    pub fn new(verifier: Arc<VoteVerifier>) -> Self {
        Self {
            verifier,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// One pass over every parked claim.
    pub async fn run_once(&self) -> Result<ReconcileReport, VerifyError> {
        let store = self.verifier.store();
        let mut report = ReconcileReport::default();

        for mut pending in store.pending_claims()? {
            let hash = pending.claim.transaction_hash;
            match self
                .verifier
                .check_claim(&pending.user_id, &pending.claim)
                .await
            {
                Ok(status) => {
                    store.remove_claim(&hash)?;
                    match status {
                        VerifyStatus::Recorded => report.recorded += 1,
                        VerifyStatus::Duplicate => report.duplicate += 1,
                    }
                }
                Err(e) if e.is_retryable() && pending.attempts + 1 < self.max_attempts => {
                    pending.attempts += 1;
                    pending.last_error = e.to_string();
                    store.park_claim(&pending)?;
                    report.still_pending += 1;
                }
                Err(e) => {
                    warn!(user = %pending.user_id, tx = %hash.short(), error = %e, "dropping parked claim");
                    store.remove_claim(&hash)?;
                    report.failed += 1;
                }
            }
        }

        if report != ReconcileReport::default() {
            info!(?report, "reconciliation pass finished");
        }
        Ok(report)
    }
}
