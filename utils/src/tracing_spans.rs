//! Pre-built [`tracing::Span`] constructors for common pipeline operations.
//!
//! Consistent span names and field sets make it easy to filter and
//! correlate one vote across the wallet, the Store API and the reconciler.

use std::fmt::Display;

use tracing::{info_span, Span};

/// Span covering one vote attempt, from signature to Store record.
pub fn vote_attempt_span(user: &impl Display, election: &impl Display) -> Span {
    info_span!("vote_attempt", user = %user, election = %election)
}

/// Span covering a single HTTP request handled by the Store API.
pub fn api_request_span(method: &impl Display, path: &str) -> Span {
    info_span!("api_request", method = %method, path = %path)
}

/// Span covering the verification of one claim on the Store.
pub fn verify_span(user: &impl Display, tx: &str) -> Span {
    info_span!("verify_vote", user = %user, tx = %tx)
}

/// Span covering one reconciliation pass over parked claims.
pub fn reconcile_span() -> Span {
    info_span!("reconcile")
}
