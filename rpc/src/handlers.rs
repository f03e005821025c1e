//! Request handlers for the Store API.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chainvote_store::{ElectionStore, UserStore, VoteRecordStore, WalletChange};
use chainvote_types::{
    Election, ElectionId, ElectionResults, UserProfile, VerifyResponse, VerifyStatus, VoteClaim,
    VoteRecord, VoteStatusView, VoterAddress,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AdminUser, ApiError, ApiState, AuthUser};

// ── Verification ─────────────────────────────────────────────────────────

/// `POST /verify/vote`
pub async fn verify_vote(
    State(state): State<Arc<ApiState>>,
    AuthUser(user): AuthUser,
    body: Result<Json<VoteClaim>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let metrics = &state.metrics;
    metrics.verify_requests.inc();
    let Json(claim) = body.map_err(|e| {
        metrics.verify_rejected.with_label_values(&["bad_request"]).inc();
        ApiError::BadRequest(e.body_text())
    })?;

    let started = Instant::now();
    let result = state.verifier.verify_vote(&user.id, &claim).await;
    metrics
        .verify_latency_ms
        .observe(started.elapsed().as_secs_f64() * 1000.0);

    match result {
        Ok(status) => {
            match status {
                VerifyStatus::Recorded => metrics.votes_recorded.inc(),
                VerifyStatus::Duplicate => metrics.votes_duplicate.inc(),
            }
            Ok(Json(VerifyResponse { status }))
        }
        Err(e) => {
            metrics
                .verify_rejected
                .with_label_values(&[e.code().as_str()])
                .inc();
            info!(user = %user.id, tx = %claim.transaction_hash.short(), error = %e, "verification refused");
            Err(e.into())
        }
    }
}

// ── Elections ────────────────────────────────────────────────────────────

/// `GET /elections/active`: elections accepting votes right now.
pub async fn active_elections(
    State(state): State<Arc<ApiState>>,
    _user: AuthUser,
) -> Result<Json<Vec<Election>>, ApiError> {
    let now = state.clock.now();
    let active = state
        .store()
        .list_elections()?
        .into_iter()
        .filter(|e| e.accepts_votes_at(now))
        .collect();
    Ok(Json(active))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsQuery {
    pub election_id: Option<u64>,
}

/// `GET /elections/results[?electionId=]`
pub async fn results(
    State(state): State<Arc<ApiState>>,
    _user: AuthUser,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<Vec<ElectionResults>>, ApiError> {
    let elections = match query.election_id.map(ElectionId) {
        Some(id) => vec![load_election(&state, id)?],
        None => state.store().list_elections()?,
    };
    Ok(Json(elections.iter().map(ElectionResults::from).collect()))
}

/// `GET /elections/{id}`
pub async fn election(
    State(state): State<Arc<ApiState>>,
    _user: AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<Election>, ApiError> {
    Ok(Json(load_election(&state, ElectionId(id))?))
}

fn load_election(state: &ApiState, id: ElectionId) -> Result<Election, ApiError> {
    state
        .store()
        .get_election(id)?
        .ok_or_else(|| ApiError::NotFound(format!("election {id}")))
}

// ── Voter ────────────────────────────────────────────────────────────────

/// `GET /vote/status/{electionId}`
pub async fn vote_status(
    State(state): State<Arc<ApiState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<u64>,
) -> Result<Json<VoteStatusView>, ApiError> {
    let election_id = ElectionId(id);
    let record = state.store().get_vote_record(&user.id, election_id)?;
    Ok(Json(VoteStatusView {
        election_id,
        has_voted: record.is_some(),
        record,
    }))
}

/// `GET /vote/history`: the caller's records, oldest first.
pub async fn vote_history(
    State(state): State<Arc<ApiState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<VoteRecord>>, ApiError> {
    Ok(Json(state.store().vote_records_for_user(&user.id)?))
}

/// `GET /auth/me`
pub async fn me(AuthUser(user): AuthUser) -> Json<UserProfile> {
    Json(user)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkWalletRequest {
    #[serde(alias = "address")]
    pub wallet_address: VoterAddress,
}

/// `POST /auth/wallet`: link a wallet address to the caller.
pub async fn link_wallet(
    State(state): State<Arc<ApiState>>,
    AuthUser(user): AuthUser,
    body: Result<Json<LinkWalletRequest>, JsonRejection>,
) -> Result<Json<UserProfile>, ApiError> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let profile = change_wallet(&state, &user, Some(&req.wallet_address))?;
    info!(user = %user.id, wallet = %req.wallet_address, "wallet linked");
    Ok(Json(profile))
}

/// `DELETE /auth/wallet`
pub async fn unlink_wallet(
    State(state): State<Arc<ApiState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<UserProfile>, ApiError> {
    let profile = change_wallet(&state, &user, None)?;
    info!(user = %user.id, "wallet unlinked");
    Ok(Json(profile))
}

fn change_wallet(
    state: &ApiState,
    user: &UserProfile,
    wallet: Option<&VoterAddress>,
) -> Result<UserProfile, ApiError> {
    match state.store().set_wallet(&user.id, wallet)? {
        WalletChange::Updated(profile) => Ok(profile),
        WalletChange::LockedByVote => Err(ApiError::WalletLocked),
        WalletChange::AddressInUse(_) => Err(ApiError::WalletInUse),
    }
}

// ── Admin ────────────────────────────────────────────────────────────────

/// `GET /elections`: every cached election, open or not.
pub async fn all_elections(
    State(state): State<Arc<ApiState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<Election>>, ApiError> {
    Ok(Json(state.store().list_elections()?))
}

/// `POST /admin/elections/{id}/sync`
pub async fn sync_election(
    State(state): State<Arc<ApiState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<u64>,
) -> Result<Json<Election>, ApiError> {
    let election = state
        .verifier
        .election_sync()
        .sync_election(ElectionId(id))
        .await?;
    info!(admin = %admin.id, election = id, "election synced by admin");
    Ok(Json(election))
}

/// `POST /admin/elections/{id}/close`: mirror a close already final on the ledger.
pub async fn close_election(
    State(state): State<Arc<ApiState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<u64>,
) -> Result<Json<Election>, ApiError> {
    let election = state
        .verifier
        .election_sync()
        .mirror_close(ElectionId(id))
        .await?;
    info!(admin = %admin.id, election = id, "election close mirrored by admin");
    Ok(Json(election))
}

// ── Operations ───────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /health`
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /metrics`
pub async fn metrics(State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
