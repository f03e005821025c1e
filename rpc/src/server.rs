//! Axum-based Store API server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::routing::{get, post};
use axum::Router;
use chainvote_store::Store;
use chainvote_types::Clock;
use chainvote_utils::tracing_spans::api_request_span;
use chainvote_verification::VoteVerifier;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{handlers, ApiMetrics};

/// Shared state of every handler.
pub struct ApiState {
    pub verifier: Arc<VoteVerifier>,
    pub clock: Arc<dyn Clock>,
    pub metrics: ApiMetrics,
}

impl ApiState {
    pub fn new(verifier: Arc<VoteVerifier>, clock: Arc<dyn Clock>) -> Self {
        Self {
            verifier,
            clock,
            metrics: ApiMetrics::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        self.verifier.store()
    }
}

/// Build the API router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/verify/vote", post(handlers::verify_vote))
        .route("/elections", get(handlers::all_elections))
        .route("/elections/active", get(handlers::active_elections))
        .route("/elections/results", get(handlers::results))
        .route("/elections/:id", get(handlers::election))
        .route("/vote/status/:election_id", get(handlers::vote_status))
        .route("/vote/history", get(handlers::vote_history))
        .route("/auth/me", get(handlers::me))
        .route(
            "/auth/wallet",
            post(handlers::link_wallet).delete(handlers::unlink_wallet),
        )
        .route("/admin/elections/:id/sync", post(handlers::sync_election))
        .route("/admin/elections/:id/close", post(handlers::close_election))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                api_request_span(request.method(), request.uri().path())
            }),
        )
        .with_state(state)
}

/// The Store API bound to a listening socket.
pub struct ApiServer {
    listener: TcpListener,
    state: Arc<ApiState>,
}

impl ApiServer {
    pub async fn bind(addr: impl ToSocketAddrs, state: Arc<ApiState>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` fires.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
        serve(self.listener, self.state, shutdown).await
    }
}

/// Serve the API on an already bound listener until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: Arc<ApiState>,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "store API listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            info!("store API stopping");
        })
        .await
}
