//! The Store service: wires storage, the ledger, verification and the API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chainvote_ledger::{HttpLedger, Ledger, LedgerClient};
use chainvote_rpc::{ApiServer, ApiState};
use chainvote_store::{ElectionStore, Store, UserStore};
use chainvote_store_lmdb::LmdbEnvironment;
use chainvote_types::{Clock, ElectionId, SystemClock};
use chainvote_utils::tracing_spans::reconcile_span;
use chainvote_verification::{ElectionSync, Reconciler, VoteVerifier};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::{NodeConfig, NodeError, NodeMetrics, ShutdownController};

/// How long `stop` waits for background tasks before giving up on them.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// A running Store service.
///
/// `launch` spawns the API server and the background loops; `start` also
/// blocks until SIGINT/SIGTERM. Call `stop` afterwards to drain the tasks.
pub struct StoreNode {
    pub config: NodeConfig,
    store: Arc<dyn Store>,
    lmdb: Option<Arc<LmdbEnvironment>>,
    verifier: Arc<VoteVerifier>,
    api_state: Arc<ApiState>,
    metrics: Arc<NodeMetrics>,
    shutdown: ShutdownController,
    task_handles: Vec<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl StoreNode {
    /// Open the LMDB environment under `data_dir` and connect to the
    /// configured ledger endpoint.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        config.validate()?;
        let env = Arc::new(LmdbEnvironment::open(
            &config.data_dir,
            config.lmdb_map_size(),
        )?);

        let ledger = HttpLedger::with_timeout(config.ledger_rpc_url.clone(), config.ledger_timeout());
        tracing::info!(url = %ledger.url(), "ledger endpoint configured");

        let mut node = Self::with_parts(
            config,
            env.clone() as Arc<dyn Store>,
            Arc::new(ledger),
            Arc::new(SystemClock),
        )?;
        node.lmdb = Some(env);
        Ok(node)
    }

    /// Build a node over caller-supplied backends.
    pub fn with_parts(
        config: NodeConfig,
        store: Arc<dyn Store>,
        ledger: Arc<dyn Ledger>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, NodeError> {
        let ledger = LedgerClient::new(ledger, config.ledger_client_config());
        let verifier = Arc::new(VoteVerifier::new(ledger, store.clone(), clock.clone()));
        let api_state = Arc::new(ApiState::new(verifier.clone(), clock));
        let metrics = Arc::new(NodeMetrics::new(&api_state.metrics.registry));

        let node = Self {
            config,
            store,
            lmdb: None,
            verifier,
            api_state,
            metrics,
            shutdown: ShutdownController::new(),
            task_handles: Vec::new(),
            local_addr: None,
        };
        node.seed_users()?;
        Ok(node)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn verifier(&self) -> &Arc<VoteVerifier> {
        &self.verifier
    }

    pub fn metrics(&self) -> &Arc<NodeMetrics> {
        &self.metrics
    }

    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.shutdown
    }

    /// Address the API is listening on, once launched.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn seed_users(&self) -> Result<(), NodeError> {
        for user in &self.config.users {
            let profile = user.profile();
            self.store.put_user(&profile)?;
            for token in &user.tokens {
                self.store.put_session(token, &profile.id)?;
            }
            tracing::debug!(user = %profile.id, role = ?profile.role, "bootstrap user seeded");
        }
        if !self.config.users.is_empty() {
            tracing::info!(count = self.config.users.len(), "bootstrap users seeded");
        }
        Ok(())
    }

    /// Mirror the configured elections. Failures are logged; the tally loop
    /// retries them.
    async fn sync_watched(&self) {
        let sync = self.verifier.election_sync();
        for &id in &self.config.watch_elections {
            if let Err(e) = sync.sync_election(ElectionId(id)).await {
                tracing::warn!(election = id, error = %e, "initial election sync failed");
            }
        }
    }

    /// Bind the API and spawn every background task. Returns the bound address.
    pub async fn launch(&mut self) -> Result<SocketAddr, NodeError> {
        if self.local_addr.is_some() {
            return Err(NodeError::AlreadyStarted);
        }

        self.sync_watched().await;

        // ── HTTP API ──────────────────────────────────────────────────────
        let server = ApiServer::bind(
            (self.config.bind_address.as_str(), self.config.port),
            self.api_state.clone(),
        )
        .await?;
        let addr = server.local_addr()?;
        let shutdown_rx_api = self.shutdown.subscribe();
        let api_handle = tokio::spawn(async move {
            match server.run(shutdown_rx_api).await {
                Ok(()) => tracing::info!("store API exited"),
                Err(e) => tracing::error!("store API error: {e}"),
            }
        });
        self.task_handles.push(api_handle);

        // ── Reconciler: re-drive parked claims ───────────────────────────
        let reconciler = Reconciler::new(self.verifier.clone())
            .with_max_attempts(self.config.reconcile_max_attempts);
        let metrics_rc = self.metrics.clone();
        let reconcile_interval = self.config.reconcile_interval();
        let mut shutdown_rx_rc = self.shutdown.subscribe();
        let reconcile_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(reconcile_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let started = Instant::now();
                        match reconciler.run_once().instrument(reconcile_span()).await {
                            Ok(report) => metrics_rc.observe_pass(&report),
                            Err(e) => tracing::warn!(error = %e, "reconciliation pass failed"),
                        }
                        metrics_rc
                            .reconcile_pass_ms
                            .observe(started.elapsed().as_secs_f64() * 1000.0);
                    }
                    _ = shutdown_rx_rc.recv() => {
                        tracing::info!("reconciler stopped");
                        return;
                    }
                }
            }
        });
        self.task_handles.push(reconcile_handle);

        // ── Tally refresh: keep open elections in step with the ledger ───
        let sync = self.verifier.election_sync().clone();
        let store_tally = self.store.clone();
        let metrics_tally = self.metrics.clone();
        let watched: Vec<ElectionId> =
            self.config.watch_elections.iter().copied().map(ElectionId).collect();
        let tally_interval = self.config.tally_refresh_interval();
        let mut shutdown_rx_tally = self.shutdown.subscribe();
        let tally_handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tally_interval);
            // The first tick fires immediately and startup already synced.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        refresh_tallies(&sync, store_tally.as_ref(), &watched, &metrics_tally).await;
                    }
                    _ = shutdown_rx_tally.recv() => {
                        tracing::info!("tally refresher stopped");
                        return;
                    }
                }
            }
        });
        self.task_handles.push(tally_handle);

        self.local_addr = Some(addr);
        tracing::info!(%addr, ledger_confirmations = self.config.min_confirmations, "store node started");
        Ok(addr)
    }

    /// Launch, then block until SIGINT/SIGTERM.
    pub async fn start(&mut self) -> Result<(), NodeError> {
        self.launch().await?;
        self.shutdown.wait_for_signal().await;
        Ok(())
    }

    /// Stop the node gracefully.
    ///
    /// 1. Sends the shutdown signal to all background tasks.
    /// 2. Waits for them to complete (with timeout).
    /// 3. Flushes LMDB.
    pub async fn stop(&mut self) -> Result<(), NodeError> {
        tracing::info!("store node stopping");
        self.shutdown.shutdown();

        let handles: Vec<JoinHandle<()>> = self.task_handles.drain(..).collect();
        let wait_all = async {
            for handle in handles {
                let _ = handle.await;
            }
        };

        if tokio::time::timeout(SHUTDOWN_TIMEOUT, wait_all)
            .await
            .is_err()
        {
            tracing::warn!(
                "shutdown timeout ({:?}), some tasks may still be running",
                SHUTDOWN_TIMEOUT
            );
        }

        if let Some(env) = &self.lmdb {
            match env.env().force_sync() {
                Ok(()) => tracing::info!("LMDB flushed to disk"),
                Err(e) => tracing::warn!("LMDB force_sync failed: {e}"),
            }
        }

        self.local_addr = None;
        tracing::info!("store node stopped");
        Ok(())
    }
}

/// One refresh over every open cached election plus watched ones not cached yet.
async fn refresh_tallies(
    sync: &ElectionSync,
    store: &dyn Store,
    watched: &[ElectionId],
    metrics: &NodeMetrics,
) {
    let cached = match store.list_elections() {
        Ok(elections) => elections,
        Err(e) => {
            tracing::warn!(error = %e, "listing elections failed");
            return;
        }
    };
    metrics.elections_cached.set(cached.len() as i64);

    let mut ids: Vec<ElectionId> = cached.iter().filter(|e| !e.closed).map(|e| e.id).collect();
    for id in watched {
        if !cached.iter().any(|e| e.id == *id) {
            ids.push(*id);
        }
    }

    for id in ids {
        if let Err(e) = sync.sync_election(id).await {
            metrics.tally_refresh_failures.inc();
            tracing::warn!(election = %id, error = %e, "tally refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BootstrapUser;
    use chainvote_types::{Role, UserId};

    fn config_in(dir: &std::path::Path) -> NodeConfig {
        NodeConfig {
            data_dir: dir.to_path_buf(),
            lmdb_map_size_mb: 16,
            bind_address: "127.0.0.1".into(),
            port: 0,
            users: vec![BootstrapUser {
                id: "admin".into(),
                name: "Admin".into(),
                wallet: None,
                role: Role::Admin,
                tokens: vec!["root".into()],
            }],
            ..NodeConfig::default()
        }
    }

    #[test]
    fn new_node_seeds_bootstrap_users_into_lmdb() {
        let dir = tempfile::tempdir().expect("temp dir");
        let node = StoreNode::new(config_in(dir.path())).expect("node");
        let admin = node
            .store()
            .user_for_token("root")
            .unwrap()
            .expect("session seeded");
        assert_eq!(admin.id, UserId::new("admin"));
        assert!(admin.is_admin());
    }

    #[tokio::test]
    async fn launch_binds_and_stop_drains_tasks() {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut node = StoreNode::new(config_in(dir.path())).expect("node");
        let addr = node.launch().await.expect("launch");
        assert_ne!(addr.port(), 0);
        assert_eq!(node.local_addr(), Some(addr));
        assert!(matches!(node.launch().await, Err(NodeError::AlreadyStarted)));

        node.stop().await.expect("stop");
        assert!(node.local_addr().is_none());
    }
}
