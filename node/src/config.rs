//! Node configuration with TOML file support.

use std::path::PathBuf;
use std::time::Duration;

use chainvote_ledger::LedgerClientConfig;
use chainvote_types::{Role, UserId, UserProfile, VoterAddress};
use chainvote_utils::Backoff;
use serde::{Deserialize, Serialize};

use crate::{LogFormat, NodeError};

/// Configuration for the Store service.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Address the HTTP API binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port of the HTTP API. `0` picks a free port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// LMDB map size in MiB.
    #[serde(default = "default_lmdb_map_size_mb")]
    pub lmdb_map_size_mb: usize,

    /// JSON-RPC endpoint of the ledger.
    #[serde(default = "default_ledger_rpc_url")]
    pub ledger_rpc_url: String,

    /// Per-request timeout for ledger calls, in seconds.
    #[serde(default = "default_ledger_timeout_secs")]
    pub ledger_timeout_secs: u64,

    /// Blocks (including the receipt's own) before a vote counts as final.
    #[serde(default = "default_min_confirmations")]
    pub min_confirmations: u64,

    /// Delay between receipt polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Seconds between reconciliation passes over parked claims.
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,

    /// Passes a parked claim gets before it is dropped.
    #[serde(default = "default_reconcile_max_attempts")]
    pub reconcile_max_attempts: u32,

    /// Seconds between tally refreshes of open elections.
    #[serde(default = "default_tally_refresh_secs")]
    pub tally_refresh_secs: u64,

    /// Elections mirrored from the ledger on startup.
    #[serde(default)]
    pub watch_elections: Vec<u64>,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Accounts and session tokens written to the Store on startup.
    #[serde(default)]
    pub users: Vec<BootstrapUser>,
}

/// An account seeded into the Store at startup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<VoterAddress>,
    #[serde(default)]
    pub role: Role,
    /// Session tokens that authenticate as this user.
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl BootstrapUser {
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            id: UserId::new(self.id.clone()),
            name: if self.name.is_empty() {
                self.id.clone()
            } else {
                self.name.clone()
            },
            wallet: self.wallet.clone(),
            role: self.role,
        }
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    7080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./chainvote_data")
}

fn default_lmdb_map_size_mb() -> usize {
    1024
}

fn default_ledger_rpc_url() -> String {
    "http://127.0.0.1:8545".to_string()
}

fn default_ledger_timeout_secs() -> u64 {
    10
}

fn default_min_confirmations() -> u64 {
    2
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_reconcile_interval_secs() -> u64 {
    15
}

fn default_reconcile_max_attempts() -> u32 {
    chainvote_verification::reconciler::DEFAULT_MAX_ATTEMPTS
}

fn default_tally_refresh_secs() -> u64 {
    30
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        let config: Self = toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), NodeError> {
        if self.min_confirmations == 0 {
            return Err(NodeError::Config("min_confirmations must be at least 1".into()));
        }
        if self.lmdb_map_size_mb == 0 {
            return Err(NodeError::Config("lmdb_map_size_mb must be positive".into()));
        }
        self.log_format()?;
        for user in &self.users {
            if user.id.trim().is_empty() {
                return Err(NodeError::Config("bootstrap user with empty id".into()));
            }
        }
        Ok(())
    }

    pub fn log_format(&self) -> Result<LogFormat, NodeError> {
        self.log_format.parse()
    }

    pub fn lmdb_map_size(&self) -> usize {
        self.lmdb_map_size_mb * 1024 * 1024
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_timeout_secs)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs.max(1))
    }

    pub fn tally_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.tally_refresh_secs.max(1))
    }

    /// Ledger client tuning derived from this config.
    pub fn ledger_client_config(&self) -> LedgerClientConfig {
        LedgerClientConfig {
            min_confirmations: self.min_confirmations,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            read_backoff: Backoff::new(
                Duration::from_millis(200),
                self.ledger_timeout(),
                4,
            ),
            ..LedgerClientConfig::default()
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            data_dir: default_data_dir(),
            lmdb_map_size_mb: default_lmdb_map_size_mb(),
            ledger_rpc_url: default_ledger_rpc_url(),
            ledger_timeout_secs: default_ledger_timeout_secs(),
            min_confirmations: default_min_confirmations(),
            poll_interval_ms: default_poll_interval_ms(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            reconcile_max_attempts: default_reconcile_max_attempts(),
            tally_refresh_secs: default_tally_refresh_secs(),
            watch_elections: Vec::new(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            users: Vec::new(),
        }
    }
}
