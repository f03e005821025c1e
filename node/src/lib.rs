//! chainvote Store service.
//!
//! The node is the process that owns the Authoritative Store. It:
//! - Opens the LMDB environment and seeds bootstrap accounts
//! - Connects to the ledger over JSON-RPC
//! - Serves the Store HTTP API (vote verification, results, history)
//! - Re-drives parked verification claims in the background
//! - Keeps cached tallies in step with finalized ledger counts

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod shutdown;

pub use config::{BootstrapUser, NodeConfig};
pub use error::NodeError;
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use node::StoreNode;
pub use shutdown::ShutdownController;
