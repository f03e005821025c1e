//! HTTP API of the Authoritative Store.
//!
//! Provides endpoints for:
//! - Vote verification (`POST /verify/vote`)
//! - Active elections, single elections and cached results
//! - The caller's vote status and history, and their profile
//! - Admin election sync and close mirroring
//! - Health and Prometheus metrics

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod server;

pub use auth::{AdminUser, AuthUser};
pub use error::ApiError;
pub use metrics::ApiMetrics;
pub use server::{router, serve, ApiServer, ApiState};
