//! Prometheus metrics for the Store API.
//!
//! [`ApiMetrics`] owns a dedicated [`Registry`] that `GET /metrics` encodes
//! into the Prometheus text exposition format.

use prometheus::{
    register_histogram_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, Encoder, Histogram, HistogramOpts, IntCounter,
    IntCounterVec, Opts, Registry, TextEncoder,
};

pub struct ApiMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Verification requests received, whatever their outcome.
    pub verify_requests: IntCounter,
    /// Verifications that created a vote record.
    pub votes_recorded: IntCounter,
    /// Verifications answered with `duplicate`.
    pub votes_duplicate: IntCounter,
    /// Verifications refused, labelled by error code.
    pub verify_rejected: IntCounterVec,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time spent verifying one claim, in milliseconds.
    pub verify_latency_ms: Histogram,
}

impl ApiMetrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let verify_requests = register_int_counter_with_registry!(
            Opts::new(
                "chainvote_verify_requests_total",
                "Vote verification requests received"
            ),
            registry
        )
        .expect("failed to register verify_requests counter");

        let votes_recorded = register_int_counter_with_registry!(
            Opts::new("chainvote_votes_recorded_total", "Vote records created"),
            registry
        )
        .expect("failed to register votes_recorded counter");

        let votes_duplicate = register_int_counter_with_registry!(
            Opts::new(
                "chainvote_votes_duplicate_total",
                "Verifications answered as duplicate"
            ),
            registry
        )
        .expect("failed to register votes_duplicate counter");

        let verify_rejected = register_int_counter_vec_with_registry!(
            Opts::new(
                "chainvote_verify_rejected_total",
                "Verifications refused, by error code"
            ),
            &["code"],
            registry
        )
        .expect("failed to register verify_rejected counter");

        // 1 ms → ~16 s; covers a ledger round trip plus retries.
        let verify_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "chainvote_verify_latency_ms",
                "Vote verification latency in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 15).expect("valid buckets")),
            registry
        )
        .expect("failed to register verify_latency_ms histogram");

        Self {
            registry,
            verify_requests,
            votes_recorded,
            votes_duplicate,
            verify_rejected,
            verify_latency_ms,
        }
    }

    /// Text exposition of every registered metric.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}
