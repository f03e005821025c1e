//! Prometheus metrics for the node's background loops.
//!
//! [`NodeMetrics`] registers into the API's [`Registry`], so the same
//! `GET /metrics` endpoint exposes request and reconciliation activity.

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Histogram, HistogramOpts, IntCounter, IntGauge, Opts,
    Registry,
};

use chainvote_verification::ReconcileReport;

pub struct NodeMetrics {
    // ── Counters ────────────────────────────────────────────────────────
    /// Reconciliation passes run.
    pub reconcile_passes: IntCounter,
    /// Parked claims that ended recorded or duplicate.
    pub claims_resolved: IntCounter,
    /// Parked claims dropped after a permanent failure or too many attempts.
    pub claims_dropped: IntCounter,
    /// Tally refreshes that failed.
    pub tally_refresh_failures: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    /// Claims currently parked for reconciliation.
    pub pending_claims: IntGauge,
    /// Elections cached in the Store.
    pub elections_cached: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Duration of one reconciliation pass, in milliseconds.
    pub reconcile_pass_ms: Histogram,
}

impl NodeMetrics {
    /// Register every node metric into `registry`.
    pub fn new(registry: &Registry) -> Self {
        let reconcile_passes = register_int_counter_with_registry!(
            Opts::new(
                "chainvote_reconcile_passes_total",
                "Reconciliation passes over parked claims"
            ),
            registry
        )
        .expect("failed to register reconcile_passes counter");

        let claims_resolved = register_int_counter_with_registry!(
            Opts::new(
                "chainvote_claims_resolved_total",
                "Parked claims resolved as recorded or duplicate"
            ),
            registry
        )
        .expect("failed to register claims_resolved counter");

        let claims_dropped = register_int_counter_with_registry!(
            Opts::new(
                "chainvote_claims_dropped_total",
                "Parked claims dropped without a record"
            ),
            registry
        )
        .expect("failed to register claims_dropped counter");

        let tally_refresh_failures = register_int_counter_with_registry!(
            Opts::new(
                "chainvote_tally_refresh_failures_total",
                "Tally refreshes that failed"
            ),
            registry
        )
        .expect("failed to register tally_refresh_failures counter");

        let pending_claims = register_int_gauge_with_registry!(
            Opts::new("chainvote_pending_claims", "Claims parked for reconciliation"),
            registry
        )
        .expect("failed to register pending_claims gauge");

        let elections_cached = register_int_gauge_with_registry!(
            Opts::new("chainvote_elections_cached", "Elections cached in the Store"),
            registry
        )
        .expect("failed to register elections_cached gauge");

        let reconcile_pass_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "chainvote_reconcile_pass_ms",
                "Reconciliation pass duration in milliseconds"
            )
            .buckets(vec![1.0, 5.0, 25.0, 100.0, 500.0, 2_500.0, 10_000.0]),
            registry
        )
        .expect("failed to register reconcile_pass_ms histogram");

        Self {
            reconcile_passes,
            claims_resolved,
            claims_dropped,
            tally_refresh_failures,
            pending_claims,
            elections_cached,
            reconcile_pass_ms,
        }
    }

    /// Fold one reconciliation pass into the counters.
    pub fn observe_pass(&self, report: &ReconcileReport) {
        self.reconcile_passes.inc();
        self.claims_resolved
            .inc_by(u64::from(report.recorded + report.duplicate));
        self.claims_dropped.inc_by(u64::from(report.failed));
        self.pending_claims.set(i64::from(report.still_pending));
    }
}
