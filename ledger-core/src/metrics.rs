//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `ledger_operations_total` - Committed operations by kind
//! - `ledger_operations_failed_total` - Rejected operations
//! - `ledger_operation_duration_seconds` - Histogram of operation latencies
//! - `ledger_conflict_retries_total` - Internal retries on transient conflicts

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Registered on its own `Registry` so independent engine instances (and
/// tests) never collide in the process-global default registry.
#[derive(Clone)]
pub struct Metrics {
    /// Committed operations, labeled by kind
    pub operations_total: IntCounterVec,

    /// Rejected operations, labeled by kind
    pub operations_failed_total: IntCounterVec,

    /// Operation latency histogram
    pub operation_duration: Histogram,

    /// Internal retries on lock timeouts / version conflicts
    pub conflict_retries_total: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = IntCounterVec::new(
            Opts::new("ledger_operations_total", "Committed operations by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operations_failed_total = IntCounterVec::new(
            Opts::new(
                "ledger_operations_failed_total",
                "Rejected operations by kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(operations_failed_total.clone()))?;

        let operation_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_operation_duration_seconds",
                "Histogram of operation latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let conflict_retries_total = IntCounter::with_opts(Opts::new(
            "ledger_conflict_retries_total",
            "Internal retries on transient conflicts",
        ))?;
        registry.register(Box::new(conflict_retries_total.clone()))?;

        Ok(Self {
            operations_total,
            operations_failed_total,
            operation_duration,
            conflict_retries_total,
            registry,
        })
    }

    /// Record a committed operation
    pub fn record_success(&self, kind: &str, seconds: f64) {
        self.operations_total.with_label_values(&[kind]).inc();
        self.operation_duration.observe(seconds);
    }

    /// Record a rejected operation
    pub fn record_failure(&self, kind: &str) {
        self.operations_failed_total.with_label_values(&[kind]).inc();
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}
