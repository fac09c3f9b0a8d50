//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the pool ledger.
//! Every [`Metrics`] owns its registry, so several services can coexist in
//! one process (tests, embedded use).
//!
//! # Metrics
//!
//! - `pool_ledger_transactions_total{outcome}` - Submissions by terminal state
//! - `pool_ledger_claims_total{result}` - Ledger claim attempts
//! - `pool_ledger_pools` - Registered pools
//! - `pool_ledger_process_duration_seconds` - Histogram of processing latency
//! - `pool_ledger_commit_batch_size` - Histogram of storage batch sizes

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Submissions by terminal state
    pub transactions_total: IntCounterVec,

    /// Claim attempts by result
    pub claims_total: IntCounterVec,

    /// Registered pools
    pub pools: IntGauge,

    /// Processing latency
    pub process_duration: Histogram,

    /// Storage batch sizes
    pub commit_batch_size: Histogram,

    registry: Registry,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("pools", &self.pools.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let transactions_total = IntCounterVec::new(
            Opts::new(
                "pool_ledger_transactions_total",
                "Submitted transactions by terminal state",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(transactions_total.clone()))?;

        let claims_total = IntCounterVec::new(
            Opts::new("pool_ledger_claims_total", "Idempotency ledger claim attempts"),
            &["result"],
        )?;
        registry.register(Box::new(claims_total.clone()))?;

        let pools = IntGauge::new("pool_ledger_pools", "Registered pools")?;
        registry.register(Box::new(pools.clone()))?;

        let process_duration = Histogram::with_opts(
            HistogramOpts::new(
                "pool_ledger_process_duration_seconds",
                "Histogram of transaction processing latencies",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 1.0]),
        )?;
        registry.register(Box::new(process_duration.clone()))?;

        let commit_batch_size = Histogram::with_opts(
            HistogramOpts::new(
                "pool_ledger_commit_batch_size",
                "Histogram of storage commit batch sizes",
            )
            .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0]),
        )?;
        registry.register(Box::new(commit_batch_size.clone()))?;

        Ok(Self {
            transactions_total,
            claims_total,
            pools,
            process_duration,
            commit_batch_size,
            registry,
        })
    }

    /// Record a terminal state
    pub fn record_outcome(&self, outcome: &str) {
        self.transactions_total.with_label_values(&[outcome]).inc();
    }

    /// Record a claim attempt
    pub fn record_claim(&self, claimed: bool) {
        let result = if claimed { "claimed" } else { "already_claimed" };
        self.claims_total.with_label_values(&[result]).inc();
    }

    /// Update registered pool count
    pub fn set_pools(&self, count: usize) {
        self.pools.set(count as i64);
    }

    /// Record a storage batch flush
    pub fn record_batch_flush(&self, batch_size: usize) {
        self.commit_batch_size.observe(batch_size as f64);
    }

    /// Render in the Prometheus text format
    pub fn export(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.pools.get(), 0);
        // A second instance must not clash with the first
        assert!(Metrics::new().is_ok());
    }

    #[test]
    fn test_record_outcome() {
        let metrics = Metrics::new().unwrap();
        metrics.record_outcome("applied");
        metrics.record_outcome("applied");
        metrics.record_outcome("replay_rejected");

        assert_eq!(metrics.transactions_total.with_label_values(&["applied"]).get(), 2);
        assert_eq!(
            metrics.transactions_total.with_label_values(&["replay_rejected"]).get(),
            1
        );
    }

    #[test]
    fn test_record_claim() {
        let metrics = Metrics::new().unwrap();
        metrics.record_claim(true);
        metrics.record_claim(false);
        metrics.record_claim(false);
        assert_eq!(metrics.claims_total.with_label_values(&["already_claimed"]).get(), 2);
    }

    #[test]
    fn test_export_text_format() {
        let metrics = Metrics::new().unwrap();
        metrics.set_pools(3);
        metrics.record_batch_flush(4);

        let text = metrics.export().unwrap();
        assert!(text.contains("pool_ledger_pools 3"));
        assert!(text.contains("pool_ledger_commit_batch_size"));
    }
}
