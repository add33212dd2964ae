//! Prometheus metrics for the keeper.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which must crash at startup. These panics only
//! occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Cycle attempts by asset and result.
/// Labels: asset, result (started/dropped/aborted/completed)
pub static CYCLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_cycles_total",
        "Per-asset cycle attempts by result",
        &["asset", "result"]
    )
    .unwrap()
});

/// Cycle wall time in milliseconds.
pub static CYCLE_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "keeper_cycle_duration_ms",
        "Per-asset cycle duration in milliseconds",
        &["asset"],
        vec![100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0, 30000.0, 60000.0]
    )
    .unwrap()
});

/// Batches submitted by mode and outcome.
/// Labels: mode (limit/sl/tp/liq), outcome (confirmed/failed)
pub static BATCHES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_batches_total",
        "Batches by mode and outcome",
        &["mode", "outcome"]
    )
    .unwrap()
});

/// Position ids processed by the contract.
pub static IDS_PROCESSED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_ids_processed_total",
        "Position ids executed or closed",
        &["mode"]
    )
    .unwrap()
});

/// Position ids skipped by the contract or by a failed batch.
pub static IDS_SKIPPED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_ids_skipped_total",
        "Position ids skipped",
        &["mode"]
    )
    .unwrap()
});

/// Verification requests by result.
/// Labels: result (sent/failed)
pub static VERIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_verifications_total",
        "Skip verification requests by result",
        &["result"]
    )
    .unwrap()
});

/// ABI resolutions by operation and variant.
/// Labels: operation (execLimits/closeBatch), tier (1-4, none)
pub static ABI_RESOLUTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_abi_resolutions_total",
        "Contract call shape resolutions by tier",
        &["operation", "tier"]
    )
    .unwrap()
});

/// Last human oracle price per asset.
pub static ORACLE_PRICE: Lazy<GaugeVec> = Lazy::new(|| {
    register_gauge_vec!(
        "keeper_oracle_price",
        "Last oracle price read per asset",
        &["asset"]
    )
    .unwrap()
});

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn cycle_started(asset: &str) {
        CYCLES_TOTAL.with_label_values(&[asset, "started"]).inc();
    }

    /// Attempt dropped because the previous cycle is still running.
    pub fn cycle_dropped(asset: &str) {
        CYCLES_TOTAL.with_label_values(&[asset, "dropped"]).inc();
    }

    /// Cycle abandoned before dispatch (oracle or fetch failure).
    pub fn cycle_aborted(asset: &str) {
        CYCLES_TOTAL.with_label_values(&[asset, "aborted"]).inc();
    }

    pub fn cycle_completed(asset: &str, duration_ms: f64) {
        CYCLES_TOTAL.with_label_values(&[asset, "completed"]).inc();
        CYCLE_DURATION_MS
            .with_label_values(&[asset])
            .observe(duration_ms);
    }

    /// Record one batch outcome and its id counts.
    pub fn batch_outcome(mode: &str, outcome: &str, processed: u32, skipped: u32) {
        BATCHES_TOTAL.with_label_values(&[mode, outcome]).inc();
        IDS_PROCESSED_TOTAL
            .with_label_values(&[mode])
            .inc_by(f64::from(processed));
        IDS_SKIPPED_TOTAL
            .with_label_values(&[mode])
            .inc_by(f64::from(skipped));
    }

    pub fn verification_sent() {
        VERIFICATIONS_TOTAL.with_label_values(&["sent"]).inc();
    }

    pub fn verification_failed() {
        VERIFICATIONS_TOTAL.with_label_values(&["failed"]).inc();
    }

    /// `tier` is "1".."4", or "none" when no shape was accepted.
    pub fn abi_resolved(operation: &str, tier: &str) {
        ABI_RESOLUTIONS_TOTAL
            .with_label_values(&[operation, tier])
            .inc();
    }

    pub fn oracle_price(asset: &str, price: f64) {
        ORACLE_PRICE.with_label_values(&[asset]).set(price);
    }

    /// Render the default registry in Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
