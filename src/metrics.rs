// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for poolwatch.
//!
//! This module provides metrics collection with the namespace prefix `poolwatch`.
//!
//! # Metrics Categories
//!
//! - **Render Metrics** - Track render cycles and their outcomes
//! - **Output Metrics** - Track writes of rendered configuration
//! - **DNS Metrics** - Track queries sent to the nameservers
//! - **Watch Metrics** - Track active watches
//!
//! # Example
//!
//! ```rust,no_run
//! use poolwatch::metrics::{gather_metrics, record_render_success};
//!
//! record_render_success(std::time::Duration::from_millis(12), true);
//! println!("{}", gather_metrics().unwrap());
//! ```

use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all poolwatch metrics
const METRICS_NAMESPACE: &str = "poolwatch";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Render Metrics
// ============================================================================

/// Total number of render cycles by outcome
///
/// Labels:
/// - `outcome`: `changed`, `unchanged` or `failure`
pub static RENDERS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_renders_total"),
        "Total number of render cycles by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of render cycles in seconds (DNS resolution included)
///
/// Labels:
/// - `outcome`: `success` or `failure`
pub static RENDER_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_render_duration_seconds"),
        "Duration of render cycles in seconds",
    )
    .buckets(vec![0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0]);
    let histogram = HistogramVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Output Metrics
// ============================================================================

/// Total number of output writes by outcome
///
/// Labels:
/// - `outcome`: `success` or `failure`
pub static WRITES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_writes_total"),
        "Total number of rendered configuration writes by outcome",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// DNS Metrics
// ============================================================================

/// Total number of DNS queries by record type and outcome
///
/// Labels:
/// - `type`: `A` or `SRV`
/// - `outcome`: `success` or `failure`
pub static DNS_QUERIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_dns_queries_total"),
        "Total number of DNS queries by record type and outcome",
    );
    let counter = CounterVec::new(opts, &["type", "outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Watch Metrics
// ============================================================================

/// Number of currently registered watches
pub static ACTIVE_WATCHES: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        format!("{METRICS_NAMESPACE}_active_watches"),
        "Number of currently registered watches",
    )
    .unwrap();
    METRICS_REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful render
///
/// # Arguments
/// * `duration` - Duration of the render
/// * `changed` - Whether the rendered content differed from the last written one
pub fn record_render_success(duration: Duration, changed: bool) {
    let outcome = if changed { "changed" } else { "unchanged" };
    RENDERS_TOTAL.with_label_values(&[outcome]).inc();
    RENDER_DURATION_SECONDS
        .with_label_values(&["success"])
        .observe(duration.as_secs_f64());
}

/// Record a failed render (template, DNS or output failure)
pub fn record_render_failure(duration: Duration) {
    RENDERS_TOTAL.with_label_values(&["failure"]).inc();
    RENDER_DURATION_SECONDS
        .with_label_values(&["failure"])
        .observe(duration.as_secs_f64());
}

/// Record the outcome of an output write
pub fn record_write(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    WRITES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record the outcome of a DNS query
///
/// # Arguments
/// * `record_type` - `A` or `SRV`
/// * `success` - Whether the query produced an answer
pub fn record_dns_query(record_type: &str, success: bool) {
    let outcome = if success { "success" } else { "failure" };
    DNS_QUERIES_TOTAL
        .with_label_values(&[record_type, outcome])
        .inc();
}

/// Set the number of registered watches
#[allow(clippy::cast_precision_loss)]
pub fn set_active_watches(count: usize) {
    ACTIVE_WATCHES.set(count as f64);
}

/// Gather all metrics in Prometheus text format
///
/// # Errors
///
/// Returns an error if encoding fails.
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}
