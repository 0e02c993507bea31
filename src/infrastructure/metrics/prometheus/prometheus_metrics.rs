//! Prometheus metrics implementation.
//!
//! This module provides a concrete implementation of the `Metrics` trait using
//! the Prometheus metrics format. It delegates to utility functions in sibling
//! modules (`counters.rs`, `recorder.rs`) which handle the actual metrics
//! collection via the global `metrics` crate registry.

use crate::domain::{Metrics, WriteOutcome};
use std::time::Instant;

/// Prometheus-based metrics implementation.
///
/// Empty because all metrics live in the global registry of the `metrics`
/// crate; the handle stored in `recorder.rs` renders them.
pub struct PrometheusMetrics {
    // Empty - uses global metrics registry pattern
}

impl PrometheusMetrics {
    pub fn new() -> Self {
        tracing::info!("Creating Prometheus metrics");
        PrometheusMetrics {}
    }
}

impl Metrics for PrometheusMetrics {
    fn render(&self) -> String {
        super::render_metrics()
    }

    fn record_cart_write(&self, start: Instant, outcome: WriteOutcome) {
        tracing::debug!("Recording cart write ({})", outcome.as_str());
        super::increment_cart_write(outcome);
        super::track_cart_write(start);
    }

    fn record_session_expired(&self) {
        tracing::debug!("Recording session expiry");
        super::increment_session_expired();
    }
}
