use crate::domain::{Metrics, WriteOutcome};
use std::time::Instant;

/// No-op metrics implementation for testing.
#[derive(Default)]
pub struct NoopMetrics;

impl NoopMetrics {
    pub fn new() -> Self {
        NoopMetrics
    }
}

impl Metrics for NoopMetrics {
    // ---
    fn render(&self) -> String {
        String::new()
    }
    fn record_cart_write(&self, _: Instant, _: WriteOutcome) {}
    fn record_session_expired(&self) {}
}
