use std::sync::Arc;
use std::time::Instant;

/// Result of a remote cart write, used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Ok,
    Error,
}

impl WriteOutcome {
    // ---
    pub fn as_str(self) -> &'static str {
        match self {
            WriteOutcome::Ok => "ok",
            WriteOutcome::Error => "error",
        }
    }
}

/// Abstraction for application metrics (counters, histograms).
pub trait Metrics: Send + Sync + 'static {
    // ---
    /// Render current metrics in Prometheus text format.
    fn render(&self) -> String;

    /// Record a remote cart write, its outcome and how long it took.
    fn record_cart_write(&self, start: Instant, outcome: WriteOutcome);

    /// Record a session evicted because its credential expired.
    fn record_session_expired(&self);
}

/// Type alias for any backend that implements Metrics.
pub type MetricsPtr = Arc<dyn Metrics>;
