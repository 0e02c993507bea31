use crate::domain::WriteOutcome;
use metrics::{counter, histogram};
use std::time::Instant;

/// Count a remote cart write, labelled by outcome.
pub fn increment_cart_write(outcome: WriteOutcome) {
    counter!("cart_sync_writes_total", "outcome" => outcome.as_str()).increment(1);
}

/// Track remote cart write latency using a histogram.
pub fn track_cart_write(start: Instant) {
    let elapsed = start.elapsed();
    histogram!("cart_sync_write_duration_seconds").record(elapsed);
}

/// Count a session evicted on credential expiry.
pub fn increment_session_expired() {
    counter!("session_expirations_total").increment(1);
}
