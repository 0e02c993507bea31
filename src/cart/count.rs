use std::sync::Arc;
use tokio::sync::watch;

/// Aggregate cart item count shared with views outside the cart (the badge).
///
/// Cloning yields another handle to the same counter.
#[derive(Clone)]
pub struct CartCounter {
    // ---
    tx: Arc<watch::Sender<u32>>,
}

impl Default for CartCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl CartCounter {
    // ---
    pub fn new() -> Self {
        // ---
        let (tx, _rx) = watch::channel(0);
        Self { tx: Arc::new(tx) }
    }

    pub fn get(&self) -> u32 {
        *self.tx.borrow()
    }

    pub fn set(&self, count: u32) {
        self.tx.send_replace(count);
    }

    /// Bumps the count, used when items are added from outside the cart view.
    pub fn add(&self, quantity: u32) {
        self.tx.send_modify(|count| *count = count.saturating_add(quantity));
    }

    /// A receiver that observes every published count.
    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.tx.subscribe()
    }
}
