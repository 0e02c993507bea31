//! Remote persistence of the cart snapshot.
//!
//! Quantity edits are debounced: each one restarts a quiet period and only
//! the snapshot current when the period ends is written. Removals are written
//! immediately in a spawned task. Every write sends the full snapshot, and a
//! failed write restores the last server-confirmed snapshot and raises one
//! error notification. Nothing is retried automatically; the next edit
//! schedules a fresh write.

use super::store::{CheckoutSelection, InitSource, SharedCart};
use crate::config::SyncConfig;
use crate::domain::{
    ApiPtr, CartLineItem, MetricsPtr, Notification, NotifierPtr, WriteOutcome,
};
use crate::error::{StorefrontError, StorefrontResult};
use crate::schedule::Debouncer;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::task::JoinHandle;

const UPDATE_FAILED: &str = "Failed to update cart";
const LOAD_FAILED: &str = "Failed to load cart";

/// Last state the server acknowledged.
#[derive(Debug, Clone, Default)]
struct Confirmed {
    cart_id: Option<u64>,
    snapshot: Option<Vec<CartLineItem>>,
}

/// Writes cart snapshots to the remote cart resource and rolls back on failure.
pub struct SyncEngine {
    // ---
    api: ApiPtr,
    cart: SharedCart,
    notifier: NotifierPtr,
    metrics: MetricsPtr,
    /// Store epoch this engine belongs to; a reset makes the engine stale.
    epoch: u64,
    confirmed: Mutex<Confirmed>,
}

impl SyncEngine {
    // ---
    pub fn new(api: ApiPtr, cart: SharedCart, notifier: NotifierPtr, metrics: MetricsPtr) -> Self {
        // ---
        let epoch = cart.lock().epoch();
        Self {
            api,
            cart,
            notifier,
            metrics,
            epoch,
            confirmed: Mutex::new(Confirmed::default()),
        }
    }

    fn confirmed(&self) -> std::sync::MutexGuard<'_, Confirmed> {
        self.confirmed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records the server-assigned cart id and the snapshot the server holds.
    pub fn set_confirmed(&self, cart_id: u64, snapshot: Vec<CartLineItem>) {
        // ---
        let mut confirmed = self.confirmed();
        confirmed.cart_id = Some(cart_id);
        confirmed.snapshot = Some(snapshot);
    }

    pub fn cart_id(&self) -> Option<u64> {
        self.confirmed().cart_id
    }

    /// The last server-confirmed snapshot, used as the rollback target.
    pub fn last_confirmed(&self) -> Option<Vec<CartLineItem>> {
        self.confirmed().snapshot.clone()
    }

    /// False once the store has been reset (logout, expiry, checkout).
    pub fn is_current(&self) -> bool {
        self.cart.lock().epoch() == self.epoch
    }

    fn forget(&self) {
        // ---
        *self.confirmed() = Confirmed::default();
    }

    /// Sends the store's current snapshot as a full replace.
    ///
    /// Without a known cart id there is nothing to write to and this is a
    /// no-op. After the store has been reset the write is dropped and the
    /// confirmed state is forgotten, so the old cart is never overwritten.
    ///
    /// # Errors
    /// [`StorefrontError::RemoteUnavailable`] after the local snapshot has
    /// been rolled back and the error notification emitted.
    pub async fn write_snapshot(&self) -> StorefrontResult<()> {
        // ---
        let Some(cart_id) = self.cart_id() else {
            tracing::debug!("No remote cart id yet; skipping cart write");
            return Ok(());
        };

        let (snapshot, products) = {
            let store = self.cart.lock();
            if store.epoch() != self.epoch {
                drop(store);
                tracing::debug!("Cart {} was reset; dropping stale write", cart_id);
                self.forget();
                return Ok(());
            }
            (store.snapshot(), store.product_refs())
        };

        let start = Instant::now();
        match self.api.update_cart(cart_id, &products).await {
            Ok(_) => {
                self.metrics.record_cart_write(start, WriteOutcome::Ok);
                tracing::debug!("Cart {} synced ({} lines)", cart_id, products.len());
                if self.is_current() {
                    self.confirmed().snapshot = Some(snapshot);
                }
                Ok(())
            }
            Err(e) => {
                self.metrics.record_cart_write(start, WriteOutcome::Error);
                tracing::warn!("Cart {} write failed: {:#}", cart_id, e);
                self.rollback();
                self.notifier.notify(Notification::error(UPDATE_FAILED));
                Err(StorefrontError::remote(e))
            }
        }
    }

    fn rollback(&self) {
        // ---
        let Some(snapshot) = self.last_confirmed() else {
            tracing::warn!("No confirmed cart snapshot to roll back to");
            return;
        };
        let mut store = self.cart.lock();
        if store.epoch() != self.epoch {
            // Reset while the write was in flight; keep the empty cart.
            return;
        }
        if let Err(e) = store.restore(snapshot) {
            tracing::error!("Cart rollback failed: {}", e);
        }
    }
}

/// A mounted cart view: the store plus its sync engine and debounce timer.
///
/// Dropping the session cancels a pending debounced write (in-flight writes
/// finish on their own) and ends the mount.
pub struct CartSession {
    // ---
    cart: SharedCart,
    engine: Arc<SyncEngine>,
    debouncer: Debouncer,
    notifier: NotifierPtr,
    init_source: InitSource,
}

impl CartSession {
    // ---
    /// Fetches the user's remote cart and initializes the store from the
    /// session cache or, failing that, the remote snapshot.
    ///
    /// A failed fetch is reported and the cart still mounts from the cache;
    /// writes are skipped until a cart id is known.
    ///
    /// # Errors
    /// Only a failing session cache write ([`StorefrontError::Storage`]).
    pub async fn mount(
        api: ApiPtr,
        cart: SharedCart,
        notifier: NotifierPtr,
        metrics: MetricsPtr,
        config: &SyncConfig,
        user_id: u64,
    ) -> StorefrontResult<Self> {
        // ---
        let engine = Arc::new(SyncEngine::new(
            api.clone(),
            cart.clone(),
            notifier.clone(),
            metrics,
        ));

        let remote = match api.get_cart_by_user(user_id).await {
            Ok(remote) => {
                engine.set_confirmed(remote.id, remote.products.clone());
                Some(remote)
            }
            Err(e) => {
                tracing::warn!("Failed to load cart for user {}: {:#}", user_id, e);
                notifier.notify(Notification::error(LOAD_FAILED));
                None
            }
        };

        let init_source = cart.lock().initialize(remote.as_ref())?;
        tracing::info!("Cart mounted for user {} ({:?})", user_id, init_source);

        Ok(Self {
            cart,
            engine,
            debouncer: Debouncer::new(config.debounce),
            notifier,
            init_source,
        })
    }

    pub fn init_source(&self) -> InitSource {
        self.init_source
    }

    pub fn cart(&self) -> &SharedCart {
        &self.cart
    }

    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    pub fn cart_id(&self) -> Option<u64> {
        self.engine.cart_id()
    }

    pub fn items(&self) -> Vec<CartLineItem> {
        self.cart.snapshot()
    }

    pub fn is_sync_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    // ============================================================
    // Debounced edits
    // ============================================================

    pub fn increase(&self, product_id: u64) -> StorefrontResult<bool> {
        // ---
        let changed = self.cart.lock().increase(product_id)?;
        if changed {
            self.schedule_sync();
        }
        Ok(changed)
    }

    pub fn decrease(&self, product_id: u64) -> StorefrontResult<bool> {
        // ---
        let changed = self.cart.lock().decrease(product_id)?;
        if changed {
            self.schedule_sync();
        }
        Ok(changed)
    }

    fn schedule_sync(&self) {
        // ---
        let store = self.cart.lock();
        if store.items().is_empty() || store.epoch() != self.engine.epoch {
            return;
        }
        drop(store);
        let engine = Arc::clone(&self.engine);
        self.debouncer.schedule(move || async move {
            // Failure is already rolled back and reported.
            let _ = engine.write_snapshot().await;
        });
    }

    // ============================================================
    // Immediate edits
    // ============================================================

    /// Removes one line and writes the result right away.
    ///
    /// Returns the spawned write, or `None` if the line was not in the cart.
    /// A pending debounced write is left alone.
    pub fn remove(&self, product_id: u64) -> StorefrontResult<Option<JoinHandle<()>>> {
        // ---
        if !self.cart.lock().remove(product_id)? {
            return Ok(None);
        }
        self.notifier
            .notify(Notification::success("Item removed from cart!"));
        Ok(Some(self.spawn_write()))
    }

    /// Removes several lines with one cache write and one remote write.
    pub fn remove_many(&self, product_ids: &[u64]) -> StorefrontResult<Option<JoinHandle<()>>> {
        // ---
        if !self.cart.lock().remove_many(product_ids)? {
            return Ok(None);
        }
        self.notifier
            .notify(Notification::success("Selected items removed from cart!"));
        Ok(Some(self.spawn_write()))
    }

    /// Removes the selected lines.
    pub fn remove_selected(&self) -> StorefrontResult<Option<JoinHandle<()>>> {
        // ---
        if !self.cart.lock().remove_selected()? {
            return Ok(None);
        }
        self.notifier
            .notify(Notification::success("Selected items removed from cart!"));
        Ok(Some(self.spawn_write()))
    }

    fn spawn_write(&self) -> JoinHandle<()> {
        // ---
        let engine = Arc::clone(&self.engine);
        tokio::spawn(async move {
            let _ = engine.write_snapshot().await;
        })
    }

    /// Cancels the pending debounced write and performs it now.
    ///
    /// # Errors
    /// [`StorefrontError::RemoteUnavailable`] if the write failed (already
    /// rolled back and reported).
    pub async fn flush(&self) -> StorefrontResult<()> {
        // ---
        if !self.debouncer.is_pending() {
            return Ok(());
        }
        self.debouncer.cancel();
        self.engine.write_snapshot().await
    }

    // ============================================================
    // Selection
    // ============================================================

    pub fn toggle_select(&self, product_id: u64) -> bool {
        self.cart.lock().toggle_select(product_id)
    }

    pub fn clear_selection(&self) {
        self.cart.lock().clear_selection();
    }

    /// What the "Proceed to Checkout" action hands over, or `None` while
    /// nothing is selected (the action is disabled).
    pub fn checkout_selection(&self) -> Option<CheckoutSelection> {
        // ---
        self.cart.lock().checkout_selection(self.cart_id())
    }
}

impl Drop for CartSession {
    fn drop(&mut self) {
        // ---
        self.debouncer.cancel();
        let mut store = self.cart.lock();
        // After a reset the store may already belong to a newer mount.
        if store.epoch() == self.engine.epoch {
            store.unmount();
        }
        tracing::debug!("Cart unmounted");
    }
}

// ============================================================
// Tests
// ============================================================
