//! The authoritative in-memory cart for the active session.
//!
//! Every mutation is one synchronous transition: compute the next snapshot,
//! write it through to the session cache, then swap it in and publish the
//! aggregate count. If the cache write fails nothing changes.

use super::count::CartCounter;
use crate::domain::{Cart, CartLineItem, CartProductRef, StoragePtr};
use crate::error::{StorefrontError, StorefrontResult};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Session-scoped storage key holding the serialized cart snapshot.
pub const CART_CACHE_KEY: &str = "cart_items";

/// Where the snapshot came from on initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitSource {
    /// The store was already initialized for this mount; nothing changed.
    AlreadyInitialized,
    /// The session cache was non-empty and won outright.
    Cache,
    /// The cache was empty and the remote snapshot seeded memory and cache.
    Remote,
    /// Neither source had any lines.
    Empty,
}

/// The selected lines handed to checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSelection {
    // ---
    pub items: Vec<CartLineItem>,
    pub total: Decimal,
    pub cart_id: Option<u64>,
}

pub struct CartStore {
    // ---
    items: Vec<CartLineItem>,
    selected: BTreeSet<u64>,
    initialized: bool,
    /// Bumped by every reset; writes prepared for an older epoch are stale.
    epoch: u64,
    cache: StoragePtr,
    counter: CartCounter,
}

impl CartStore {
    // ---
    pub fn new(cache: StoragePtr, counter: CartCounter) -> Self {
        // ---
        Self {
            items: Vec::new(),
            selected: BTreeSet::new(),
            initialized: false,
            epoch: 0,
            cache,
            counter,
        }
    }

    // ============================================================
    // Reads
    // ============================================================

    pub fn items(&self) -> &[CartLineItem] {
        &self.items
    }

    pub fn snapshot(&self) -> Vec<CartLineItem> {
        self.items.clone()
    }

    /// The `(id, quantity)` payload for a full-replace remote write.
    pub fn product_refs(&self) -> Vec<CartProductRef> {
        self.items.iter().map(CartProductRef::from).collect()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Sum of quantities.
    pub fn item_count(&self) -> u32 {
        // ---
        self.items.iter().map(|i| i.quantity).sum()
    }

    /// Number of resets so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn counter(&self) -> &CartCounter {
        &self.counter
    }

    pub fn is_selected(&self, product_id: u64) -> bool {
        self.selected.contains(&product_id)
    }

    pub fn selected_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.selected.iter().copied()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    pub fn is_any_selected(&self) -> bool {
        !self.selected.is_empty()
    }

    pub fn selected_items(&self) -> Vec<CartLineItem> {
        // ---
        self.items
            .iter()
            .filter(|i| self.selected.contains(&i.id))
            .cloned()
            .collect()
    }

    /// Sum of line totals over the selected lines.
    pub fn selected_subtotal(&self) -> Decimal {
        // ---
        self.items
            .iter()
            .filter(|i| self.selected.contains(&i.id))
            .map(CartLineItem::line_total)
            .sum()
    }

    /// The checkout hand-off, or `None` when nothing is selected.
    pub fn checkout_selection(&self, cart_id: Option<u64>) -> Option<CheckoutSelection> {
        // ---
        if self.selected.is_empty() {
            return None;
        }
        Some(CheckoutSelection {
            items: self.selected_items(),
            total: self.selected_subtotal(),
            cart_id,
        })
    }

    // ============================================================
    // Initialization
    // ============================================================

    /// Seeds the store once per mount.
    ///
    /// A non-empty session cache wins outright and `remote` is ignored.
    /// Otherwise the remote snapshot seeds both memory and cache.
    pub fn initialize(&mut self, remote: Option<&Cart>) -> StorefrontResult<InitSource> {
        // ---
        if self.initialized {
            return Ok(InitSource::AlreadyInitialized);
        }

        let cached = self.load_cache();
        let source = if !cached.is_empty() {
            tracing::debug!("Cart seeded from session cache ({} lines)", cached.len());
            // Rewrite so a cache with merged duplicates matches memory.
            self.commit(cached)?;
            InitSource::Cache
        } else if let Some(cart) = remote.filter(|c| !c.products.is_empty()) {
            tracing::debug!(
                "Cart seeded from remote cart {} ({} lines)",
                cart.id,
                cart.products.len()
            );
            self.commit(normalize(cart.products.clone()))?;
            InitSource::Remote
        } else {
            self.items.clear();
            self.publish_count();
            InitSource::Empty
        };

        self.initialized = true;
        Ok(source)
    }

    /// Marks the current mount as finished so the next mount initializes again.
    pub fn unmount(&mut self) {
        // ---
        self.initialized = false;
        self.selected.clear();
    }

    fn load_cache(&self) -> Vec<CartLineItem> {
        // ---
        let raw = match self.cache.get(CART_CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                tracing::warn!("Failed to read cart cache: {:#}", e);
                return Vec::new();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(items) => normalize(items),
            Err(e) => {
                tracing::warn!("Discarding unreadable cart cache: {}", e);
                Vec::new()
            }
        }
    }

    // ============================================================
    // Mutations
    // ============================================================

    /// Adds one to the line's quantity. Returns whether anything changed.
    pub fn increase(&mut self, product_id: u64) -> StorefrontResult<bool> {
        // ---
        self.update_quantity(product_id, |q| q.checked_add(1))
    }

    /// Subtracts one from the line's quantity, never going below 1.
    pub fn decrease(&mut self, product_id: u64) -> StorefrontResult<bool> {
        // ---
        self.update_quantity(product_id, |q| (q > 1).then(|| q - 1))
    }

    fn update_quantity(
        &mut self,
        product_id: u64,
        next_quantity: impl Fn(u32) -> Option<u32>,
    ) -> StorefrontResult<bool> {
        // ---
        let Some(pos) = self.items.iter().position(|i| i.id == product_id) else {
            return Ok(false);
        };
        let Some(quantity) = next_quantity(self.items[pos].quantity) else {
            return Ok(false);
        };

        let mut next = self.items.clone();
        next[pos].quantity = quantity;
        self.commit(next)?;
        Ok(true)
    }

    /// Removes the line and drops it from the selection.
    pub fn remove(&mut self, product_id: u64) -> StorefrontResult<bool> {
        // ---
        self.remove_many(&[product_id])
    }

    /// Removes every listed line with a single cache write.
    pub fn remove_many(&mut self, product_ids: &[u64]) -> StorefrontResult<bool> {
        // ---
        let next: Vec<CartLineItem> = self
            .items
            .iter()
            .filter(|i| !product_ids.contains(&i.id))
            .cloned()
            .collect();

        if next.len() == self.items.len() {
            return Ok(false);
        }

        self.commit(next)?;
        for id in product_ids {
            self.selected.remove(id);
        }
        Ok(true)
    }

    /// Removes every selected line.
    pub fn remove_selected(&mut self) -> StorefrontResult<bool> {
        // ---
        let ids: Vec<u64> = self.selected.iter().copied().collect();
        let removed = self.remove_many(&ids)?;
        self.selected.clear();
        Ok(removed)
    }

    /// Merges a line added from outside the cart view.
    ///
    /// An existing line gains the added quantity; a new line is appended.
    /// When no cart view is mounted the merge applies to the cached snapshot,
    /// so lines cached by an earlier mount are kept.
    pub fn add_line(&mut self, line: CartLineItem) -> StorefrontResult<()> {
        // ---
        let mut next = if self.initialized {
            self.items.clone()
        } else {
            self.load_cache()
        };

        match next.iter_mut().find(|i| i.id == line.id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(line.quantity),
            None => next.push(line),
        }
        self.commit(next)
    }

    /// Replaces the whole snapshot, e.g. with the last server-confirmed one.
    pub fn restore(&mut self, snapshot: Vec<CartLineItem>) -> StorefrontResult<()> {
        // ---
        self.commit(normalize(snapshot))?;
        let items = &self.items;
        self.selected.retain(|id| items.iter().any(|i| i.id == *id));
        Ok(())
    }

    /// Empties memory, selection and cache, publishes a zero count and starts
    /// a new epoch, so sync work belonging to the old cart is dropped.
    ///
    /// The in-memory state is cleared even if the cache removal fails.
    pub fn reset(&mut self) -> StorefrontResult<()> {
        // ---
        self.items.clear();
        self.selected.clear();
        self.initialized = false;
        self.epoch = self.epoch.wrapping_add(1);
        self.publish_count();

        self.cache
            .remove(CART_CACHE_KEY)
            .map_err(StorefrontError::storage)
    }

    // ============================================================
    // Selection
    // ============================================================

    /// Flips the selection of a line present in the cart.
    pub fn toggle_select(&mut self, product_id: u64) -> bool {
        // ---
        if !self.items.iter().any(|i| i.id == product_id) {
            return false;
        }
        if !self.selected.remove(&product_id) {
            self.selected.insert(product_id);
        }
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    // ============================================================
    // Internals
    // ============================================================

    /// Write-through: cache first, then memory and count.
    fn commit(&mut self, next: Vec<CartLineItem>) -> StorefrontResult<()> {
        // ---
        let json = serde_json::to_string(&next)
            .map_err(|e| StorefrontError::Storage(format!("serializing cart: {e}")))?;

        self.cache
            .set(CART_CACHE_KEY, &json)
            .map_err(StorefrontError::storage)?;

        self.items = next;
        self.publish_count();
        Ok(())
    }

    fn publish_count(&self) {
        self.counter.set(self.item_count());
    }
}

/// Collapses duplicate product ids into their first line, summing quantities.
fn normalize(items: Vec<CartLineItem>) -> Vec<CartLineItem> {
    // ---
    let mut out: Vec<CartLineItem> = Vec::with_capacity(items.len());
    for item in items {
        match out.iter_mut().find(|i| i.id == item.id) {
            Some(existing) => existing.quantity = existing.quantity.saturating_add(item.quantity),
            None => out.push(item),
        }
    }
    out
}

// ============================================================
// Shared handle
// ============================================================

/// The single cart store instance, shared between the cart session, the
/// session guard and the sync tasks.
#[derive(Clone)]
pub struct SharedCart {
    // ---
    inner: Arc<Mutex<CartStore>>,
}

impl SharedCart {
    // ---
    pub fn new(store: CartStore) -> Self {
        // ---
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    /// Locks the store. Critical sections never await, so a poisoned lock
    /// still guards a fully formed snapshot and is recovered.
    pub fn lock(&self) -> MutexGuard<'_, CartStore> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> Vec<CartLineItem> {
        self.lock().snapshot()
    }
}
