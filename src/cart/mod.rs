mod count;
mod store;
mod sync;

pub use count::CartCounter;
pub use store::{CartStore, CheckoutSelection, InitSource, SharedCart, CART_CACHE_KEY};
pub use sync::{CartSession, SyncEngine};

/// Builds the single cart store for a session on top of the session-scoped cache.
pub fn create_shared_cart(cache: crate::domain::StoragePtr, counter: CartCounter) -> SharedCart {
    // ---
    SharedCart::new(CartStore::new(cache, counter))
}

#[cfg(test)]
pub(crate) use store::tests::{item, remote_cart};
