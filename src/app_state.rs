//! Application state management.
//!
//! `AppState` is the single owner of everything a storefront session shares:
//! the REST collaborator, both storage scopes, the notifier, metrics, the cart
//! store and the session guard. Views receive it (or pieces of it) instead of
//! reaching for globals.

use crate::cart::{create_shared_cart, CartCounter, CartSession, SharedCart};
use crate::catalog::Catalog;
use crate::checkout::Checkout;
use crate::config::AppConfig;
use crate::domain::{ApiPtr, MetricsPtr, NotifierPtr, StoragePtr};
use crate::error::{StorefrontError, StorefrontResult};
use crate::session::SessionGuard;
use crate::token::TokenStore;

/// Dependency injection container for a storefront session.
///
/// Cheap to clone; every field is a shared handle.
///
/// # Fields
///
/// - `api`: REST collaborator (reqwest in production, a mock in tests)
/// - `durable`: long-lived storage holding the credential and user id
/// - `session_storage`: session-scoped storage holding the cart cache
/// - `cart`: the one cart store, shared by cart views, checkout and the guard
/// - `session`: the session guard and its expiry timer
#[derive(Clone)]
pub struct AppState {
    config: AppConfig,
    api: ApiPtr,
    durable: StoragePtr,
    session_storage: StoragePtr,
    metrics: MetricsPtr,
    notifier: NotifierPtr,
    counter: CartCounter,
    cart: SharedCart,
    session: SessionGuard,
}

impl AppState {
    // ---

    pub fn new(
        config: AppConfig,
        api: ApiPtr,
        durable: StoragePtr,
        session_storage: StoragePtr,
        metrics: MetricsPtr,
        notifier: NotifierPtr,
    ) -> Self {
        // ---
        let counter = CartCounter::new();
        let cart = create_shared_cart(session_storage.clone(), counter.clone());
        let session = SessionGuard::new(
            TokenStore::new(durable.clone()),
            api.clone(),
            cart.clone(),
            notifier.clone(),
            metrics.clone(),
            config.session.check_interval,
        );

        AppState {
            config,
            api,
            durable,
            session_storage,
            metrics,
            notifier,
            counter,
            cart,
            session,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiPtr {
        &self.api
    }

    pub fn durable_storage(&self) -> &StoragePtr {
        &self.durable
    }

    pub fn session_storage(&self) -> &StoragePtr {
        &self.session_storage
    }

    pub fn metrics(&self) -> &MetricsPtr {
        &self.metrics
    }

    pub fn notifier(&self) -> &NotifierPtr {
        &self.notifier
    }

    /// The shared cart count, for badges outside the cart view.
    pub fn cart_counter(&self) -> &CartCounter {
        &self.counter
    }

    pub fn cart(&self) -> &SharedCart {
        &self.cart
    }

    pub fn session(&self) -> &SessionGuard {
        &self.session
    }

    pub fn tokens(&self) -> TokenStore {
        TokenStore::new(self.durable.clone())
    }

    pub fn catalog(&self) -> Catalog {
        // ---
        Catalog::new(
            self.api.clone(),
            self.cart.clone(),
            self.notifier.clone(),
            self.config.catalog.clone(),
        )
    }

    pub fn checkout(&self) -> Checkout {
        Checkout::new(self.api.clone(), self.cart.clone(), self.notifier.clone())
    }

    /// Mounts the cart view for the signed-in user.
    ///
    /// # Errors
    /// [`StorefrontError::NotAuthenticated`] without a resolvable user id, or
    /// [`StorefrontError::Storage`] if the cart cache cannot be written.
    pub async fn mount_cart(&self) -> StorefrontResult<CartSession> {
        // ---
        let user_id = self
            .session
            .user_id()
            .ok_or(StorefrontError::NotAuthenticated)?;

        CartSession::mount(
            self.api.clone(),
            self.cart.clone(),
            self.notifier.clone(),
            self.metrics.clone(),
            &self.config.sync,
            user_id,
        )
        .await
    }
}
