// src/lib.rs
use anyhow::Result;

// Public exports (visible outside this module)
pub mod domain;

// Internal-only exports (sibling access within this module)
mod app_state;
mod cart;
mod catalog;
mod checkout;
mod config;
mod error;
mod infrastructure;
mod schedule;
mod session;
mod token;

#[cfg(test)]
mod testing;

// Hoist up only the public symbol(s)
pub use app_state::AppState;
pub use cart::{
    create_shared_cart, CartCounter, CartSession, CartStore, CheckoutSelection, InitSource,
    SharedCart, SyncEngine, CART_CACHE_KEY,
};
pub use catalog::{Catalog, ProductFeed};
pub use checkout::{format_card_number, Checkout, CheckoutForm, OrderReceipt, PaymentMethod};
pub use config::*;
pub use error::{FieldError, StorefrontError, StorefrontResult};
pub use schedule::{spawn_interval, Debouncer, TaskHandle};
pub use session::{system_clock, Clock, GateDecision, SessionGuard, SessionState, UserState};
pub use token::{
    credential_is_expired, decode as decode_credential, is_expired, is_expired_at, subject_id,
    validate as validate_credential, SubjectExtractor, TokenStore, ACCESS_TOKEN_KEY,
    SUBJECT_EXTRACTORS, USER_ID_KEY,
};

// Publicly expose the infrastructure creation functions
pub use infrastructure::{
    create_channel_notifier, // ---
    create_file_storage,
    create_log_notifier,
    create_memory_storage,
    create_noop_metrics,
    create_prom_metrics,
    create_rest_api,
};

/// Build the application state with every dependency determined by
/// environment variables.
pub fn create_app_state(notifier: domain::NotifierPtr) -> Result<AppState> {
    // ---
    let config = AppConfig::from_env()?;
    create_app_state_from_config(config, notifier)
}

/// Build the application state from an already loaded configuration.
///
/// The credential lives in a JSON file under the configured storage
/// directory; the cart cache lives in memory for the life of the process.
pub fn create_app_state_from_config(
    config: AppConfig,
    notifier: domain::NotifierPtr,
) -> Result<AppState> {
    // ---
    let metrics = match config.metrics {
        MetricsKind::Prometheus => create_prom_metrics()?,
        MetricsKind::Noop => create_noop_metrics()?,
    };

    let api = create_rest_api(&config.api)?;
    let durable = create_file_storage(config.session.storage_file())?;
    let session_storage = create_memory_storage();

    tracing::info!(
        "Storefront client configured for {} (metrics: {:?})",
        config.api.base_url,
        config.metrics
    );

    Ok(AppState::new(
        config,
        api,
        durable,
        session_storage,
        metrics,
        notifier,
    ))
}
