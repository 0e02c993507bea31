mod api;
mod metrics;
mod models;
mod notifier;
mod storage;

// Publicly expose the Metrics abstraction
pub use metrics::{Metrics, MetricsPtr, WriteOutcome};

// Publicly expose the REST collaborator and client-side persistence abstractions
pub use api::{ApiPtr, StorefrontApi};
pub use notifier::{Notification, NotificationLevel, Notifier, NotifierPtr};
pub use storage::{Storage, StoragePtr};

pub use models::{
    Cart, CartLineItem, CartProductRef, Claims, DeleteCartAck, LoginRequest, LoginResponse,
    Product, ProductsPage, ShippingAddress, UserProfile, UserProfileUpdate,
};
