use anyhow::Result;
use std::sync::Arc;

/// Abstraction for durable client-side key/value storage.
///
/// Two instances are used: a long-lived one (bearer credential and the
/// denormalized subject id) and a session-scoped one (the cart snapshot).
/// Calls are synchronous so that writes can be applied in the same state
/// transition as the in-memory mutation they mirror.
pub trait Storage: Send + Sync {
    // ---
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Type alias for any backend that implements Storage.
pub type StoragePtr = Arc<dyn Storage>;
