mod file_storage;
mod memory_storage;

pub use file_storage::FileStorage;
pub use memory_storage::MemoryStorage;

use crate::domain::StoragePtr;
use std::path::PathBuf;
use std::sync::Arc;

/// Creates an in-process storage.
///
/// Lives exactly as long as the process, which is what session-scoped state
/// (the cached cart snapshot) needs.
pub fn create_memory_storage() -> StoragePtr {
    // ---
    Arc::new(MemoryStorage::new())
}

/// Creates a storage backed by a JSON file, for state that must survive
/// restarts (the bearer credential and subject id).
///
/// # Errors
/// Returns an error if an existing file cannot be read or parsed.
pub fn create_file_storage(path: impl Into<PathBuf>) -> anyhow::Result<StoragePtr> {
    // ---
    Ok(Arc::new(FileStorage::open(path)?))
}
