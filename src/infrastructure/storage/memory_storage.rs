use crate::domain::Storage;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// Storage held in a process-local map.
#[derive(Default)]
pub struct MemoryStorage {
    // ---
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    // ---
    fn get(&self, key: &str) -> Result<Option<String>> {
        // ---
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        // ---
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        // ---
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}
