use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use super::{check_title, PatternStore, StoreError};

/// A pattern library that lives only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PatternStore for MemoryStore {
    fn list(&self) -> Result<Vec<String>, StoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }

    fn get(&self, title: &str) -> Result<String, StoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(title)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(title.to_string()))
    }

    fn save(&self, title: &str, pattern_text: &str) -> Result<(), StoreError> {
        check_title(title)?;
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(title.to_string(), pattern_text.to_string());
        Ok(())
    }

    fn delete(&self, title: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries
            .remove(title)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(title.to_string()))
    }
}
