//! Key-value persistence port (trait).
//! Defines the interface for persisting advisory UI state across reloads.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage backend error: {0}")]
    Backend(#[from] rusqlite::Error),

    #[error("stored value is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("storage lock poisoned")]
    Poisoned,

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Port for namespaced string key-value storage.
/// A missing key is "no stored state", never an error.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

#[cfg(test)]
pub(crate) mod memory {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    /// In-memory store for tests; can be switched to fail every call.
    #[derive(Default)]
    pub struct MemoryStore {
        pub values: RefCell<HashMap<String, String>>,
        pub failing: Cell<bool>,
    }

    impl MemoryStore {
        fn check(&self) -> Result<(), StorageError> {
            if self.failing.get() {
                Err(StorageError::Unavailable("test failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    impl KeyValueStore for MemoryStore {
        fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.check()?;
            Ok(self.values.borrow().get(key).cloned())
        }

        fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
            self.check()?;
            self.values
                .borrow_mut()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn remove_item(&self, key: &str) -> Result<(), StorageError> {
            self.check()?;
            self.values.borrow_mut().remove(key);
            Ok(())
        }
    }
}
