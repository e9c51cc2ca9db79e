//! Key-value persistence
//!
//! Backends implement [`KeyValueStore`] over raw strings. [`JsonStore`] layers
//! JSON encoding on top and absorbs every failure: callers only ever see
//! `false` or their default value, plus a warning in the log.

pub mod file;
pub mod memory;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying filesystem failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Write would exceed the store's capacity
    #[error("Quota exceeded writing '{key}': need {needed} bytes, {available} available")]
    QuotaExceeded {
        /// Key being written
        key: String,
        /// Bytes the write requires
        needed: usize,
        /// Bytes left in the store
        available: usize,
    },

    /// Key cannot be represented by this backend
    #[error("Invalid key '{0}'")]
    InvalidKey(String),
}

/// String-keyed persistent storage
pub trait KeyValueStore {
    /// Read the value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write `value` under `key`, replacing any previous value
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Delete `key`. Removing a missing key succeeds.
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// JSON adapter over a [`KeyValueStore`]
#[derive(Debug, Default)]
pub struct JsonStore<S> {
    inner: S,
}

impl<S: KeyValueStore> JsonStore<S> {
    /// Wrap a backend
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Borrow the backend
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the backend
    pub fn inner_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Serialize `value` under `key`. Returns false on any failure.
    pub fn save<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> bool {
        let text = match serde_json::to_string(value) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to serialize value");
                return false;
            }
        };
        self.save_raw(key, &text)
    }

    /// Load and decode `key`, falling back to `default` if absent or unreadable
    pub fn load<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        let Some(text) = self.load_raw(key) else {
            return default;
        };
        match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to parse stored value");
                default
            }
        }
    }

    /// Load and decode `key`, falling back to `T::default()`
    pub fn load_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.load(key, T::default())
    }

    /// Write a plain string without JSON encoding
    pub fn save_raw(&mut self, key: &str, text: &str) -> bool {
        match self.inner.set(key, text) {
            Ok(()) => {
                tracing::debug!(key, bytes = text.len(), "Saved");
                true
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to save");
                false
            }
        }
    }

    /// Read a plain string without JSON decoding
    pub fn load_raw(&self, key: &str) -> Option<String> {
        match self.inner.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read");
                None
            }
        }
    }

    /// Delete `key`. Returns false on failure.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.inner.remove(key) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to remove");
                false
            }
        }
    }
}
