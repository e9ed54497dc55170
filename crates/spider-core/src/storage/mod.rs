//! Persistent key-value storage capability.
//!
//! The session fields and job records are stored as JSON values under
//! string keys. `FileStorage` keeps one JSON file per key on disk;
//! `MemoryStorage` keeps everything in process memory.

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt entry {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Read one key. A missing key is `Ok(None)`.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Write several keys. A `null` value is stored as `null`, not removed.
    async fn set(&self, entries: Vec<(String, Value)>) -> Result<(), StorageError>;

    /// Remove keys; missing keys are ignored.
    async fn remove(&self, keys: &[&str]) -> Result<(), StorageError>;
}
