//! Durable client-side storage for the hub.
//!
//! Any backend that can get and set string blobs by key will do:
//! - [`MemoryStorage`] for tests and ephemeral runs
//! - [`FileStorage`] for a JSON file under the hub base directory
//!
//! [`ProjectPersistence`] layers the projects projection on top.

mod file;
mod memory;
mod persisted;
mod traits;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use persisted::{PersistedProjects, ProjectPersistence, PROJECTS_STORAGE_KEY};
pub use traits::KeyValueStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
