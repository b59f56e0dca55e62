//! The content-addressed artifact store boundary.
//!
//! Stores hold opaque byte blobs addressed by [`ArtifactPath`]. Implementations must be
//! shareable across worker threads; every writer targets a distinct key, so no locking is
//! required beyond what an implementation needs for its own bookkeeping.

mod local;
mod memory;
pub(crate) mod uri;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use uri::{ArtifactKind, ArtifactPath, PathError, StorageUri};

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Artifact '{0}' does not exist")]
    NotFound(String),
    #[error("Store is unavailable: {0}")]
    Unavailable(String),
    #[error("I/O error on artifact '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

pub trait ArtifactStore: Send + Sync {
    /// Whether an artifact exists at `path`.
    ///
    /// An `Err` means the store could not be asked, which callers must not read as absence.
    fn exists(&self, path: &ArtifactPath) -> Result<bool, StoreError>;

    fn get(&self, path: &ArtifactPath) -> Result<Vec<u8>, StoreError>;

    fn put(&self, path: &ArtifactPath, bytes: &[u8]) -> Result<(), StoreError>;

    /// Every stored artifact whose path starts with `prefix`, in lexicographic order.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}
