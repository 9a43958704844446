//! # Object store adapter
//!
//! The backend boundary for externally tiered blob content: streaming reads
//! of byte ranges, whole-object writes, prefix deletes, manifest-based
//! composition of multi-part objects, and temporary-URL issuance.
//!
//! Objects are addressed by opaque object names; the adapter knows nothing
//! of the driver's logical paths. Two backends ship here: an in-memory
//! store used in tests and as a dev backend, and a local-filesystem store.
//! Remote backends are external collaborators behind the same trait.

use std::fmt;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use tokio::io;

use blob_driver::UrlOptions;

mod error;
pub(crate) mod local;
pub(crate) mod memory;

#[doc(inline)]
pub use error::ObjectStoreError;
#[doc(inline)]
pub use local::LocalObjectStore;
#[doc(inline)]
pub use memory::MemoryObjectStore;

/// A reader stream for object contents.
pub type ObjectReader = Box<dyn io::AsyncRead + Unpin + Send + Sync>;

/// Default upload chunk size: 4 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// One entry of an ordered manifest: a previously uploaded object together
/// with the size and hash the store reported for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentRef {
    /// The object name of the segment.
    pub object: Utf8PathBuf,

    /// Segment size in bytes.
    pub size: u64,

    /// The content hash the store produced on upload. Opaque; used for
    /// integrity, never recomputed by callers.
    pub hash: String,
}

/// An object store backend.
///
/// All operations address objects by name only. `write` returns the content
/// hash computed by the store; `write_manifest` composes previously uploaded
/// segments into one logical object that `read` serves back as a single
/// stream.
#[async_trait::async_trait]
pub trait ObjectStore: fmt::Debug + Send + Sync {
    /// The name of the backend.
    fn name(&self) -> &'static str;

    /// The chunk size streaming writers should batch up to.
    fn chunk_size(&self) -> usize;

    /// The configured object-name prefix.
    fn prefix(&self) -> &str;

    /// Store `data` at `object`, returning the content hash.
    async fn write(&self, object: &Utf8Path, data: &[u8]) -> Result<String, ObjectStoreError>;

    /// Read the object at `object`, starting at `offset`.
    ///
    /// An offset past the end of the object yields an empty reader.
    async fn read(&self, object: &Utf8Path, offset: u64) -> Result<ObjectReader, ObjectStoreError>;

    /// Delete every object whose name starts with `prefix`.
    async fn delete_all(&self, prefix: &str) -> Result<(), ObjectStoreError>;

    /// Compose the ordered `segments` into one logical object at `object`.
    async fn write_manifest(
        &self,
        object: &Utf8Path,
        segments: &[SegmentRef],
    ) -> Result<(), ObjectStoreError>;

    /// Issue a temporary capability URL for `object`.
    async fn temp_url(
        &self,
        object: &Utf8Path,
        options: &UrlOptions,
    ) -> Result<String, ObjectStoreError>;
}

/// Configuration for an object store backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectStoreConfig {
    /// In-memory backend, for tests and development.
    Memory {
        /// Object-name prefix.
        #[serde(default)]
        prefix: String,
    },

    /// Local-filesystem backend rooted at a directory.
    Local {
        /// Directory under which objects are stored.
        root: Utf8PathBuf,

        /// Object-name prefix.
        #[serde(default)]
        prefix: String,
    },
}

impl ObjectStoreConfig {
    /// Build the configured backend.
    #[tracing::instrument]
    pub fn build(self) -> Arc<dyn ObjectStore> {
        match self {
            ObjectStoreConfig::Memory { prefix } => {
                Arc::new(MemoryObjectStore::new().with_prefix(prefix))
            }
            ObjectStoreConfig::Local { root, prefix } => {
                Arc::new(LocalObjectStore::new(root).with_prefix(prefix))
            }
        }
    }
}
