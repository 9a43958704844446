//! # Hybrid blob storage
//!
//! A [`blob_driver::Driver`] implementation that federates a logical
//! filesystem-like namespace across two backends: a relational metadata
//! store (SQLite via sqlx) that owns the namespace, and an external
//! [`object_store::ObjectStore`] that owns the bytes of large objects.
//!
//! Small content is inlined directly into the metadata row; large content
//! is uploaded to the object store in numbered segments grouped by an
//! opaque, randomly generated location token and composed by a manifest.
//! Directories are emulated with marker rows over the flat
//! (dirname, basename) keyed table.
//!
//! There is no transaction spanning the two backends; the consistency gaps
//! this implies are documented on the operations that expose them.

use serde::Deserialize;

use object_store::ObjectStoreConfig;

mod driver;
mod meta;
mod paths;
mod tier;
mod tree;
mod writer;

pub use driver::HybridDriver;
pub use meta::{FileRecord, MetaStore, SegmentRecord};
pub use tier::{Tier, MAX_INLINE_SIZE};
pub use writer::{BufferedWriter, SegmentedWriter};

#[doc(inline)]
pub use blob_driver::{BlobWriter, Driver, DriverError, Metadata, Reader, UrlOptions, WriterState};

/// Configuration for the hybrid driver.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HybridConfig {
    /// SQLite connection URL for the metadata store.
    pub database_url: String,

    /// The object store backend holding externally tiered content.
    pub object_store: ObjectStoreConfig,
}

impl HybridConfig {
    /// Connect to the metadata store, apply the schema, and build the
    /// driver.
    #[tracing::instrument]
    pub async fn build(self) -> Result<HybridDriver, DriverError> {
        let meta = MetaStore::connect(&self.database_url)
            .await
            .map_err(DriverError::store)?;
        let store = self.object_store.build();
        Ok(HybridDriver::new(meta, store))
    }
}
