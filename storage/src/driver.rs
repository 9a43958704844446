//! The driver facade composing tiering, tree maintenance, and the
//! segmented writer into the path-addressed operation set.

use std::io::Cursor;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use tokio::io::AsyncReadExt;

use blob_driver::{BlobWriter, Driver, DriverError, Metadata, Reader, UrlOptions};
use object_store::{ObjectStore, ObjectStoreError};

use crate::meta::{FileRecord, MetaStore};
use crate::paths;
use crate::tier::Tier;
use crate::writer::{BufferedWriter, SegmentedWriter};

/// Rewrite an object-store not-found error to report the given logical
/// path. The object store knows nothing of logical paths; its internal
/// addressing scheme never reaches callers.
pub(crate) fn reported_at(path: &Utf8Path) -> impl FnOnce(ObjectStoreError) -> DriverError + '_ {
    move |err| {
        if err.is_not_found() {
            DriverError::not_found(path)
        } else {
            DriverError::store(err)
        }
    }
}

/// The hybrid hierarchical blob storage driver.
///
/// The metadata store is the sole authority for the namespace; the object
/// store owns the bytes of externally tiered objects, addressed only by
/// location and segment number.
#[derive(Debug, Clone)]
pub struct HybridDriver {
    pub(crate) meta: MetaStore,
    pub(crate) store: Arc<dyn ObjectStore>,
}

impl HybridDriver {
    /// Build a driver over an already-migrated metadata store and an
    /// object store handle.
    pub fn new(meta: MetaStore, store: Arc<dyn ObjectStore>) -> Self {
        Self { meta, store }
    }

    pub(crate) fn prefix(&self) -> &str {
        self.store.prefix()
    }

    async fn record(&self, path: &Utf8Path) -> Result<Option<FileRecord>, DriverError> {
        self.meta.get(path).await.map_err(DriverError::store)
    }

    /// Look up `path`, treating missing records and directories as
    /// not-found. Content operations only apply to files.
    async fn file_record(&self, path: &Utf8Path) -> Result<FileRecord, DriverError> {
        match self.record(path).await? {
            Some(record) if !record.is_dir() => Ok(record),
            _ => Err(DriverError::not_found(path)),
        }
    }
}

#[async_trait::async_trait]
impl Driver for HybridDriver {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, path: &Utf8Path) -> Result<Vec<u8>, DriverError> {
        let record = self.file_record(path).await?;

        if record.size_bytes == 0 {
            return Ok(Vec::new());
        }
        if let Some(content) = &record.content {
            if !content.is_empty() {
                return Ok(content.clone());
            }
        }

        // too big for the metadata row: read the composed object
        let Some(location) = record.location.as_deref() else {
            return Ok(Vec::new());
        };
        let object = paths::content_object(self.prefix(), location);
        let mut reader = self
            .store
            .read(&object, 0)
            .await
            .map_err(reported_at(path))?;
        let mut data = Vec::with_capacity(record.size_bytes as usize);
        reader
            .read_to_end(&mut data)
            .await
            .map_err(DriverError::store)?;
        Ok(data)
    }

    #[tracing::instrument(skip(self, content), fields(size = content.len()))]
    async fn put(&self, path: &Utf8Path, content: &[u8]) -> Result<(), DriverError> {
        // replace the previous blob, if any; an existing directory's
        // children are deliberately left in place
        if let Some(existing) = self.record(path).await? {
            self.delete_blobs(&existing).await?;
        }

        let (dirname, basename) = paths::split(path);
        let mut record = FileRecord {
            dirname: dirname.to_string(),
            basename,
            size_bytes: content.len() as i64,
            mtime: Utc::now(),
            content: None,
            location: None,
        };

        let external = !content.is_empty() && Tier::for_len(content.len()) == Tier::External;
        if external {
            record.location = Some(paths::random_location()?);
        } else if !content.is_empty() {
            record.content = Some(content.to_vec());
        }

        self.write_record(&record).await?;

        if external {
            let location = record.location.as_deref().unwrap_or_default();
            let object = paths::content_object(self.prefix(), location);
            self.store
                .write(&object, content)
                .await
                .map_err(reported_at(path))?;
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn reader(&self, path: &Utf8Path, offset: u64) -> Result<Reader, DriverError> {
        let record = self.file_record(path).await?;

        // fast path: no byte reads at all when the offset is past the end
        if offset > record.size_bytes.max(0) as u64 {
            return Ok(Box::new(Cursor::new(Vec::new())));
        }

        match record.location.as_deref() {
            None => {
                let data = record.content.unwrap_or_default();
                let data = if offset as usize >= data.len() {
                    Vec::new()
                } else {
                    data[offset as usize..].to_vec()
                };
                Ok(Box::new(Cursor::new(data)))
            }
            Some(location) => {
                let object = paths::content_object(self.prefix(), location);
                self.store
                    .read(&object, offset)
                    .await
                    .map_err(reported_at(path))
            }
        }
    }

    #[tracing::instrument(skip(self))]
    async fn writer(
        &self,
        path: &Utf8Path,
        append: bool,
    ) -> Result<Box<dyn BlobWriter>, DriverError> {
        let inner = SegmentedWriter::open(self.clone(), path, append).await?;
        Ok(Box::new(BufferedWriter::new(inner, self.store.chunk_size())))
    }

    #[tracing::instrument(skip(self))]
    async fn stat(&self, path: &Utf8Path) -> Result<Metadata, DriverError> {
        // liveness probes stat the root even though no root record exists
        if path.as_str() == "/" {
            return Ok(Metadata {
                path: Utf8PathBuf::from("/"),
                size: 0,
                is_dir: true,
                modified: DateTime::<Utc>::UNIX_EPOCH,
            });
        }

        match self.record(path).await? {
            None => Err(DriverError::not_found(path)),
            Some(record) => Ok(Metadata {
                path: record.path(),
                size: record.size_bytes.max(0) as u64,
                is_dir: record.is_dir(),
                modified: record.mtime,
            }),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list(&self, path: &Utf8Path) -> Result<Vec<Utf8PathBuf>, DriverError> {
        let names = self
            .meta
            .child_names(path)
            .await
            .map_err(DriverError::store)?;
        Ok(names.iter().map(|name| path.join(name)).collect())
    }

    #[tracing::instrument(skip(self))]
    async fn rename(&self, src: &Utf8Path, dst: &Utf8Path) -> Result<(), DriverError> {
        let source = match self.record(src).await? {
            None => return Err(DriverError::not_found(src)),
            Some(record) => record,
        };

        // overwrite semantics: anything at the destination goes first
        if let Some(existing) = self.record(dst).await? {
            self.delete_subtree(existing).await?;
        }

        // only the record's own key moves; a renamed directory's
        // descendants keep their old dirnames and drop out of the new
        // subtree. Now-empty ancestors of the source are not pruned.
        self.meta
            .rename(&source.path(), dst)
            .await
            .map_err(DriverError::store)?;

        let (parent, _) = paths::split(dst);
        self.ensure_ancestors(&parent).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, path: &Utf8Path) -> Result<(), DriverError> {
        match self.record(path).await? {
            None => Ok(()), // nothing to do
            Some(record) => self.delete_subtree(record).await,
        }
    }

    #[tracing::instrument(skip(self))]
    async fn url_for(&self, path: &Utf8Path, options: UrlOptions) -> Result<String, DriverError> {
        let record = match self.record(path).await? {
            None => return Err(DriverError::not_found(path)),
            Some(record) => record,
        };

        // only externally tiered content has an address to hand out
        let Some(location) = record.location.as_deref() else {
            return Err(DriverError::unsupported(path));
        };
        let object = paths::content_object(self.prefix(), location);
        self.store
            .temp_url(&object, &options)
            .await
            .map_err(reported_at(path))
    }
}
