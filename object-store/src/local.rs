use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use blob_driver::UrlOptions;

use crate::{ObjectReader, ObjectStore, ObjectStoreError, SegmentRef, DEFAULT_CHUNK_SIZE};

/// Object store backend that stores objects as files under a root directory.
///
/// Manifests are materialized: `write_manifest` concatenates the segment
/// files into the target object, so reads need no manifest resolution.
/// Temporary URLs are `file://` URLs; their expiry is not enforced.
#[derive(Debug)]
pub struct LocalObjectStore {
    root: Utf8PathBuf,
    chunk_size: usize,
    prefix: String,
}

impl LocalObjectStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            prefix: String::new(),
        }
    }

    /// Set the chunk size streaming writers should batch up to.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the object-name prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn path(&self, object: &Utf8Path) -> Utf8PathBuf {
        self.root.join(object)
    }
}

#[async_trait::async_trait]
impl ObjectStore for LocalObjectStore {
    fn name(&self) -> &'static str {
        "local"
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn write(&self, object: &Utf8Path, data: &[u8]) -> Result<String, ObjectStoreError> {
        let path = self.path(object);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ObjectStoreError::io(self.name(), object))?;
        }
        tokio::fs::write(&path, data)
            .await
            .map_err(ObjectStoreError::io(self.name(), object))?;
        tracing::trace!(%object, size = data.len(), "stored object at {path}");
        Ok(hex::encode(Sha256::digest(data)))
    }

    async fn read(&self, object: &Utf8Path, offset: u64) -> Result<ObjectReader, ObjectStoreError> {
        let path = self.path(object);
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(ObjectStoreError::io(self.name(), object))?;
        if offset > 0 {
            file.seek(std::io::SeekFrom::Start(offset))
                .await
                .map_err(ObjectStoreError::io(self.name(), object))?;
        }
        Ok(Box::new(tokio::io::BufReader::new(file)))
    }

    async fn delete_all(&self, prefix: &str) -> Result<(), ObjectStoreError> {
        let path = self.root.join(prefix.trim_end_matches('/'));
        match tokio::fs::remove_dir_all(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ObjectStoreError::Io {
                backend: self.name(),
                source: err,
            }),
        }
    }

    async fn write_manifest(
        &self,
        object: &Utf8Path,
        segments: &[SegmentRef],
    ) -> Result<(), ObjectStoreError> {
        let path = self.path(object);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(ObjectStoreError::io(self.name(), object))?;
        }

        let mut target = tokio::fs::File::create(&path)
            .await
            .map_err(ObjectStoreError::io(self.name(), object))?;
        for segment in segments {
            let mut source = tokio::fs::File::open(self.path(&segment.object))
                .await
                .map_err(ObjectStoreError::io(self.name(), &segment.object))?;
            tokio::io::copy(&mut source, &mut target)
                .await
                .map_err(ObjectStoreError::io(self.name(), object))?;
        }
        target
            .shutdown()
            .await
            .map_err(ObjectStoreError::io(self.name(), object))?;
        tracing::trace!(%object, segments = segments.len(), "materialized manifest at {path}");
        Ok(())
    }

    async fn temp_url(
        &self,
        object: &Utf8Path,
        _options: &UrlOptions,
    ) -> Result<String, ObjectStoreError> {
        Ok(format!("file://{}", self.path(object)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    fn test_store(dir: &tempfile::TempDir) -> LocalObjectStore {
        LocalObjectStore::new(Utf8PathBuf::from(dir.path().to_str().unwrap()))
    }

    async fn read_all(mut reader: ObjectReader) -> Vec<u8> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        data
    }

    #[tokio::test]
    async fn write_then_read_with_offset() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let object = Utf8Path::new("loc/content");

        store.write(object, b"hello world").await.unwrap();

        let data = read_all(store.read(object, 0).await.unwrap()).await;
        assert_eq!(&data, b"hello world");

        let data = read_all(store.read(object, 6).await.unwrap()).await;
        assert_eq!(&data, b"world");
    }

    #[tokio::test]
    async fn read_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);
        let err = store.read(Utf8Path::new("nope"), 0).await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn manifest_materializes_segments() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        let mut segments = Vec::new();
        for (number, chunk) in [b"aa".as_slice(), b"bb"].iter().enumerate() {
            let object = Utf8PathBuf::from(format!("loc/{:016}", number + 1));
            let hash = store.write(&object, chunk).await.unwrap();
            segments.push(SegmentRef {
                object,
                size: chunk.len() as u64,
                hash,
            });
        }

        let target = Utf8Path::new("loc/content");
        store.write_manifest(target, &segments).await.unwrap();

        let data = read_all(store.read(target, 0).await.unwrap()).await;
        assert_eq!(&data, b"aabb");
    }

    #[tokio::test]
    async fn delete_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = test_store(&dir);

        store.write(Utf8Path::new("loc/content"), b"x").await.unwrap();
        store.delete_all("loc/").await.unwrap();
        assert!(store.read(Utf8Path::new("loc/content"), 0).await.is_err());

        // already gone
        store.delete_all("loc/").await.unwrap();
    }
}
