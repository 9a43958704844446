use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;

use blob_driver::UrlOptions;

use crate::{ObjectReader, ObjectStore, ObjectStoreError, SegmentRef, DEFAULT_CHUNK_SIZE};

#[derive(Debug, Clone)]
enum MemoryObject {
    Blob(Vec<u8>),
    Manifest(Vec<SegmentRef>),
}

/// Object store backend that keeps everything in memory.
///
/// Used as the test double and development backend. Manifest objects are
/// stored as their segment list and resolved on read by concatenating the
/// segments in order. The number of `write` calls is recorded so tests can
/// assert on tiering behavior.
#[derive(Debug)]
pub struct MemoryObjectStore {
    objects: RwLock<HashMap<Utf8PathBuf, MemoryObject>>,
    writes: AtomicUsize,
    chunk_size: usize,
    prefix: String,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    /// Create an empty store with the default chunk size and no prefix.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            writes: AtomicUsize::new(0),
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

    /// Number of `write` calls observed so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// The names of all stored objects, including manifests.
    pub async fn object_names(&self) -> Vec<Utf8PathBuf> {
        let objects = self.objects.read().await;
        let mut names: Vec<_> = objects.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolve an object to its full content, following manifests.
    async fn resolve(&self, object: &Utf8Path) -> Result<Vec<u8>, ObjectStoreError> {
        let objects = self.objects.read().await;
        match objects.get(object) {
            None => Err(ObjectStoreError::not_found(object)),
            Some(MemoryObject::Blob(data)) => Ok(data.clone()),
            Some(MemoryObject::Manifest(segments)) => {
                let mut data = Vec::new();
                for segment in segments {
                    match objects.get(&segment.object) {
                        Some(MemoryObject::Blob(bytes)) => data.extend_from_slice(bytes),
                        _ => return Err(ObjectStoreError::not_found(&segment.object)),
                    }
                }
                Ok(data)
            }
        }
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn write(&self, object: &Utf8Path, data: &[u8]) -> Result<String, ObjectStoreError> {
        let hash = hex::encode(Sha256::digest(data));
        let mut objects = self.objects.write().await;
        objects.insert(object.to_owned(), MemoryObject::Blob(data.to_vec()));
        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%object, size = data.len(), "stored object in memory");
        Ok(hash)
    }

    async fn read(&self, object: &Utf8Path, offset: u64) -> Result<ObjectReader, ObjectStoreError> {
        let data = self.resolve(object).await?;
        let data = if offset as usize >= data.len() {
            Vec::new()
        } else {
            data[offset as usize..].to_vec()
        };
        Ok(Box::new(Cursor::new(data)))
    }

    async fn delete_all(&self, prefix: &str) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.write().await;
        objects.retain(|name, _| !name.as_str().starts_with(prefix));
        Ok(())
    }

    async fn write_manifest(
        &self,
        object: &Utf8Path,
        segments: &[SegmentRef],
    ) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.write().await;
        objects.insert(object.to_owned(), MemoryObject::Manifest(segments.to_vec()));
        tracing::trace!(%object, segments = segments.len(), "stored manifest in memory");
        Ok(())
    }

    async fn temp_url(
        &self,
        object: &Utf8Path,
        options: &UrlOptions,
    ) -> Result<String, ObjectStoreError> {
        Ok(format!(
            "memory:///{object}?method={}&expires={}",
            options.method,
            options.expiry.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    async fn read_all(mut reader: ObjectReader) -> Vec<u8> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await.unwrap();
        data
    }

    #[tokio::test]
    async fn write_then_read_with_offset() {
        let store = MemoryObjectStore::new();
        let object = Utf8Path::new("loc/content");

        let hash = store.write(object, b"hello world").await.unwrap();
        assert_eq!(hash, hex::encode(Sha256::digest(b"hello world")));

        let data = read_all(store.read(object, 0).await.unwrap()).await;
        assert_eq!(&data, b"hello world");

        let data = read_all(store.read(object, 6).await.unwrap()).await;
        assert_eq!(&data, b"world");

        let data = read_all(store.read(object, 100).await.unwrap()).await;
        assert!(data.is_empty());
    }

    #[tokio::test]
    async fn read_missing_object() {
        let store = MemoryObjectStore::new();
        let err = store.read(Utf8Path::new("nope"), 0).await.err().unwrap();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn manifest_concatenates_segments_in_order() {
        let store = MemoryObjectStore::new();
        let mut segments = Vec::new();
        for (number, chunk) in [b"aa".as_slice(), b"bb", b"cc"].iter().enumerate() {
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
        assert_eq!(&data, b"aabbcc");

        let data = read_all(store.read(target, 3).await.unwrap()).await;
        assert_eq!(&data, b"bcc");
    }

    #[tokio::test]
    async fn delete_all_removes_by_prefix() {
        let store = MemoryObjectStore::new();
        store.write(Utf8Path::new("a/1"), b"x").await.unwrap();
        store.write(Utf8Path::new("a/2"), b"y").await.unwrap();
        store.write(Utf8Path::new("b/1"), b"z").await.unwrap();

        store.delete_all("a/").await.unwrap();

        assert!(store.read(Utf8Path::new("a/1"), 0).await.is_err());
        assert!(store.read(Utf8Path::new("a/2"), 0).await.is_err());
        assert!(store.read(Utf8Path::new("b/1"), 0).await.is_ok());
    }

    #[tokio::test]
    async fn write_count_tracks_uploads() {
        let store = MemoryObjectStore::new();
        assert_eq!(store.write_count(), 0);
        store.write(Utf8Path::new("a"), b"x").await.unwrap();
        store.write(Utf8Path::new("b"), b"y").await.unwrap();
        assert_eq!(store.write_count(), 2);
    }
}
