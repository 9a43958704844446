//! End-to-end tests of the hybrid driver over an in-memory metadata store
//! and in-memory object store.

use std::sync::Arc;

use tokio::io::AsyncReadExt;

use object_store::MemoryObjectStore;
use storage::{
    BlobWriter, Driver, DriverError, HybridDriver, MetaStore, UrlOptions, MAX_INLINE_SIZE,
};

async fn driver_with_store(chunk_size: usize) -> (HybridDriver, Arc<MemoryObjectStore>) {
    let meta = MetaStore::in_memory().await.expect("in-memory metadata");
    let store = Arc::new(
        MemoryObjectStore::new()
            .with_chunk_size(chunk_size)
            .with_prefix("files"),
    );
    (HybridDriver::new(meta, store.clone()), store)
}

async fn read_all(driver: &HybridDriver, path: &str, offset: u64) -> Vec<u8> {
    let mut reader = driver
        .reader(path.as_ref(), offset)
        .await
        .expect("open reader");
    let mut out = Vec::new();
    reader.read_to_end(&mut out).await.expect("read body");
    out
}

#[tokio::test]
async fn small_blob_stays_inline() {
    let (driver, store) = driver_with_store(1024).await;
    let body = vec![7u8; MAX_INLINE_SIZE];

    driver.put("/v2/repo/tiny".as_ref(), &body).await.unwrap();

    assert_eq!(store.write_count(), 0, "inline content must not hit the store");
    assert_eq!(driver.get("/v2/repo/tiny".as_ref()).await.unwrap(), body);

    let meta = driver.stat("/v2/repo/tiny".as_ref()).await.unwrap();
    assert_eq!(meta.size, MAX_INLINE_SIZE as u64);
    assert!(!meta.is_dir);
}

#[tokio::test]
async fn large_blob_goes_external() {
    let (driver, store) = driver_with_store(1024).await;
    let body = vec![9u8; MAX_INLINE_SIZE + 1];

    driver.put("/v2/repo/big".as_ref(), &body).await.unwrap();

    assert_eq!(store.write_count(), 1);
    assert_eq!(driver.get("/v2/repo/big".as_ref()).await.unwrap(), body);
}

#[tokio::test]
async fn put_creates_ancestor_directories() {
    let (driver, _store) = driver_with_store(1024).await;

    driver.put("/a/b/c/leaf".as_ref(), b"data").await.unwrap();

    for dir in ["/", "/a", "/a/b", "/a/b/c"] {
        let meta = driver.stat(dir.as_ref()).await.unwrap();
        assert!(meta.is_dir, "{dir} should be a directory");
        assert_eq!(meta.size, 0);
    }

    assert_eq!(driver.list("/a/b".as_ref()).await.unwrap(), vec!["/a/b/c"]);
    assert_eq!(
        driver.list("/a/b/c".as_ref()).await.unwrap(),
        vec!["/a/b/c/leaf"]
    );
}

#[tokio::test]
async fn segmented_write_and_append() {
    let (driver, store) = driver_with_store(4).await;

    let mut writer = driver.writer("/v2/blob".as_ref(), false).await.unwrap();
    writer.write(b"abcdefgh").await.unwrap();
    assert_eq!(writer.size(), 8);
    writer.commit().await.unwrap();

    // two 4-byte segment uploads; the manifest is not a blob write
    assert_eq!(store.write_count(), 2);
    assert_eq!(driver.get("/v2/blob".as_ref()).await.unwrap(), b"abcdefgh");

    let mut writer = driver.writer("/v2/blob".as_ref(), true).await.unwrap();
    writer.write(b"ijkl").await.unwrap();
    assert_eq!(writer.size(), 12);
    writer.close().await.unwrap();

    assert_eq!(
        driver.get("/v2/blob".as_ref()).await.unwrap(),
        b"abcdefghijkl"
    );
    let meta = driver.stat("/v2/blob".as_ref()).await.unwrap();
    assert_eq!(meta.size, 12);
}

#[tokio::test]
async fn buffered_writer_batches_small_writes() {
    let (driver, store) = driver_with_store(8).await;

    let mut writer = driver.writer("/v2/chunky".as_ref(), false).await.unwrap();
    for _ in 0..4 {
        writer.write(b"abc").await.unwrap();
    }
    assert_eq!(writer.size(), 12);
    writer.commit().await.unwrap();

    // one full 8-byte segment and one 4-byte tail
    assert_eq!(store.write_count(), 2);
    assert_eq!(
        driver.get("/v2/chunky".as_ref()).await.unwrap(),
        b"abcabcabcabc"
    );
}

#[tokio::test]
async fn writer_rejects_use_after_commit() {
    let (driver, _store) = driver_with_store(8).await;

    let mut writer = driver.writer("/v2/done".as_ref(), false).await.unwrap();
    writer.write(b"payload").await.unwrap();
    writer.commit().await.unwrap();

    let err = writer.write(b"more").await.unwrap_err();
    assert_eq!(err.to_string(), "writer already committed");
    let err = writer.commit().await.unwrap_err();
    assert_eq!(err.to_string(), "writer already committed");
}

#[tokio::test]
async fn cancelled_writer_leaves_no_file() {
    let (driver, _store) = driver_with_store(8).await;

    let mut writer = driver.writer("/v2/aborted".as_ref(), false).await.unwrap();
    writer.write(b"partial upload").await.unwrap();
    writer.cancel().await.unwrap();

    let err = driver.get("/v2/aborted".as_ref()).await.unwrap_err();
    assert!(err.is_not_found());

    let err = writer.cancel().await.unwrap_err();
    assert_eq!(err.to_string(), "writer already cancelled");
}

#[tokio::test]
async fn overwrite_without_append_replaces_content() {
    let (driver, _store) = driver_with_store(8).await;

    let mut writer = driver.writer("/v2/blob".as_ref(), false).await.unwrap();
    writer.write(b"first version").await.unwrap();
    writer.commit().await.unwrap();

    let mut writer = driver.writer("/v2/blob".as_ref(), false).await.unwrap();
    writer.write(b"second").await.unwrap();
    writer.commit().await.unwrap();

    assert_eq!(driver.get("/v2/blob".as_ref()).await.unwrap(), b"second");
}

#[tokio::test]
async fn delete_removes_whole_subtree() {
    let (driver, store) = driver_with_store(1024).await;
    let big = vec![1u8; MAX_INLINE_SIZE + 100];

    driver.put("/tree/a/one".as_ref(), &big).await.unwrap();
    driver.put("/tree/a/two".as_ref(), b"small").await.unwrap();
    driver.put("/tree/b/deep/three".as_ref(), &big).await.unwrap();
    assert!(!store.object_names().await.is_empty());

    driver.delete("/tree".as_ref()).await.unwrap();

    for path in ["/tree", "/tree/a", "/tree/a/one", "/tree/b/deep/three"] {
        let err = driver.stat(path.as_ref()).await.unwrap_err();
        assert!(err.is_not_found(), "{path} should be gone");
    }
    assert!(driver.list("/tree".as_ref()).await.unwrap().is_empty());
    assert!(
        store.object_names().await.is_empty(),
        "external blobs should be gone"
    );

    // deleting an absent path is a no-op
    driver.delete("/tree".as_ref()).await.unwrap();
}

#[tokio::test]
async fn reader_past_end_is_empty() {
    let (driver, _store) = driver_with_store(1024).await;
    let big = vec![2u8; MAX_INLINE_SIZE * 4];

    driver.put("/tiny".as_ref(), b"hello").await.unwrap();
    driver.put("/big".as_ref(), &big).await.unwrap();

    assert_eq!(read_all(&driver, "/tiny", 2).await, b"llo");
    assert!(read_all(&driver, "/tiny", 100).await.is_empty());
    assert_eq!(read_all(&driver, "/big", 10).await, &big[10..]);
    assert!(read_all(&driver, "/big", big.len() as u64 + 1).await.is_empty());
}

#[tokio::test]
async fn rename_creates_destination_ancestors() {
    let (driver, _store) = driver_with_store(1024).await;

    driver.put("/src/blob".as_ref(), b"moved").await.unwrap();
    driver
        .rename("/src/blob".as_ref(), "/dst/deep/blob".as_ref())
        .await
        .unwrap();

    assert_eq!(
        driver.get("/dst/deep/blob".as_ref()).await.unwrap(),
        b"moved"
    );
    for dir in ["/dst", "/dst/deep"] {
        assert!(driver.stat(dir.as_ref()).await.unwrap().is_dir);
    }

    let err = driver.get("/src/blob".as_ref()).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn rename_missing_source_fails() {
    let (driver, _store) = driver_with_store(1024).await;

    let err = driver
        .rename("/absent".as_ref(), "/anywhere".as_ref())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "path not found: /absent");
}

#[tokio::test]
async fn url_for_external_blob_only() {
    let (driver, _store) = driver_with_store(1024).await;
    let big = vec![3u8; MAX_INLINE_SIZE * 2];

    driver.put("/inline".as_ref(), b"small").await.unwrap();
    driver.put("/external".as_ref(), &big).await.unwrap();

    let url = driver
        .url_for("/external".as_ref(), UrlOptions::default())
        .await
        .unwrap();
    assert!(url.starts_with("memory:///files/"));
    assert!(url.ends_with("/content?method=GET&expires=1200"));

    let err = driver
        .url_for("/inline".as_ref(), UrlOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::Unsupported { .. }));

    let err = driver
        .url_for("/missing".as_ref(), UrlOptions::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn empty_blob_round_trip() {
    let (driver, store) = driver_with_store(1024).await;

    driver.put("/empty".as_ref(), b"").await.unwrap();

    assert_eq!(store.write_count(), 0);
    assert!(driver.get("/empty".as_ref()).await.unwrap().is_empty());
    assert_eq!(driver.stat("/empty".as_ref()).await.unwrap().size, 0);
}
