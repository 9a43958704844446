//! Streaming writes: the segmented upload state machine and the buffering
//! layer that batches caller writes up to the object store's chunk size.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;

use blob_driver::{BlobWriter, Driver, DriverError, WriterState};
use object_store::SegmentRef;

use crate::driver::{reported_at, HybridDriver};
use crate::meta::{FileRecord, SegmentRecord};
use crate::paths;

/// Incremental, appendable writer uploading content as numbered segments
/// under one external location.
///
/// Every operation checks the state first; once the writer reaches
/// `Committed`, `Cancelled`, or `Closed`, further calls fail naming that
/// state. Each `write` uploads one segment and records it; nothing is
/// visible at the target path until `commit` assembles the manifest and
/// upserts the file record.
#[derive(Debug)]
pub struct SegmentedWriter {
    driver: HybridDriver,
    path: Utf8PathBuf,
    location: String,
    segments: Vec<SegmentRecord>,
    state: WriterState,
}

impl SegmentedWriter {
    /// Open a writer for `path`.
    ///
    /// Without `append`, anything already at `path` (its whole subtree) is
    /// deleted first and the write starts fresh. With `append`, the
    /// existing external location is reused and its recorded segments seed
    /// the next sequence number.
    pub(crate) async fn open(
        driver: HybridDriver,
        path: &Utf8Path,
        append: bool,
    ) -> Result<Self, DriverError> {
        let mut existing = driver.meta.get(path).await.map_err(DriverError::store)?;

        if let Some(record) = existing.take_if(|_| !append) {
            driver.delete_subtree(record).await?;
        }

        let location = match existing.as_ref().and_then(|record| record.location.clone()) {
            Some(location) => location,
            None => paths::random_location()?,
        };

        let segments = if append && existing.is_some() {
            driver
                .meta
                .segments(&location)
                .await
                .map_err(DriverError::store)?
        } else {
            Vec::new()
        };

        Ok(Self {
            driver,
            path: path.to_owned(),
            location,
            segments,
            state: WriterState::Open,
        })
    }

    fn check_open(&self) -> Result<(), DriverError> {
        match self.state {
            WriterState::Open => Ok(()),
            state => Err(DriverError::Writer(state)),
        }
    }

    fn total_size(&self) -> u64 {
        self.segments.iter().map(|s| s.size_bytes as u64).sum()
    }

    async fn write_segment(&mut self, buf: &[u8]) -> Result<usize, DriverError> {
        self.check_open()?;

        // segment numbers are contiguous; the in-memory list is ordered
        let number = self.segments.last().map_or(1, |s| s.number + 1);
        let object = paths::segment_object(self.driver.prefix(), &self.location, number);

        let hash = self
            .driver
            .store
            .write(&object, buf)
            .await
            .map_err(reported_at(&self.path))?;

        let segment = SegmentRecord {
            location: self.location.clone(),
            number,
            size_bytes: buf.len() as i64,
            hash,
        };
        self.driver
            .meta
            .insert_segment(&segment)
            .await
            .map_err(DriverError::store)?;
        self.segments.push(segment);
        Ok(buf.len())
    }

    async fn commit_segments(&mut self) -> Result<(), DriverError> {
        self.check_open()?;

        let prefix = self.driver.prefix().to_owned();
        let refs: Vec<SegmentRef> = self
            .segments
            .iter()
            .map(|s| SegmentRef {
                object: paths::segment_object(&prefix, &s.location, s.number),
                size: s.size_bytes as u64,
                hash: s.hash.clone(),
            })
            .collect();

        let target = paths::content_object(&prefix, &self.location);
        self.driver
            .store
            .write_manifest(&target, &refs)
            .await
            .map_err(reported_at(&self.path))?;

        let (dirname, basename) = paths::split(&self.path);
        let record = FileRecord {
            dirname: dirname.to_string(),
            basename,
            size_bytes: self.total_size() as i64,
            mtime: Utc::now(),
            content: None,
            location: Some(self.location.clone()),
        };
        self.driver.write_record(&record).await?;

        self.state = WriterState::Committed;
        Ok(())
    }

    async fn cancel_write(&mut self) -> Result<(), DriverError> {
        self.check_open()?;
        self.state = WriterState::Cancelled;

        // a no-op when nothing was committed yet (the common case).
        // Already-uploaded segment objects and rows have no file record to
        // anchor a cascading delete and are left behind.
        let result = self.driver.delete(&self.path).await;
        self.segments.clear();
        result
    }
}

#[async_trait::async_trait]
impl BlobWriter for SegmentedWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, DriverError> {
        self.write_segment(buf).await
    }

    fn size(&self) -> u64 {
        self.total_size()
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.commit_segments().await
    }

    async fn cancel(&mut self) -> Result<(), DriverError> {
        self.cancel_write().await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.check_open()?;
        self.commit_segments().await?;
        self.state = WriterState::Closed;
        Ok(())
    }
}

/// Buffering layer over [`SegmentedWriter`].
///
/// Batches caller-supplied bytes into chunks of the object store's
/// configured chunk size before handing them to the raw writer, so
/// many-small-write callers don't produce a segment per call. `close`,
/// `commit`, and `cancel` flush buffered bytes through a final write
/// before delegating.
#[derive(Debug)]
pub struct BufferedWriter {
    inner: SegmentedWriter,
    buffer: Vec<u8>,
    capacity: usize,
}

impl BufferedWriter {
    pub(crate) fn new(inner: SegmentedWriter, capacity: usize) -> Self {
        Self {
            inner,
            buffer: Vec::with_capacity(capacity),
            capacity,
        }
    }

    async fn flush(&mut self) -> Result<(), DriverError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.buffer);
        self.inner.write_segment(&chunk).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BlobWriter for BufferedWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, DriverError> {
        self.inner.check_open()?;
        let accepted = buf.len();
        let mut rest = buf;
        while !rest.is_empty() {
            let room = self.capacity - self.buffer.len();
            let take = room.min(rest.len());
            self.buffer.extend_from_slice(&rest[..take]);
            rest = &rest[take..];
            if self.buffer.len() == self.capacity {
                self.flush().await?;
            }
        }
        Ok(accepted)
    }

    fn size(&self) -> u64 {
        self.inner.size() + self.buffer.len() as u64
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.flush().await?;
        self.inner.commit_segments().await
    }

    async fn cancel(&mut self) -> Result<(), DriverError> {
        self.flush().await?;
        self.inner.cancel_write().await
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.flush().await?;
        self.inner.check_open()?;
        self.inner.commit_segments().await?;
        self.inner.state = WriterState::Closed;
        Ok(())
    }
}
