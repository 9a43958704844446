use std::fmt;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use tokio::io;

use crate::error::DriverError;

/// A reader stream for blob contents.
pub type Reader = Box<dyn io::AsyncRead + Unpin + Send + Sync>;

/// Options for a temporary capability URL granting time-limited direct
/// access to externally stored content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlOptions {
    /// The HTTP method the URL should permit.
    pub method: http::Method,

    /// How long the URL stays valid.
    pub expiry: Duration,
}

impl Default for UrlOptions {
    fn default() -> Self {
        Self {
            method: http::Method::GET,
            expiry: Duration::from_secs(20 * 60),
        }
    }
}

/// Descriptor for a node in the logical namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    /// The full logical path of the node.
    pub path: Utf8PathBuf,

    /// Content length in bytes. Zero for directories.
    pub size: u64,

    /// Whether the node is a directory marker rather than a file.
    pub is_dir: bool,

    /// Last-modified timestamp.
    pub modified: DateTime<Utc>,
}

/// Lifecycle state of a [`BlobWriter`].
///
/// A writer starts `Open` and reaches exactly one of the other states.
/// Every writer operation checks the state first; an operation against a
/// writer that already left `Open` fails with [`DriverError::Writer`]
/// naming the state that blocks it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Accepting writes.
    Open,
    /// `commit` succeeded; content is visible at the target path.
    Committed,
    /// `cancel` was invoked; content was discarded.
    Cancelled,
    /// `close` committed the writer and released it.
    Closed,
}

impl fmt::Display for WriterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterState::Open => write!(f, "open"),
            WriterState::Committed => write!(f, "committed"),
            WriterState::Cancelled => write!(f, "cancelled"),
            WriterState::Closed => write!(f, "closed"),
        }
    }
}

/// A storage driver presenting a filesystem-like abstraction over a logical
/// slash-separated namespace.
///
/// All paths are absolute logical paths; how and where bytes are materialized
/// is the driver's business and never leaks to callers, including through
/// error messages.
#[async_trait::async_trait]
pub trait Driver: fmt::Debug + Send + Sync {
    /// The name of the driver.
    fn name(&self) -> &'static str;

    /// Return the full content stored at `path`.
    ///
    /// Fails with [`DriverError::PathNotFound`] if there is no file at
    /// `path` (directories count as "no file"). A zero-length file yields
    /// an empty buffer.
    async fn get(&self, path: &Utf8Path) -> Result<Vec<u8>, DriverError>;

    /// Store `content` at `path`, replacing any previous content.
    async fn put(&self, path: &Utf8Path, content: &[u8]) -> Result<(), DriverError>;

    /// Return a reader over the content at `path`, starting at `offset`.
    ///
    /// An offset past the end of the file yields an empty reader, not an
    /// error.
    async fn reader(&self, path: &Utf8Path, offset: u64) -> Result<Reader, DriverError>;

    /// Open a streaming writer for `path`.
    ///
    /// With `append` set, writing continues after the existing content;
    /// otherwise anything already at `path` is replaced.
    async fn writer(
        &self,
        path: &Utf8Path,
        append: bool,
    ) -> Result<Box<dyn BlobWriter>, DriverError>;

    /// Return the descriptor for the node at `path`.
    async fn stat(&self, path: &Utf8Path) -> Result<Metadata, DriverError>;

    /// List the full paths of the direct children of `path`.
    ///
    /// A path with no children yields an empty listing, indistinguishable
    /// from a path that does not exist.
    async fn list(&self, path: &Utf8Path) -> Result<Vec<Utf8PathBuf>, DriverError>;

    /// Move the node at `src` to `dst`, replacing anything at `dst`.
    async fn rename(&self, src: &Utf8Path, dst: &Utf8Path) -> Result<(), DriverError>;

    /// Delete the node at `path` and everything below it.
    ///
    /// Deleting a path that does not exist is a no-op.
    async fn delete(&self, path: &Utf8Path) -> Result<(), DriverError>;

    /// Return a temporary capability URL for direct access to the content
    /// at `path`.
    ///
    /// Only supported when the content is stored externally; other records
    /// fail with [`DriverError::Unsupported`].
    async fn url_for(&self, path: &Utf8Path, options: UrlOptions) -> Result<String, DriverError>;
}

/// A stateful streaming writer returned by [`Driver::writer`].
///
/// Content written through a `BlobWriter` becomes visible at the target
/// path only after [`commit`](BlobWriter::commit) (or
/// [`close`](BlobWriter::close), which commits implicitly).
#[async_trait::async_trait]
pub trait BlobWriter: fmt::Debug + Send {
    /// Append `buf` to the pending content.
    async fn write(&mut self, buf: &[u8]) -> Result<usize, DriverError>;

    /// Number of bytes accepted so far, including any not yet uploaded.
    fn size(&self) -> u64;

    /// Publish the pending content at the target path.
    async fn commit(&mut self) -> Result<(), DriverError>;

    /// Abort the write and remove the target path.
    async fn cancel(&mut self) -> Result<(), DriverError>;

    /// Release the writer, committing first if still open.
    async fn close(&mut self) -> Result<(), DriverError>;
}
