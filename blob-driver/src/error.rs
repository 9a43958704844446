use std::error::Error as StdError;

use camino::{Utf8Path, Utf8PathBuf};

use crate::driver::WriterState;

/// Errors surfaced by [`Driver`](crate::Driver) operations.
///
/// Backend failures are carried as boxed sources; not-found errors always
/// name the logical path, never the backend's internal addressing scheme.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// No file or directory exists at the given logical path, or a file
    /// operation was attempted on a directory.
    #[error("path not found: {path}")]
    PathNotFound {
        /// The logical path that was requested.
        path: Utf8PathBuf,
    },

    /// The operation is not supported for the record at this path, e.g. a
    /// temporary-URL request against inline content.
    #[error("operation not supported for path: {path}")]
    Unsupported {
        /// The logical path that was requested.
        path: Utf8PathBuf,
    },

    /// A writer operation was attempted after the writer reached a terminal
    /// state.
    #[error("writer already {0}")]
    Writer(WriterState),

    /// An underlying metadata or object store failure, passed through.
    #[error("storage backend error: {source}")]
    Store {
        /// The backend error.
        #[source]
        source: Box<dyn StdError + Send + Sync + 'static>,
    },
}

impl DriverError {
    /// A not-found error for the given logical path.
    pub fn not_found(path: impl Into<Utf8PathBuf>) -> Self {
        DriverError::PathNotFound { path: path.into() }
    }

    /// An unsupported-operation error for the given logical path.
    pub fn unsupported(path: impl Into<Utf8PathBuf>) -> Self {
        DriverError::Unsupported { path: path.into() }
    }

    /// Wrap a backend error.
    pub fn store<E>(source: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync + 'static>>,
    {
        DriverError::Store {
            source: source.into(),
        }
    }

    /// Rewrite a not-found error to report the given logical path.
    ///
    /// Backends know nothing of logical paths; this applies the facade
    /// boundary rule that internal addresses never leak to callers.
    pub fn reported_at(self, path: &Utf8Path) -> Self {
        match self {
            DriverError::PathNotFound { .. } => DriverError::not_found(path),
            other => other,
        }
    }

    /// Whether this error is a [`DriverError::PathNotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, DriverError::PathNotFound { .. })
    }
}
