use camino::Utf8PathBuf;

/// Errors surfaced by an [`ObjectStore`](crate::ObjectStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum ObjectStoreError {
    /// No object exists at the given name.
    #[error("object not found: {object}")]
    NotFound {
        /// The object name that was requested.
        object: Utf8PathBuf,
    },

    /// An I/O failure inside the backend.
    #[error("{backend} object store I/O error: {source}")]
    Io {
        /// The backend that failed.
        backend: &'static str,

        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The backend does not support the requested operation.
    #[error("{backend} object store does not support {operation}")]
    Unsupported {
        /// The backend that was asked.
        backend: &'static str,

        /// The operation that is not supported.
        operation: &'static str,
    },
}

impl ObjectStoreError {
    /// A not-found error for the given object name.
    pub fn not_found(object: impl Into<Utf8PathBuf>) -> Self {
        ObjectStoreError::NotFound {
            object: object.into(),
        }
    }

    /// Returns a closure wrapping an I/O error with the backend name,
    /// mapping not-found I/O errors to [`ObjectStoreError::NotFound`].
    pub fn io(
        backend: &'static str,
        object: impl Into<Utf8PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let object = object.into();
        move |source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ObjectStoreError::NotFound { object }
            } else {
                ObjectStoreError::Io { backend, source }
            }
        }
    }

    /// Whether this error is an [`ObjectStoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, ObjectStoreError::NotFound { .. })
    }
}
