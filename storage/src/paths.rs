//! Logical path splitting and external object-name layout.

use camino::{Utf8Path, Utf8PathBuf};
use rand::rngs::OsRng;
use rand::RngCore;

use blob_driver::DriverError;

/// Split a logical path into its (dirname, basename) table key.
///
/// The root path splits into `("/", "/")`, matching the convention that
/// every non-root record's dirname chain terminates at `/`.
pub(crate) fn split(path: &Utf8Path) -> (Utf8PathBuf, String) {
    let dirname = path
        .parent()
        .map(Utf8Path::to_owned)
        .unwrap_or_else(|| Utf8PathBuf::from("/"));
    let basename = path.file_name().unwrap_or("/").to_owned();
    (dirname, basename)
}

/// Join a (dirname, basename) key back into a full logical path.
pub(crate) fn join(dirname: &str, basename: &str) -> Utf8PathBuf {
    Utf8Path::new(dirname).join(basename)
}

/// Choose a fresh random external-location token: 8 bytes from the OS
/// random source, hex encoded. Generated once per logical object's external
/// lifetime. A failing random source is an error, never silently retried.
pub(crate) fn random_location() -> Result<String, DriverError> {
    let mut raw = [0u8; 8];
    OsRng.try_fill_bytes(&mut raw).map_err(DriverError::store)?;
    Ok(hex::encode(raw))
}

fn with_prefix(prefix: &str, name: &str) -> Utf8PathBuf {
    let name = name.trim_matches('/');
    if prefix.is_empty() {
        Utf8PathBuf::from(name)
    } else {
        Utf8PathBuf::from(format!("{}/{}", prefix.trim_matches('/'), name))
    }
}

/// The object name of the composed content object for a location.
pub(crate) fn content_object(prefix: &str, location: &str) -> Utf8PathBuf {
    with_prefix(prefix, &format!("{location}/content"))
}

/// The object name of one numbered segment of a location.
pub(crate) fn segment_object(prefix: &str, location: &str, number: i64) -> Utf8PathBuf {
    with_prefix(prefix, &format!("{location}/{number:016}"))
}

/// The object-name prefix covering every object belonging to a location.
pub(crate) fn location_prefix(prefix: &str, location: &str) -> String {
    format!("{}/", with_prefix(prefix, location))
}
