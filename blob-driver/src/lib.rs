//! # Blob driver abstraction
//!
//! The path-addressed interface consumed by the registry gateway: a
//! filesystem-like operation set (get/put/reader/writer/stat/list/rename/
//! delete/url_for) over a logical slash-separated namespace, plus the
//! streaming-write surface with commit/cancel semantics.
//!
//! This crate only defines the seams; backends live elsewhere.

mod driver;
mod error;

pub use driver::BlobWriter;
pub use driver::Driver;
pub use driver::Metadata;
pub use driver::Reader;
pub use driver::UrlOptions;
pub use driver::WriterState;
pub use error::DriverError;
