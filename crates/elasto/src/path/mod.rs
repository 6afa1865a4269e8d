//! Per-backend path models (spec.md §3)
//!
//! Each backend has a distinct addressing scheme, so each gets its own
//! parse/format pair rather than a shared abstraction — mirroring the
//! teacher's per-concern modules (`path.rs`, `host.rs`) rather than forcing
//! one trait over fundamentally different URL shapes.

pub mod azure_blob;
pub mod azure_file;
pub mod s3;
pub mod web;

pub use azure_blob::AzureBlobPath;
pub use azure_file::AzureFilePath;
pub use s3::S3Path;
pub use web::WebPath;
