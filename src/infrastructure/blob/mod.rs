//! Blob store infrastructure - S3 and in-memory namespaces

mod in_memory;
mod s3;

pub use in_memory::InMemoryBlobStore;
pub use s3::{S3BlobConfig, S3BlobStore};
