//! Physical storage primitives the version store backends are built on

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// A keyed collection of named fields (a Redis hash, for instance)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KeyedCollection: Send + Sync {
    /// Every field name stored under `key`; empty when the key is absent
    async fn field_names(&self, key: &str) -> Result<Vec<String>, DomainError>;

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<Bytes>, DomainError>;

    /// Unconditional write; replaces any existing value
    async fn set_field(&self, key: &str, field: &str, value: Bytes) -> Result<(), DomainError>;

    /// Atomic write that only succeeds when `field` does not exist yet.
    /// Returns whether the value was written.
    async fn set_field_if_absent(
        &self,
        key: &str,
        field: &str,
        value: Bytes,
    ) -> Result<bool, DomainError>;

    /// Backend name for errors and logs
    fn backend_name(&self) -> &'static str;
}

/// A flat blob namespace with prefix listing (an S3 bucket, for instance)
#[cfg_attr(test, automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, DomainError>;

    /// Unconditional upload
    async fn put(&self, key: &str, body: Bytes) -> Result<(), DomainError>;

    /// Create-only upload. Returns `false` when an object already exists at `key`.
    async fn put_if_absent(&self, key: &str, body: Bytes) -> Result<bool, DomainError>;

    /// Cheap presence check; the default downloads the object
    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        Ok(self.get(key).await?.is_some())
    }

    /// Every key beginning with `prefix`
    async fn list(&self, prefix: &str) -> Result<Vec<String>, DomainError>;

    fn backend_name(&self) -> &'static str;
}
