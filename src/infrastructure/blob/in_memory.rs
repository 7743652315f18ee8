//! In-memory blob store

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::model_store::BlobStore;
use crate::domain::DomainError;

const BACKEND: &str = "in_memory";

/// Blob namespace held in process memory; keys list in lexical order
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Bytes>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::backend(BACKEND, format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, DomainError> {
        let blobs = self.blobs.read().map_err(lock_error)?;
        Ok(blobs.get(key).cloned())
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), DomainError> {
        let mut blobs = self.blobs.write().map_err(lock_error)?;
        blobs.insert(key.to_string(), body);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, body: Bytes) -> Result<bool, DomainError> {
        let mut blobs = self.blobs.write().map_err(lock_error)?;

        if blobs.contains_key(key) {
            return Ok(false);
        }

        blobs.insert(key.to_string(), body);
        Ok(true)
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let blobs = self.blobs.read().map_err(lock_error)?;
        Ok(blobs.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, DomainError> {
        let blobs = self.blobs.read().map_err(lock_error)?;
        Ok(blobs
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_by_prefix() {
        let store = InMemoryBlobStore::new();
        for key in ["models/a/1/m.bin", "models/a/2/m.bin", "models/ab/1/m.bin", "other"] {
            store.put(key, Bytes::from_static(b"x")).await.unwrap();
        }

        let keys = store.list("models/a/").await.unwrap();

        assert_eq!(keys, vec!["models/a/1/m.bin", "models/a/2/m.bin"]);
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let store = InMemoryBlobStore::new();

        assert!(store.put_if_absent("k", Bytes::from_static(b"a")).await.unwrap());
        assert!(!store.put_if_absent("k", Bytes::from_static(b"b")).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(Bytes::from_static(b"a")));
        assert!(store.exists("k").await.unwrap());
        assert!(!store.exists("missing").await.unwrap());
    }
}
