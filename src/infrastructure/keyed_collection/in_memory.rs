//! In-memory keyed collection

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::model_store::KeyedCollection;
use crate::domain::DomainError;

const BACKEND: &str = "in_memory";

/// Thread-safe keyed collection held in process memory.
///
/// Useful for testing and local runs. Data is lost when the process terminates.
#[derive(Debug, Default)]
pub struct InMemoryKeyedCollection {
    collections: RwLock<HashMap<String, BTreeMap<String, Bytes>>>,
}

impl InMemoryKeyedCollection {
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::backend(BACKEND, format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl KeyedCollection for InMemoryKeyedCollection {
    async fn field_names(&self, key: &str) -> Result<Vec<String>, DomainError> {
        let collections = self.collections.read().map_err(lock_error)?;
        Ok(collections
            .get(key)
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_field(&self, key: &str, field: &str) -> Result<Option<Bytes>, DomainError> {
        let collections = self.collections.read().map_err(lock_error)?;
        Ok(collections.get(key).and_then(|c| c.get(field)).cloned())
    }

    async fn set_field(&self, key: &str, field: &str, value: Bytes) -> Result<(), DomainError> {
        let mut collections = self.collections.write().map_err(lock_error)?;
        collections
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn set_field_if_absent(
        &self,
        key: &str,
        field: &str,
        value: Bytes,
    ) -> Result<bool, DomainError> {
        let mut collections = self.collections.write().map_err(lock_error)?;
        let collection = collections.entry(key.to_string()).or_default();

        if collection.contains_key(field) {
            return Ok(false);
        }

        collection.insert(field.to_string(), value);
        Ok(true)
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}
