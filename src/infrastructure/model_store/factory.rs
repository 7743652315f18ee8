//! Model store factory for runtime backend selection

use std::str::FromStr;
use std::sync::Arc;

use crate::domain::model_store::{BlobStore, KeyedCollection, VersionAssignment, VersionStore};
use crate::domain::DomainError;
use crate::infrastructure::blob::{InMemoryBlobStore, S3BlobConfig, S3BlobStore};
use crate::infrastructure::keyed_collection::{
    InMemoryKeyedCollection, RedisCollectionConfig, RedisKeyedCollection,
};

use super::blob_backend::{BlobLayout, BlobPrefixBackend};
use super::keyed_backend::KeyedCollectionBackend;

/// Supported model store backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStoreType {
    /// Redis hash per model
    Redis,
    /// S3 prefix per model
    S3,
    /// Process-local keyed collection (for testing/development)
    InMemoryKeyed,
    /// Process-local blob namespace (for testing/development)
    InMemoryBlob,
}

impl FromStr for ModelStoreType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "redis" | "keyed" => Ok(Self::Redis),
            "s3" | "blob" => Ok(Self::S3),
            "in_memory" | "memory" | "in_memory_keyed" => Ok(Self::InMemoryKeyed),
            "in_memory_blob" | "memory_blob" => Ok(Self::InMemoryBlob),
            _ => Err(DomainError::configuration(format!(
                "Unknown model store type: {}. Valid types: redis, s3, in_memory_keyed, in_memory_blob",
                s
            ))),
        }
    }
}

/// Backend-specific model store configuration
#[derive(Debug, Clone)]
pub enum ModelStoreConfig {
    Redis {
        connection: RedisCollectionConfig,
        key_prefix: String,
    },
    S3 {
        bucket: S3BlobConfig,
        layout: BlobLayout,
    },
    InMemoryKeyed,
    InMemoryBlob {
        layout: BlobLayout,
    },
}

impl ModelStoreConfig {
    pub fn redis(connection: RedisCollectionConfig) -> Self {
        Self::Redis {
            connection,
            key_prefix: KeyedCollectionBackend::DEFAULT_KEY_PREFIX.to_string(),
        }
    }

    pub fn s3(bucket: S3BlobConfig) -> Self {
        Self::S3 {
            bucket,
            layout: BlobLayout::default(),
        }
    }

    pub fn store_type(&self) -> ModelStoreType {
        match self {
            Self::Redis { .. } => ModelStoreType::Redis,
            Self::S3 { .. } => ModelStoreType::S3,
            Self::InMemoryKeyed => ModelStoreType::InMemoryKeyed,
            Self::InMemoryBlob { .. } => ModelStoreType::InMemoryBlob,
        }
    }
}

/// Creates version stores for a model from configuration
#[derive(Debug)]
pub struct ModelStoreFactory;

impl ModelStoreFactory {
    pub async fn create(
        config: &ModelStoreConfig,
        model_name: &str,
        assignment: VersionAssignment,
    ) -> Result<Arc<dyn VersionStore>, DomainError> {
        match config {
            ModelStoreConfig::Redis {
                connection,
                key_prefix,
            } => {
                let collection: Arc<dyn KeyedCollection> =
                    Arc::new(RedisKeyedCollection::connect(connection.clone()).await?);
                Ok(Arc::new(
                    KeyedCollectionBackend::new(collection, model_name)
                        .with_key_prefix(key_prefix.clone())
                        .with_assignment(assignment),
                ))
            }
            ModelStoreConfig::InMemoryKeyed => Ok(Arc::new(
                KeyedCollectionBackend::new(Arc::new(InMemoryKeyedCollection::new()), model_name)
                    .with_assignment(assignment),
            )),
            ModelStoreConfig::S3 { .. } | ModelStoreConfig::InMemoryBlob { .. } => Ok(Arc::new(
                Self::create_blob_backend(config, model_name, assignment).await?,
            )),
        }
    }

    /// Blob-backed stores also expose repository setup and explicit versions
    pub async fn create_blob_backend(
        config: &ModelStoreConfig,
        model_name: &str,
        assignment: VersionAssignment,
    ) -> Result<BlobPrefixBackend, DomainError> {
        let (blobs, layout) = match config {
            ModelStoreConfig::S3 { bucket, layout } => {
                let blobs: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(bucket.clone()).await?);
                (blobs, layout)
            }
            ModelStoreConfig::InMemoryBlob { layout } => {
                let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
                (blobs, layout)
            }
            other => {
                return Err(DomainError::configuration(format!(
                    "{:?} model store is not blob-backed",
                    other.store_type()
                )));
            }
        };

        Ok(BlobPrefixBackend::new(blobs, model_name, layout.clone())?.with_assignment(assignment))
    }
}
