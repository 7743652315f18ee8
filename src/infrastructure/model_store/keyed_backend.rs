//! Version store over a keyed collection (one hash per model)

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::model_store::{KeyedCollection, ModelArtifact, VersionAssignment, VersionStore};
use crate::domain::DomainError;

/// Versions live as fields `"1"`, `"2"`, ... of the collection
/// `<key_prefix>:<model_name>:versions`.
///
/// A save reads the field names fresh, claims one past the highest version
/// field and writes it. Fields that are not version numbers never shift the
/// numbering. With [`VersionAssignment::Conditional`] the write is
/// `HSETNX`-style, so a writer that lost the race gets `VersionConflict`
/// instead of clobbering the winner.
pub struct KeyedCollectionBackend {
    collection: Arc<dyn KeyedCollection>,
    model_name: String,
    key_prefix: String,
    assignment: VersionAssignment,
}

impl fmt::Debug for KeyedCollectionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyedCollectionBackend")
            .field("backend", &self.collection.backend_name())
            .field("model_name", &self.model_name)
            .field("key_prefix", &self.key_prefix)
            .field("assignment", &self.assignment)
            .finish()
    }
}

impl KeyedCollectionBackend {
    pub const DEFAULT_KEY_PREFIX: &'static str = "model";

    pub fn new(collection: Arc<dyn KeyedCollection>, model_name: impl Into<String>) -> Self {
        Self {
            collection,
            model_name: model_name.into(),
            key_prefix: Self::DEFAULT_KEY_PREFIX.to_string(),
            assignment: VersionAssignment::default(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_assignment(mut self, assignment: VersionAssignment) -> Self {
        self.assignment = assignment;
        self
    }

    /// Key of the collection holding this model's versions
    pub fn collection_key(&self) -> String {
        format!("{}:{}:versions", self.key_prefix, self.model_name)
    }
}

#[async_trait]
impl VersionStore for KeyedCollectionBackend {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn save_version(&self, artifact: ModelArtifact) -> Result<u32, DomainError> {
        let key = self.collection_key();
        let version = self.next_version().await?;
        let field = version.to_string();

        match self.assignment {
            VersionAssignment::Conditional => {
                let written = self
                    .collection
                    .set_field_if_absent(&key, &field, artifact.bytes())
                    .await?;

                if !written {
                    warn!(
                        model = %self.model_name,
                        version = version,
                        "Version slot taken by a concurrent writer"
                    );
                    return Err(DomainError::version_conflict(&self.model_name, version));
                }
            }
            VersionAssignment::SingleWriter => {
                self.collection
                    .set_field(&key, &field, artifact.bytes())
                    .await?;
            }
        }

        info!(
            model = %self.model_name,
            version = version,
            bytes = artifact.len(),
            checksum = %artifact.checksum(),
            backend = self.collection.backend_name(),
            "Saved model version"
        );

        Ok(version)
    }

    async fn fetch_version(&self, version: u32) -> Result<Option<ModelArtifact>, DomainError> {
        if version == 0 {
            return Ok(None);
        }

        let value = self
            .collection
            .get_field(&self.collection_key(), &version.to_string())
            .await?;

        Ok(value.map(ModelArtifact::new))
    }

    async fn list_versions(&self) -> Result<Vec<u32>, DomainError> {
        let fields = self.collection.field_names(&self.collection_key()).await?;

        let mut versions: Vec<u32> = fields
            .iter()
            .filter_map(|field| match field.parse::<u32>() {
                Ok(v) if v > 0 => Some(v),
                _ => {
                    warn!(model = %self.model_name, field = %field, "Ignoring non-version field");
                    None
                }
            })
            .collect();
        versions.sort_unstable();

        Ok(versions)
    }
}
