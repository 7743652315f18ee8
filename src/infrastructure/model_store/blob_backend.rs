//! Version store over a prefix-listing blob namespace

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{info, warn};

use crate::domain::model_store::{BlobStore, ModelArtifact, VersionAssignment, VersionStore};
use crate::domain::DomainError;

/// Key layout `<repo_root>/<model_name>/<version>/<artifact_filename>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobLayout {
    pub repo_root: String,
    pub artifact_filename: String,
    /// Repository config blob next to the version directories
    pub config_filename: String,
}

impl Default for BlobLayout {
    fn default() -> Self {
        Self {
            repo_root: "models".to_string(),
            artifact_filename: "model.bin".to_string(),
            config_filename: "config.pbtxt".to_string(),
        }
    }
}

impl BlobLayout {
    pub fn new(repo_root: impl Into<String>, artifact_filename: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            artifact_filename: artifact_filename.into(),
            ..Default::default()
        }
    }

    pub fn with_config_filename(mut self, filename: impl Into<String>) -> Self {
        self.config_filename = filename.into();
        self
    }

    fn validate(&self) -> Result<(), DomainError> {
        let root = self.repo_root.trim_matches('/');
        if root.is_empty() {
            return Err(DomainError::configuration("blob repo_root is empty"));
        }
        for (name, value) in [
            ("artifact_filename", &self.artifact_filename),
            ("config_filename", &self.config_filename),
        ] {
            if value.is_empty() || value.contains('/') {
                return Err(DomainError::configuration(format!(
                    "blob {} '{}' must be a non-empty file name",
                    name, value
                )));
            }
        }
        if self.artifact_filename == self.config_filename {
            return Err(DomainError::configuration(
                "blob artifact_filename and config_filename must differ",
            ));
        }
        Ok(())
    }
}

/// Each version is a directory-like prefix holding one artifact blob.
///
/// The latest version is recomputed by listing every blob under the model
/// prefix, which costs one listing per call. New versions are created with a
/// create-only upload, so a writer racing another on the same number gets
/// `VersionConflict`.
pub struct BlobPrefixBackend {
    blobs: Arc<dyn BlobStore>,
    model_name: String,
    layout: BlobLayout,
    assignment: VersionAssignment,
}

impl fmt::Debug for BlobPrefixBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobPrefixBackend")
            .field("backend", &self.blobs.backend_name())
            .field("model_name", &self.model_name)
            .field("layout", &self.layout)
            .field("assignment", &self.assignment)
            .finish()
    }
}

impl BlobPrefixBackend {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        model_name: impl Into<String>,
        layout: BlobLayout,
    ) -> Result<Self, DomainError> {
        let model_name = model_name.into();
        if model_name.is_empty() || model_name.contains('/') {
            return Err(DomainError::configuration(format!(
                "model name '{}' cannot be used as a blob prefix segment",
                model_name
            )));
        }
        layout.validate()?;

        Ok(Self {
            blobs,
            model_name,
            layout,
            assignment: VersionAssignment::default(),
        })
    }

    pub fn with_assignment(mut self, assignment: VersionAssignment) -> Self {
        self.assignment = assignment;
        self
    }

    fn model_prefix(&self) -> String {
        format!(
            "{}/{}/",
            self.layout.repo_root.trim_matches('/'),
            self.model_name
        )
    }

    /// Full key of a version's artifact blob
    pub fn version_path(&self, version: u32) -> String {
        format!(
            "{}{}/{}",
            self.model_prefix(),
            version,
            self.layout.artifact_filename
        )
    }

    pub fn config_path(&self) -> String {
        format!("{}{}", self.model_prefix(), self.layout.config_filename)
    }

    /// Writes the repository config blob unless one exists; returns whether it was created
    pub async fn ensure_repository(&self, config: &str) -> Result<bool, DomainError> {
        let path = self.config_path();
        let created = !self.blobs.exists(&path).await?
            && self
                .blobs
                .put_if_absent(&path, Bytes::copy_from_slice(config.as_bytes()))
                .await?;

        if created {
            info!(model = %self.model_name, path = %path, "Created model repository");
        } else {
            info!(model = %self.model_name, "Model repository already exists");
        }

        Ok(created)
    }

    /// Publishes `artifact` under an explicit version number.
    ///
    /// The number must be free and must not open a gap: anything above
    /// `latest + 1` is rejected, and an existing version is a conflict.
    pub async fn save_version_as(
        &self,
        version: u32,
        artifact: ModelArtifact,
    ) -> Result<u32, DomainError> {
        if version == 0 {
            return Err(DomainError::validation("model versions start at 1"));
        }

        let versions = self.list_versions().await?;
        let latest = versions.last().copied().unwrap_or(0);

        if versions.binary_search(&version).is_ok() {
            return Err(DomainError::version_conflict(&self.model_name, version));
        }
        if u64::from(version) > u64::from(latest) + 1 {
            return Err(DomainError::validation(format!(
                "version {} of model '{}' would leave a gap after latest version {}",
                version, self.model_name, latest
            )));
        }

        self.write_version(version, artifact).await
    }

    async fn write_version(&self, version: u32, artifact: ModelArtifact) -> Result<u32, DomainError> {
        let path = self.version_path(version);

        match self.assignment {
            VersionAssignment::Conditional => {
                if !self.blobs.put_if_absent(&path, artifact.bytes()).await? {
                    warn!(
                        model = %self.model_name,
                        version = version,
                        "Version prefix taken by a concurrent writer"
                    );
                    return Err(DomainError::version_conflict(&self.model_name, version));
                }
            }
            VersionAssignment::SingleWriter => {
                self.blobs.put(&path, artifact.bytes()).await?;
            }
        }

        info!(
            model = %self.model_name,
            version = version,
            path = %path,
            bytes = artifact.len(),
            checksum = %artifact.checksum(),
            backend = self.blobs.backend_name(),
            "Saved model version"
        );

        Ok(version)
    }
}

#[async_trait]
impl VersionStore for BlobPrefixBackend {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn save_version(&self, artifact: ModelArtifact) -> Result<u32, DomainError> {
        let version = self.next_version().await?;
        info!(model = %self.model_name, version = version, "Saving new model version");

        self.write_version(version, artifact).await
    }

    async fn fetch_version(&self, version: u32) -> Result<Option<ModelArtifact>, DomainError> {
        if version == 0 {
            return Ok(None);
        }

        let body = self.blobs.get(&self.version_path(version)).await?;
        Ok(body.map(ModelArtifact::new))
    }

    async fn list_versions(&self) -> Result<Vec<u32>, DomainError> {
        let prefix = self.model_prefix();
        let keys = self.blobs.list(&prefix).await?;

        let versions: BTreeSet<u32> = keys
            .iter()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| *rest != self.layout.config_filename)
            .filter_map(|rest| {
                let (segment, _) = rest.split_once('/')?;
                match segment.parse::<u32>() {
                    Ok(v) if v > 0 => Some(v),
                    _ => {
                        warn!(model = %self.model_name, segment = %segment, "Ignoring non-version prefix");
                        None
                    }
                }
            })
            .collect();

        Ok(versions.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Barrier;

    use crate::domain::model_store::MockBlobStore;
    use crate::infrastructure::blob::InMemoryBlobStore;

    fn backend(blobs: Arc<dyn BlobStore>) -> BlobPrefixBackend {
        BlobPrefixBackend::new(blobs, "vaccine_demand", BlobLayout::default()).unwrap()
    }

    fn artifact(tag: &'static str) -> ModelArtifact {
        ModelArtifact::new(Bytes::from_static(tag.as_bytes()))
    }

    /// Releases listings only once every writer has listed
    struct InterleavingBlobs {
        inner: InMemoryBlobStore,
        barrier: Barrier,
    }

    #[async_trait]
    impl BlobStore for InterleavingBlobs {
        async fn get(&self, key: &str) -> Result<Option<Bytes>, DomainError> {
            self.inner.get(key).await
        }

        async fn put(&self, key: &str, body: Bytes) -> Result<(), DomainError> {
            self.inner.put(key, body).await
        }

        async fn put_if_absent(&self, key: &str, body: Bytes) -> Result<bool, DomainError> {
            self.inner.put_if_absent(key, body).await
        }

        async fn list(&self, prefix: &str) -> Result<Vec<String>, DomainError> {
            let keys = self.inner.list(prefix).await?;
            self.barrier.wait().await;
            Ok(keys)
        }

        fn backend_name(&self) -> &'static str {
            "interleaving"
        }
    }

    fn interleaving(writers: usize) -> Arc<InterleavingBlobs> {
        Arc::new(InterleavingBlobs {
            inner: InMemoryBlobStore::new(),
            barrier: Barrier::new(writers),
        })
    }

    #[test]
    fn test_path_layout() {
        let store = backend(Arc::new(InMemoryBlobStore::new()));

        assert_eq!(store.version_path(3), "models/vaccine_demand/3/model.bin");
        assert_eq!(store.config_path(), "models/vaccine_demand/config.pbtxt");
    }

    #[test]
    fn test_layout_validation() {
        let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());

        assert!(BlobPrefixBackend::new(blobs.clone(), "m", BlobLayout::new("/", "m.bin")).is_err());
        assert!(BlobPrefixBackend::new(blobs.clone(), "m", BlobLayout::new("r", "a/b")).is_err());
        assert!(BlobPrefixBackend::new(blobs.clone(), "a/b", BlobLayout::default()).is_err());
        assert!(BlobPrefixBackend::new(
            blobs,
            "m",
            BlobLayout::new("r", "config.pbtxt")
        )
        .is_err());
    }

    #[tokio::test]
    async fn test_three_sequential_saves() {
        let store = backend(Arc::new(InMemoryBlobStore::new()));

        for (expected, tag) in [(1, "first"), (2, "second"), (3, "third")] {
            assert_eq!(store.save_version(artifact(tag)).await.unwrap(), expected);
        }

        assert_eq!(store.list_versions().await.unwrap(), vec![1, 2, 3]);
        assert_eq!(store.fetch_latest().await.unwrap(), Some(artifact("third")));
        assert_eq!(store.fetch_version(2).await.unwrap(), Some(artifact("second")));
    }

    #[tokio::test]
    async fn test_round_trip_is_byte_identical() {
        let store = backend(Arc::new(InMemoryBlobStore::new()));
        let original = ModelArtifact::from(vec![0u8, 159, 146, 150, 255, 0, 10]);

        let version = store.save_version(original.clone()).await.unwrap();

        assert_eq!(
            store.fetch_version(version).await.unwrap().unwrap().as_bytes(),
            original.as_bytes()
        );
    }

    #[tokio::test]
    async fn test_missing_versions_are_none() {
        let store = backend(Arc::new(InMemoryBlobStore::new()));

        assert!(store.fetch_latest().await.unwrap().is_none());
        store.save_version(artifact("a")).await.unwrap();
        assert!(store.fetch_version(0).await.unwrap().is_none());
        assert!(store.fetch_version(5).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_config_blob_is_not_a_version() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let store = backend(blobs.clone());

        assert!(store.ensure_repository("platform: \"onnxruntime\"").await.unwrap());
        assert!(!store.ensure_repository("changed").await.unwrap());
        assert_eq!(
            blobs.get(&store.config_path()).await.unwrap(),
            Some(Bytes::from_static(b"platform: \"onnxruntime\""))
        );

        assert!(store.list_versions().await.unwrap().is_empty());
        assert_eq!(store.save_version(artifact("a")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_sibling_model_prefix_is_not_listed() {
        let blobs: Arc<dyn BlobStore> = Arc::new(InMemoryBlobStore::new());
        let store = backend(blobs.clone());
        let sibling =
            BlobPrefixBackend::new(blobs, "vaccine_demand_v2", BlobLayout::default()).unwrap();

        sibling.save_version(artifact("x")).await.unwrap();
        sibling.save_version(artifact("y")).await.unwrap();

        assert!(store.list_versions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_version_as_next_version() {
        let store = backend(Arc::new(InMemoryBlobStore::new()));
        store.save_version(artifact("a")).await.unwrap();

        assert_eq!(store.save_version_as(2, artifact("b")).await.unwrap(), 2);
        assert_eq!(store.list_versions().await.unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_save_version_as_rejects_collision() {
        let store = backend(Arc::new(InMemoryBlobStore::new()));
        store.save_version(artifact("a")).await.unwrap();

        let result = store.save_version_as(1, artifact("b")).await;

        assert!(matches!(
            result,
            Err(DomainError::VersionConflict { version: 1, .. })
        ));
        assert_eq!(store.fetch_version(1).await.unwrap(), Some(artifact("a")));
    }

    #[tokio::test]
    async fn test_save_version_as_rejects_gap_and_zero() {
        let store = backend(Arc::new(InMemoryBlobStore::new()));

        assert!(matches!(
            store.save_version_as(3, artifact("a")).await,
            Err(DomainError::Validation { .. })
        ));
        assert!(matches!(
            store.save_version_as(0, artifact("a")).await,
            Err(DomainError::Validation { .. })
        ));
        assert!(store.list_versions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_saves_conflict_instead_of_overwriting() {
        let blobs = interleaving(2);
        let store = backend(blobs.clone());

        let (a, b) = tokio::join!(
            store.save_version(artifact("writer-a")),
            store.save_version(artifact("writer-b"))
        );

        assert!(a.is_ok() != b.is_ok());
        let loser = if a.is_ok() { b } else { a };
        assert!(matches!(
            loser,
            Err(DomainError::VersionConflict { version: 1, .. })
        ));
        assert_eq!(
            blobs.inner.list("models/vaccine_demand/").await.unwrap(),
            vec!["models/vaccine_demand/1/model.bin"]
        );
    }

    #[tokio::test]
    async fn test_single_writer_mode_loses_a_concurrent_write() {
        let blobs = interleaving(2);
        let store = backend(blobs.clone()).with_assignment(VersionAssignment::SingleWriter);

        let (a, b) = tokio::join!(
            store.save_version(artifact("writer-a")),
            store.save_version(artifact("writer-b"))
        );

        assert_eq!(a.unwrap(), 1);
        assert_eq!(b.unwrap(), 1);
        assert_eq!(blobs.inner.list("models/").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_listing_failure_propagates() {
        let mut mock = MockBlobStore::new();
        mock.expect_list()
            .returning(|_| Err(DomainError::backend("s3", "AccessDenied")));

        let store = backend(Arc::new(mock));

        assert!(matches!(
            store.save_version(artifact("a")).await,
            Err(DomainError::BackendUnavailable { .. })
        ));
        assert!(matches!(
            store.fetch_latest().await,
            Err(DomainError::BackendUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_stray_max_version_prefix_does_not_wrap() {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let store = backend(blobs.clone());
        blobs
            .put(&store.version_path(u32::MAX), Bytes::from_static(b"stray"))
            .await
            .unwrap();

        assert!(matches!(
            store.save_version(artifact("a")).await,
            Err(DomainError::Validation { .. })
        ));
        assert!(blobs.get(&store.version_path(0)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_existing_repository_config_is_not_uploaded_again() {
        let mut mock = MockBlobStore::new();
        mock.expect_exists().times(1).returning(|_| Ok(true));
        mock.expect_put_if_absent().never();

        let store = backend(Arc::new(mock));

        assert!(!store.ensure_repository("name: \"demand\"").await.unwrap());
    }
}
