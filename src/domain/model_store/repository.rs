//! Versioned model store contract

use std::fmt::Debug;
use std::str::FromStr;

use async_trait::async_trait;
use futures::future::try_join_all;

use crate::domain::DomainError;

use super::artifact::{ModelArtifact, ModelVersion};

/// How a backend claims a new version number
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VersionAssignment {
    /// Write only if the version slot is still empty; losing writers get
    /// `DomainError::VersionConflict`
    #[default]
    Conditional,
    /// Plain overwrite. Two writers racing on the same slot lose one write
    /// silently, so the caller must guarantee a single writer.
    SingleWriter,
}

impl FromStr for VersionAssignment {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conditional" | "create_only" => Ok(Self::Conditional),
            "single_writer" | "overwrite" => Ok(Self::SingleWriter),
            _ => Err(DomainError::configuration(format!(
                "Unknown version assignment: {}. Valid values: conditional, single_writer",
                s
            ))),
        }
    }
}

/// Save/fetch/list over the versions of one model.
///
/// Versions of a model form the contiguous range `1..=latest`. Nothing is
/// cached between calls: the latest version is always derived from the
/// backend at the time of the call.
#[async_trait]
pub trait VersionStore: Send + Sync + Debug {
    /// Name of the model whose versions this store manages
    fn model_name(&self) -> &str;

    /// Stores `artifact` as the next version and returns its number
    async fn save_version(&self, artifact: ModelArtifact) -> Result<u32, DomainError>;

    /// Returns the artifact stored under `version`, if any
    async fn fetch_version(&self, version: u32) -> Result<Option<ModelArtifact>, DomainError>;

    /// All stored version numbers, ascending
    async fn list_versions(&self) -> Result<Vec<u32>, DomainError>;

    async fn latest_version(&self) -> Result<Option<u32>, DomainError> {
        Ok(self.list_versions().await?.last().copied())
    }

    /// One past the highest stored version, read fresh from the backend
    async fn next_version(&self) -> Result<u32, DomainError> {
        let latest = self.latest_version().await?.unwrap_or(0);
        latest.checked_add(1).ok_or_else(|| {
            DomainError::validation(format!(
                "model '{}' has no version number left after {}",
                self.model_name(),
                latest
            ))
        })
    }

    /// Returns the artifact of the highest stored version, if any
    async fn fetch_latest(&self) -> Result<Option<ModelArtifact>, DomainError> {
        match self.latest_version().await? {
            Some(version) => self.fetch_version(version).await,
            None => Ok(None),
        }
    }

    /// Fetches every stored version, ascending
    async fn fetch_all(&self) -> Result<Vec<ModelVersion>, DomainError> {
        let versions = self.list_versions().await?;
        let artifacts = try_join_all(versions.iter().map(|v| self.fetch_version(*v))).await?;

        Ok(versions
            .into_iter()
            .zip(artifacts)
            .filter_map(|(version, artifact)| {
                artifact.map(|artifact| ModelVersion {
                    model_name: self.model_name().to_string(),
                    version,
                    artifact,
                })
            })
            .collect())
    }
}
