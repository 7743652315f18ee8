//! Feature table traits

use async_trait::async_trait;

use crate::domain::DomainError;

use super::record::{FeatureRow, TrendFeatureRow};

#[cfg(test)]
use mockall::automock;

/// Column order of the feature table wire format
pub const FEATURE_COLUMNS: [&str; 5] = ["week_start", "entity_id", "lag_1", "lag_2", "label"];

/// Column order of the search trend table
pub const TREND_FEATURE_COLUMNS: [&str; 8] = [
    "week_start",
    "entity_id",
    "lag_1_interest",
    "lag_2_interest",
    "lag_1_intent",
    "lag_2_intent",
    "lag_1_safety",
    "lag_2_safety",
];

/// Persists a finished feature table
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeatureSink: Send + Sync {
    /// Replaces the stored table with `rows`
    async fn write(&self, rows: &[FeatureRow]) -> Result<(), DomainError>;
}

/// Reads a feature table back for training and prediction
#[cfg_attr(test, automock)]
#[async_trait]
pub trait FeatureSource: Send + Sync {
    async fn read(&self) -> Result<Vec<FeatureRow>, DomainError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait TrendFeatureSink: Send + Sync {
    /// Replaces the stored trend table with `rows`
    async fn write(&self, rows: &[TrendFeatureRow]) -> Result<(), DomainError>;
}

/// Reads the search trend table for joining onto count features
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TrendFeatureSource: Send + Sync {
    async fn read(&self) -> Result<Vec<TrendFeatureRow>, DomainError>;
}
