//! In-memory feature table

use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::series::{FeatureRow, FeatureSink, FeatureSource};
use crate::domain::DomainError;

/// Feature table held in process memory
#[derive(Debug, Default)]
pub struct InMemoryFeatureTable {
    rows: RwLock<Vec<FeatureRow>>,
}

impl InMemoryFeatureTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<FeatureRow>) -> Self {
        Self {
            rows: RwLock::new(rows),
        }
    }
}

fn lock_error(e: impl std::fmt::Display) -> DomainError {
    DomainError::backend("in_memory", format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl FeatureSink for InMemoryFeatureTable {
    async fn write(&self, rows: &[FeatureRow]) -> Result<(), DomainError> {
        let mut stored = self.rows.write().map_err(lock_error)?;
        *stored = rows.to_vec();
        Ok(())
    }
}

#[async_trait]
impl FeatureSource for InMemoryFeatureTable {
    async fn read(&self) -> Result<Vec<FeatureRow>, DomainError> {
        let stored = self.rows.read().map_err(lock_error)?;
        Ok(stored.clone())
    }
}
