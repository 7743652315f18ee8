use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Empty series: {message}")]
    EmptySeries { message: String },

    #[error("Version conflict: model '{model_name}' version {version} already exists")]
    VersionConflict { model_name: String, version: u32 },

    #[error("Backend unavailable: {backend} - {message}")]
    BackendUnavailable { backend: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn empty_series(message: impl Into<String>) -> Self {
        Self::EmptySeries {
            message: message.into(),
        }
    }

    pub fn version_conflict(model_name: impl Into<String>, version: u32) -> Self {
        Self::VersionConflict {
            model_name: model_name.into(),
            version,
        }
    }

    pub fn backend(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// True when a conditional version write lost to another writer
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let error = DomainError::validation("record 3 has an empty entity id");
        assert_eq!(
            error.to_string(),
            "Validation error: record 3 has an empty entity id"
        );
    }

    #[test]
    fn test_version_conflict_error() {
        let error = DomainError::version_conflict("vaccine_demand", 4);
        assert!(error.is_version_conflict());
        assert_eq!(
            error.to_string(),
            "Version conflict: model 'vaccine_demand' version 4 already exists"
        );
    }

    #[test]
    fn test_backend_error() {
        let error = DomainError::backend("redis", "connection refused");
        assert!(!error.is_version_conflict());
        assert_eq!(
            error.to_string(),
            "Backend unavailable: redis - connection refused"
        );
    }
}
