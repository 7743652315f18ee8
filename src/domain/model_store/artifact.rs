//! Model artifact value types

use std::fmt;

use bytes::Bytes;
use sha2::{Digest, Sha256};

/// Opaque, immutable model binary
#[derive(Clone, PartialEq, Eq)]
pub struct ModelArtifact(Bytes);

impl ModelArtifact {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Cheap clone of the underlying buffer
    pub fn bytes(&self) -> Bytes {
        self.0.clone()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Hex-encoded SHA-256 of the artifact bytes
    pub fn checksum(&self) -> String {
        hex::encode(Sha256::digest(&self.0))
    }
}

impl fmt::Debug for ModelArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelArtifact")
            .field("len", &self.0.len())
            .field("checksum", &self.checksum())
            .finish()
    }
}

impl From<Vec<u8>> for ModelArtifact {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&'static [u8]> for ModelArtifact {
    fn from(value: &'static [u8]) -> Self {
        Self::new(Bytes::from_static(value))
    }
}

/// A stored artifact together with its version number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVersion {
    pub model_name: String,
    pub version: u32,
    pub artifact: ModelArtifact,
}
