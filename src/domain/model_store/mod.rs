//! Model store domain - versioned artifact storage abstractions

mod artifact;
mod primitives;
mod repository;

pub use artifact::{ModelArtifact, ModelVersion};
pub use primitives::{BlobStore, KeyedCollection};
pub use repository::{VersionAssignment, VersionStore};

#[cfg(test)]
pub use primitives::{MockBlobStore, MockKeyedCollection};
