//! Versioned model store backends

mod blob_backend;
mod factory;
mod keyed_backend;

pub use blob_backend::{BlobLayout, BlobPrefixBackend};
pub use factory::{ModelStoreConfig, ModelStoreFactory, ModelStoreType};
pub use keyed_backend::KeyedCollectionBackend;
