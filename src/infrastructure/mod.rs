//! Infrastructure layer - Backend and source implementations

pub mod blob;
pub mod keyed_collection;
pub mod logging;
pub mod model_store;
pub mod series;
pub mod services;
