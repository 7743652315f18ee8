//! Domain layer - series transforms, model store contracts and forecasting

pub mod error;
pub mod forecast;
pub mod model_store;
pub mod series;

pub use error::DomainError;
