//! Weekly Forecast
//!
//! Batch pipeline from daily per-entity counts to weekly lag features, a
//! least-squares baseline forecaster, and a versioned model artifact store
//! with two interchangeable backends:
//! - keyed collection (Redis hash per model)
//! - blob prefix (S3 key prefix per model)

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;
pub use domain::DomainError;
