//! Batch jobs composed from domain components and store backends

mod feature_pipeline;
mod prediction_service;
mod training_service;
mod trend_pipeline;

pub use feature_pipeline::{FeaturePipeline, FeaturePipelineReport};
pub use prediction_service::{Prediction, PredictionReport, PredictionService};
pub use training_service::{TrainingReport, TrainingService};
pub use trend_pipeline::TrendPipeline;
