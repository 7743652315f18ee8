//! Forecast domain - model inputs, time split, baseline model and metrics

mod features;
mod linear;
mod metrics;
mod split;

pub use features::{training_examples, FeatureSet, TrainingExample};
pub use linear::LinearForecaster;
pub use metrics::mean_absolute_error;
pub use split::{split_by_time, TrainTestSplit, Weekly};
