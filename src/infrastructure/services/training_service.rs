//! Offline training job: feature table in, new model version out

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::domain::forecast::{
    mean_absolute_error, split_by_time, training_examples, FeatureSet, LinearForecaster,
};
use crate::domain::model_store::VersionStore;
use crate::domain::series::{FeatureSource, TrendFeatureSource, TrendIndex};
use crate::domain::DomainError;

/// Outcome of one training run
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub model_name: String,
    pub version: u32,
    pub feature_set: FeatureSet,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Count rows left out for lack of search trends
    pub unmatched_rows: usize,
    pub split_point: NaiveDate,
    /// `None` when the holdout window held no rows
    pub mae: Option<f64>,
    pub model: LinearForecaster,
}

/// Fits on the training window, scores the holdout, then refits on every row
/// and publishes the result as the model's next version.
///
/// With a trend table attached, count rows are joined with the search trend
/// features of the same entity as of their week before fitting.
pub struct TrainingService {
    features: Arc<dyn FeatureSource>,
    trends: Option<Arc<dyn TrendFeatureSource>>,
    store: Arc<dyn VersionStore>,
    holdout_weeks: u32,
}

impl TrainingService {
    pub const DEFAULT_HOLDOUT_WEEKS: u32 = 4;

    pub fn new(features: Arc<dyn FeatureSource>, store: Arc<dyn VersionStore>) -> Self {
        Self {
            features,
            trends: None,
            store,
            holdout_weeks: Self::DEFAULT_HOLDOUT_WEEKS,
        }
    }

    pub fn with_holdout_weeks(mut self, weeks: u32) -> Self {
        self.holdout_weeks = weeks;
        self
    }

    pub fn with_trends(mut self, trends: Arc<dyn TrendFeatureSource>) -> Self {
        self.trends = Some(trends);
        self
    }

    pub async fn train(&self) -> Result<TrainingReport, DomainError> {
        let rows = self.features.read().await?;
        if rows.is_empty() {
            return Err(DomainError::empty_series("feature table has no rows"));
        }

        let (feature_set, index) = match &self.trends {
            Some(trends) => {
                let index = TrendIndex::new(trends.read().await?);
                info!(trend_rows = index.len(), "Joining search trend features");
                (FeatureSet::CountsAndTrends, index)
            }
            None => (FeatureSet::Counts, TrendIndex::default()),
        };

        let examples = training_examples(feature_set, &rows, &index);
        let unmatched_rows = rows.len() - examples.len();
        if unmatched_rows > 0 {
            warn!(
                unmatched_rows = unmatched_rows,
                "Feature rows without search trends at or before their week were left out"
            );
        }
        if examples.is_empty() {
            return Err(DomainError::empty_series(
                "no feature rows have matching search trends",
            ));
        }

        let split = split_by_time(&examples, self.holdout_weeks)?;
        info!(
            rows = examples.len(),
            train_rows = split.train.len(),
            test_rows = split.test.len(),
            split_point = %split.split_point,
            "Split feature table"
        );

        let candidate = LinearForecaster::fit(feature_set, &split.train)?;
        let actual: Vec<f64> = split.test.iter().map(|e| e.label).collect();
        let mae = mean_absolute_error(&actual, &candidate.predict_examples(&split.test)?);
        if let Some(mae) = mae {
            info!(mae = mae, "Holdout error");
        }

        let model = LinearForecaster::fit(feature_set, &examples)?;
        let version = self.store.save_version(model.to_artifact()?).await?;

        info!(
            model = %self.store.model_name(),
            version = version,
            feature_set = ?feature_set,
            intercept = model.intercept,
            coefficients = ?model.coefficients,
            "Published model version"
        );

        Ok(TrainingReport {
            model_name: self.store.model_name().to_string(),
            version,
            feature_set,
            train_rows: split.train.len(),
            test_rows: split.test.len(),
            unmatched_rows,
            split_point: split.split_point,
            mae,
            model,
        })
    }
}
