//! Batch prediction from a stored model version

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::{info, warn};

use crate::domain::forecast::LinearForecaster;
use crate::domain::model_store::VersionStore;
use crate::domain::series::{FeatureRow, FeatureSource, TrendFeatureSource, TrendIndex};
use crate::domain::DomainError;

/// Forecast of one entity's value for `target_week`
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub entity_id: String,
    /// Most recent week with an observed value
    pub observed_week: NaiveDate,
    pub target_week: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct PredictionReport {
    pub model_name: String,
    pub version: u32,
    pub predictions: Vec<Prediction>,
}

pub struct PredictionService {
    features: Arc<dyn FeatureSource>,
    trends: Option<Arc<dyn TrendFeatureSource>>,
    store: Arc<dyn VersionStore>,
}

impl PredictionService {
    pub fn new(features: Arc<dyn FeatureSource>, store: Arc<dyn VersionStore>) -> Self {
        Self {
            features,
            trends: None,
            store,
        }
    }

    /// Trend table read only when the selected model was trained on trends
    pub fn with_trends(mut self, trends: Arc<dyn TrendFeatureSource>) -> Self {
        self.trends = Some(trends);
        self
    }

    /// Predicts the week after the last observed week of every entity.
    ///
    /// A feature row at week `W` carries the values of `W` (`lag_1`) and
    /// `W + 1` (`label`), so the newest row per entity supplies both lags for
    /// week `W + 2`. Trend models also take the entity's newest search trend
    /// row at or before `W + 1`; entities without one are skipped. Returns `Ok(None)` when the requested version (or, with
    /// `None`, any version) does not exist.
    pub async fn predict(&self, version: Option<u32>) -> Result<Option<PredictionReport>, DomainError> {
        let version = match version {
            Some(v) => v,
            None => match self.store.latest_version().await? {
                Some(v) => v,
                None => {
                    warn!(model = %self.store.model_name(), "No model versions stored");
                    return Ok(None);
                }
            },
        };

        let Some(artifact) = self.store.fetch_version(version).await? else {
            warn!(model = %self.store.model_name(), version = version, "Model version not found");
            return Ok(None);
        };
        let model = LinearForecaster::from_artifact(&artifact)?;

        let index = match (model.feature_set.uses_trends(), &self.trends) {
            (false, _) => TrendIndex::default(),
            (true, Some(trends)) => TrendIndex::new(trends.read().await?),
            (true, None) => {
                return Err(DomainError::configuration(format!(
                    "model '{}' version {} needs search trend features but no trend table is configured",
                    self.store.model_name(),
                    version
                )));
            }
        };

        let rows = self.features.read().await?;
        let mut predictions = Vec::new();
        for row in latest_rows(&rows) {
            let (Some(observed_week), Some(target_week)) = (
                row.week_start.checked_add_days(Days::new(7)),
                row.week_start.checked_add_days(Days::new(14)),
            ) else {
                return Err(DomainError::validation("prediction week is out of calendar range"));
            };

            let trends = index.as_of(&row.entity_id, observed_week);
            let Some(inputs) = model.feature_set.encode(row.label, row.lag_1, trends) else {
                warn!(
                    entity_id = %row.entity_id,
                    observed_week = %observed_week,
                    "No search trends at or before the observed week; skipping entity"
                );
                continue;
            };

            predictions.push(Prediction {
                entity_id: row.entity_id.clone(),
                observed_week,
                target_week,
                value: model.predict(&inputs)?,
            });
        }

        info!(
            model = %self.store.model_name(),
            version = version,
            entities = predictions.len(),
            "Predicted next week"
        );

        Ok(Some(PredictionReport {
            model_name: self.store.model_name().to_string(),
            version,
            predictions,
        }))
    }
}

/// Newest row of every entity, ordered by entity
fn latest_rows(rows: &[FeatureRow]) -> Vec<&FeatureRow> {
    let mut latest: BTreeMap<&str, &FeatureRow> = BTreeMap::new();
    for row in rows {
        latest
            .entry(row.entity_id.as_str())
            .and_modify(|current| {
                if row.week_start > current.week_start {
                    *current = row;
                }
            })
            .or_insert(row);
    }
    latest.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::domain::forecast::{FeatureSet, TrainingExample};
    use crate::domain::model_store::ModelArtifact;
    use crate::domain::series::{MockTrendFeatureSource, TrendFeatureRow};
    use crate::infrastructure::blob::InMemoryBlobStore;
    use crate::infrastructure::model_store::{BlobLayout, BlobPrefixBackend};
    use crate::infrastructure::series::InMemoryFeatureTable;

    fn row(entity: &str, day: u32, lag_1: f64, lag_2: f64, label: f64) -> FeatureRow {
        FeatureRow {
            entity_id: entity.to_string(),
            week_start: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
            lag_1,
            lag_2,
            label,
        }
    }

    fn store() -> Arc<BlobPrefixBackend> {
        Arc::new(
            BlobPrefixBackend::new(
                Arc::new(InMemoryBlobStore::new()),
                "vaccine_demand",
                BlobLayout::default(),
            )
            .unwrap(),
        )
    }

    fn example(features: Vec<f64>, label: f64) -> TrainingExample {
        TrainingExample {
            entity_id: "CA".to_string(),
            week_start: NaiveDate::from_ymd_opt(2021, 1, 4).unwrap(),
            features,
            label,
        }
    }

    fn fitted_model() -> LinearForecaster {
        // label = 1 + lag_1 - 0.5 * lag_2
        let examples: Vec<TrainingExample> = [(1.0, 4.0), (2.0, 1.0), (3.0, 7.0), (5.0, 2.0)]
            .iter()
            .map(|&(l1, l2)| example(vec![l1, l2], 1.0 + l1 - 0.5 * l2))
            .collect();
        LinearForecaster::fit(FeatureSet::Counts, &examples).unwrap()
    }

    /// Deterministic scatter in `[0, 100)`
    fn scatter(seed: u64) -> f64 {
        let mixed = seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        ((mixed >> 33) % 1000) as f64 / 10.0
    }

    fn trend_model() -> LinearForecaster {
        // label = 1 + lag_1 + 2 * lag_1_interest
        let examples: Vec<TrainingExample> = (0..16u64)
            .map(|i| {
                let features: Vec<f64> = (0..8u64).map(|j| scatter(i * 8 + j)).collect();
                let label = 1.0 + features[0] + 2.0 * features[2];
                example(features, label)
            })
            .collect();
        LinearForecaster::fit(FeatureSet::CountsAndTrends, &examples).unwrap()
    }

    fn trend(entity: &str, day: u32, lag_1_interest: f64) -> TrendFeatureRow {
        TrendFeatureRow {
            entity_id: entity.to_string(),
            week_start: NaiveDate::from_ymd_opt(2021, 1, day).unwrap(),
            lag_1_interest,
            lag_2_interest: 0.0,
            lag_1_intent: 0.0,
            lag_2_intent: 0.0,
            lag_1_safety: 0.0,
            lag_2_safety: 0.0,
        }
    }

    #[tokio::test]
    async fn test_predicts_from_newest_row_per_entity() {
        let store = store();
        store
            .save_version(fitted_model().to_artifact().unwrap())
            .await
            .unwrap();
        let features = InMemoryFeatureTable::with_rows(vec![
            row("CA", 11, 12.0, 10.0, 9.0),
            row("CA", 18, 9.0, 12.0, 15.0),
            row("TX", 11, 4.0, 2.0, 6.0),
        ]);

        let report = PredictionService::new(Arc::new(features), store)
            .predict(None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.version, 1);
        assert_eq!(report.predictions.len(), 2);

        let ca = &report.predictions[0];
        assert_eq!(ca.entity_id, "CA");
        assert_eq!(ca.observed_week, NaiveDate::from_ymd_opt(2021, 1, 25).unwrap());
        assert_eq!(ca.target_week, NaiveDate::from_ymd_opt(2021, 2, 1).unwrap());
        // lag_1 = 15, lag_2 = 9
        assert!((ca.value - 11.5).abs() < 1e-9);

        assert_eq!(report.predictions[1].entity_id, "TX");
    }

    #[tokio::test]
    async fn test_counts_model_never_reads_trends() {
        let store = store();
        store
            .save_version(fitted_model().to_artifact().unwrap())
            .await
            .unwrap();
        let mut trends = MockTrendFeatureSource::new();
        trends.expect_read().never();

        let report = PredictionService::new(
            Arc::new(InMemoryFeatureTable::with_rows(vec![row("CA", 11, 4.0, 2.0, 6.0)])),
            store,
        )
        .with_trends(Arc::new(trends))
        .predict(None)
        .await
        .unwrap()
        .unwrap();

        assert_eq!(report.predictions.len(), 1);
    }

    #[tokio::test]
    async fn test_trend_model_joins_newest_trend_row() {
        let store = store();
        store
            .save_version(trend_model().to_artifact().unwrap())
            .await
            .unwrap();
        let features = InMemoryFeatureTable::with_rows(vec![
            row("CA", 11, 12.0, 10.0, 9.0),
            row("TX", 11, 4.0, 2.0, 6.0),
        ]);
        // CA observed week is Jan 18; the Jan 25 row lies in the future
        let mut trends = MockTrendFeatureSource::new();
        trends.expect_read().times(1).returning(|| {
            Ok(vec![
                trend("CA", 11, 3.0),
                trend("CA", 18, 5.0),
                trend("CA", 25, 40.0),
            ])
        });

        let report = PredictionService::new(Arc::new(features), store)
            .with_trends(Arc::new(trends))
            .predict(None)
            .await
            .unwrap()
            .unwrap();

        // TX has no trends and is skipped
        assert_eq!(report.predictions.len(), 1);
        let ca = &report.predictions[0];
        assert_eq!(ca.entity_id, "CA");
        assert_eq!(ca.observed_week, NaiveDate::from_ymd_opt(2021, 1, 18).unwrap());
        // lag_1 = 9, lag_1_interest = 5
        assert!((ca.value - 20.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_trend_model_without_trend_table_is_a_configuration_error() {
        let store = store();
        store
            .save_version(trend_model().to_artifact().unwrap())
            .await
            .unwrap();
        let service = PredictionService::new(
            Arc::new(InMemoryFeatureTable::with_rows(vec![row("CA", 11, 4.0, 2.0, 6.0)])),
            store,
        );

        assert!(matches!(
            service.predict(None).await,
            Err(DomainError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn test_missing_model_is_none() {
        let store = store();
        let service =
            PredictionService::new(Arc::new(InMemoryFeatureTable::new()), store.clone());

        assert!(service.predict(None).await.unwrap().is_none());

        store
            .save_version(fitted_model().to_artifact().unwrap())
            .await
            .unwrap();
        assert!(service.predict(Some(7)).await.unwrap().is_none());
        assert!(service.predict(Some(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_foreign_artifact_is_rejected() {
        let store = store();
        store
            .save_version(ModelArtifact::from(b"\x08\x01onnx".to_vec()))
            .await
            .unwrap();
        let service = PredictionService::new(Arc::new(InMemoryFeatureTable::new()), store);

        assert!(matches!(
            service.predict(None).await,
            Err(DomainError::Serialization { .. })
        ));
    }
}
