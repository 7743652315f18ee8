//! Model input layouts and labelled examples

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::series::{FeatureRow, TrendFeatureRow, TrendIndex};

use super::split::Weekly;

const COUNT_FEATURES: [&str; 2] = ["lag_1", "lag_2"];

const COUNT_AND_TREND_FEATURES: [&str; 8] = [
    "lag_1",
    "lag_2",
    "lag_1_interest",
    "lag_2_interest",
    "lag_1_intent",
    "lag_2_intent",
    "lag_1_safety",
    "lag_2_safety",
];

/// Which columns a model reads, in order
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSet {
    /// The two weekly count lags
    #[default]
    Counts,
    /// The count lags followed by the six search trend lags
    CountsAndTrends,
}

impl FeatureSet {
    pub fn names(&self) -> &'static [&'static str] {
        match self {
            Self::Counts => &COUNT_FEATURES,
            Self::CountsAndTrends => &COUNT_AND_TREND_FEATURES,
        }
    }

    pub fn width(&self) -> usize {
        self.names().len()
    }

    pub fn uses_trends(&self) -> bool {
        matches!(self, Self::CountsAndTrends)
    }

    /// Input vector for one entity-week; `None` when trends are required but missing
    pub fn encode(&self, lag_1: f64, lag_2: f64, trends: Option<&TrendFeatureRow>) -> Option<Vec<f64>> {
        match self {
            Self::Counts => Some(vec![lag_1, lag_2]),
            Self::CountsAndTrends => {
                let t = trends?;
                Some(vec![
                    lag_1,
                    lag_2,
                    t.lag_1_interest,
                    t.lag_2_interest,
                    t.lag_1_intent,
                    t.lag_2_intent,
                    t.lag_1_safety,
                    t.lag_2_safety,
                ])
            }
        }
    }
}

/// One labelled input vector
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub entity_id: String,
    pub week_start: NaiveDate,
    pub features: Vec<f64>,
    pub label: f64,
}

impl Weekly for TrainingExample {
    fn week_start(&self) -> NaiveDate {
        self.week_start
    }
}

/// Encodes feature rows for `feature_set`.
///
/// With trends, each row joins the newest trend row of its entity at or
/// before its week; rows with no such trend row are left out.
pub fn training_examples(
    feature_set: FeatureSet,
    rows: &[FeatureRow],
    trends: &TrendIndex,
) -> Vec<TrainingExample> {
    rows.iter()
        .filter_map(|row| {
            let features = feature_set.encode(
                row.lag_1,
                row.lag_2,
                trends.as_of(&row.entity_id, row.week_start),
            )?;
            Some(TrainingExample {
                entity_id: row.entity_id.clone(),
                week_start: row.week_start,
                features,
                label: row.label,
            })
        })
        .collect()
}
