//! Raw, weekly and feature records

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One raw observation of a metric for an entity
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub entity_id: String,
    /// Missing timestamps are kept so the aggregator can reject them explicitly
    pub timestamp: Option<DateTime<Utc>>,
    pub value: f64,
}

impl RawRecord {
    pub fn new(entity_id: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp: Some(timestamp),
            value,
        }
    }

    /// A record whose source row had no usable timestamp
    pub fn without_timestamp(entity_id: impl Into<String>, value: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp: None,
            value,
        }
    }
}

/// Sum of an entity's raw values over one anchored 7-day window
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyBucket {
    pub entity_id: String,
    pub week_start: NaiveDate,
    pub value: f64,
}

impl WeeklyBucket {
    pub fn new(entity_id: impl Into<String>, week_start: NaiveDate, value: f64) -> Self {
        Self {
            entity_id: entity_id.into(),
            week_start,
            value,
        }
    }
}

/// Lagged inputs and forward-shifted label for one entity-week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub entity_id: String,
    pub week_start: NaiveDate,
    /// Value of the current week
    pub lag_1: f64,
    /// Value of the previous week
    pub lag_2: f64,
    /// Value of the following week
    pub label: f64,
}

/// One raw search-interest observation; any of the three metrics may be absent
#[derive(Debug, Clone, PartialEq)]
pub struct TrendRecord {
    pub entity_id: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub interest: Option<f64>,
    pub intent: Option<f64>,
    pub safety: Option<f64>,
}

impl TrendRecord {
    pub fn new(
        entity_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        interest: f64,
        intent: f64,
        safety: f64,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            timestamp: Some(timestamp),
            interest: Some(interest),
            intent: Some(intent),
            safety: Some(safety),
        }
    }
}

/// Mean of each search metric over one anchored week.
///
/// A metric with no observations in the week stays `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendBucket {
    pub entity_id: String,
    pub week_start: NaiveDate,
    pub interest: Option<f64>,
    pub intent: Option<f64>,
    pub safety: Option<f64>,
}

/// Current and previous week of every search metric for one entity-week.
/// Carries no label: these rows only join onto count features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendFeatureRow {
    pub entity_id: String,
    pub week_start: NaiveDate,
    pub lag_1_interest: f64,
    pub lag_2_interest: f64,
    pub lag_1_intent: f64,
    pub lag_2_intent: f64,
    pub lag_1_safety: f64,
    pub lag_2_safety: f64,
}
