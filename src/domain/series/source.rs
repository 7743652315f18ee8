//! Raw series source trait and record filtering

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::DomainError;

use super::record::{RawRecord, TrendRecord};

#[cfg(test)]
use mockall::automock;

/// Supplies raw records for one metric
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RawSeriesSource: Send + Sync {
    /// Reads every available record
    async fn fetch(&self) -> Result<Vec<RawRecord>, DomainError>;

    /// Human-readable origin for logs
    fn describe(&self) -> String;
}

/// Supplies raw search-interest records
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RawTrendSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<TrendRecord>, DomainError>;

    fn describe(&self) -> String;
}

/// Drops records that should never reach aggregation
#[derive(Debug, Clone, Default)]
pub struct RawSeriesFilter {
    excluded_entities: HashSet<String>,
    min_date: Option<NaiveDate>,
}

impl RawSeriesFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Excludes an aggregate or non-entity row label (e.g. a national total)
    pub fn exclude_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.excluded_entities.insert(entity_id.into());
        self
    }

    pub fn with_excluded_entities<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_entities
            .extend(entities.into_iter().map(Into::into));
        self
    }

    /// Keeps only records on or after `date`
    pub fn with_min_date(mut self, date: NaiveDate) -> Self {
        self.min_date = Some(date);
        self
    }

    /// Records without a timestamp pass through so the aggregator can reject them.
    pub fn accepts(&self, record: &RawRecord) -> bool {
        self.keeps(&record.entity_id, record.timestamp)
    }

    pub fn apply(&self, records: Vec<RawRecord>) -> Vec<RawRecord> {
        records.into_iter().filter(|r| self.accepts(r)).collect()
    }

    pub fn apply_trends(&self, records: Vec<TrendRecord>) -> Vec<TrendRecord> {
        records
            .into_iter()
            .filter(|r| self.keeps(&r.entity_id, r.timestamp))
            .collect()
    }

    fn keeps(&self, entity_id: &str, timestamp: Option<DateTime<Utc>>) -> bool {
        if self.excluded_entities.contains(entity_id) {
            return false;
        }

        match (self.min_date, timestamp) {
            (Some(min), Some(ts)) => ts.date_naive() >= min,
            _ => true,
        }
    }
}
