//! Weekly bucketing of raw records

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use tracing::debug;

use crate::domain::DomainError;

use super::record::{RawRecord, TrendBucket, TrendRecord, WeeklyBucket};

/// Returns the most recent `anchor` weekday at or before `date`
pub fn week_start_for(date: NaiveDate, anchor: Weekday) -> Option<NaiveDate> {
    let offset = (date.weekday().num_days_from_monday() + 7 - anchor.num_days_from_monday()) % 7;
    date.checked_sub_days(Days::new(u64::from(offset)))
}

/// Sums raw records into fixed-anchor weekly buckets per entity
#[derive(Debug, Clone, Copy)]
pub struct WeeklyAggregator {
    anchor: Weekday,
}

impl Default for WeeklyAggregator {
    fn default() -> Self {
        Self::new(Weekday::Mon)
    }
}

impl WeeklyAggregator {
    pub fn new(anchor: Weekday) -> Self {
        Self { anchor }
    }

    pub fn anchor(&self) -> Weekday {
        self.anchor
    }

    /// Groups records by entity and anchored week and sums their values.
    ///
    /// The whole call fails on the first malformed record; nothing is
    /// partially aggregated. Output order is not part of the contract.
    pub fn aggregate(&self, records: &[RawRecord]) -> Result<Vec<WeeklyBucket>, DomainError> {
        let mut sums: BTreeMap<(&str, NaiveDate), f64> = BTreeMap::new();

        for (index, record) in records.iter().enumerate() {
            let week_start = self.week_of(index, &record.entity_id, record.timestamp)?;
            check_finite(index, &record.entity_id, Some(record.value))?;

            *sums.entry((record.entity_id.as_str(), week_start)).or_insert(0.0) += record.value;
        }

        debug!(
            records = records.len(),
            buckets = sums.len(),
            anchor = %self.anchor,
            "Aggregated raw records into weekly buckets"
        );

        Ok(sums
            .into_iter()
            .map(|((entity_id, week_start), value)| WeeklyBucket::new(entity_id, week_start, value))
            .collect())
    }

    /// Averages each search metric per entity and anchored week.
    ///
    /// Absent metric values are skipped rather than counted as zero. Records
    /// are validated exactly like [`WeeklyAggregator::aggregate`] validates.
    pub fn average_trends(&self, records: &[TrendRecord]) -> Result<Vec<TrendBucket>, DomainError> {
        let mut means: BTreeMap<(&str, NaiveDate), [Mean; 3]> = BTreeMap::new();

        for (index, record) in records.iter().enumerate() {
            let week_start = self.week_of(index, &record.entity_id, record.timestamp)?;
            let values = [record.interest, record.intent, record.safety];
            for value in values {
                check_finite(index, &record.entity_id, value)?;
            }

            let bucket = means
                .entry((record.entity_id.as_str(), week_start))
                .or_default();
            for (mean, value) in bucket.iter_mut().zip(values) {
                mean.add(value);
            }
        }

        debug!(
            records = records.len(),
            buckets = means.len(),
            anchor = %self.anchor,
            "Averaged search trends into weekly buckets"
        );

        Ok(means
            .into_iter()
            .map(|((entity_id, week_start), [interest, intent, safety])| TrendBucket {
                entity_id: entity_id.to_string(),
                week_start,
                interest: interest.value(),
                intent: intent.value(),
                safety: safety.value(),
            })
            .collect())
    }

    fn week_of(
        &self,
        index: usize,
        entity_id: &str,
        timestamp: Option<DateTime<Utc>>,
    ) -> Result<NaiveDate, DomainError> {
        if entity_id.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "record {} has an empty entity id",
                index
            )));
        }

        let timestamp = timestamp.ok_or_else(|| {
            DomainError::validation(format!(
                "record {} for entity '{}' has no timestamp",
                index, entity_id
            ))
        })?;

        week_start_for(timestamp.date_naive(), self.anchor).ok_or_else(|| {
            DomainError::validation(format!(
                "record {} timestamp {} has no representable week start",
                index, timestamp
            ))
        })
    }
}

fn check_finite(index: usize, entity_id: &str, value: Option<f64>) -> Result<(), DomainError> {
    match value {
        Some(v) if !v.is_finite() => Err(DomainError::validation(format!(
            "record {} for entity '{}' has a non-finite value",
            index, entity_id
        ))),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    sum: f64,
    count: u32,
}

impl Mean {
    fn add(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn value(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }
}
