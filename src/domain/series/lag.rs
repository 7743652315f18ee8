//! Lag and forward-shift feature derivation

use std::str::FromStr;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::domain::DomainError;

use super::record::{FeatureRow, TrendBucket, TrendFeatureRow, WeeklyBucket};

/// What to do when an entity's weekly series skips one or more weeks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GapPolicy {
    /// Log each gap and keep computing lags positionally
    #[default]
    Warn,
    /// Fail the build with a validation error
    Reject,
}

impl FromStr for GapPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "reject" => Ok(Self::Reject),
            _ => Err(DomainError::configuration(format!(
                "Unknown gap policy: {}. Valid policies: warn, reject",
                s
            ))),
        }
    }
}

/// Builds lag/label rows from weekly buckets
#[derive(Debug, Clone, Copy, Default)]
pub struct LagFeatureBuilder {
    gap_policy: GapPolicy,
}

impl LagFeatureBuilder {
    pub fn new(gap_policy: GapPolicy) -> Self {
        Self { gap_policy }
    }

    /// Derives one row per interior bucket of every entity's series.
    ///
    /// The first and last bucket of each series have no previous or next
    /// value and are dropped. Rows come back ordered by `(week_start, entity_id)`.
    pub fn build(&self, buckets: &[WeeklyBucket]) -> Result<Vec<FeatureRow>, DomainError> {
        let mut sorted: Vec<&WeeklyBucket> = buckets.iter().collect();
        sorted.sort_by(|a, b| {
            a.entity_id
                .cmp(&b.entity_id)
                .then(a.week_start.cmp(&b.week_start))
        });

        let mut rows = Vec::with_capacity(buckets.len());
        let mut entities = 0usize;

        for series in sorted.chunk_by(|a, b| a.entity_id == b.entity_id) {
            entities += 1;
            let weeks: Vec<NaiveDate> = series.iter().map(|b| b.week_start).collect();
            self.check_series(&series[0].entity_id, &weeks)?;

            for window in series.windows(3) {
                let (previous, current, next) = (window[0], window[1], window[2]);
                rows.push(FeatureRow {
                    entity_id: current.entity_id.clone(),
                    week_start: current.week_start,
                    lag_1: current.value,
                    lag_2: previous.value,
                    label: next.value,
                });
            }
        }

        if entities == 1 && rows.is_empty() {
            return Err(DomainError::empty_series(format!(
                "entity '{}' has {} weekly bucket(s); at least 3 are needed",
                buckets[0].entity_id,
                buckets.len()
            )));
        }

        rows.sort_by(|a, b| {
            a.week_start
                .cmp(&b.week_start)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });

        debug!(
            buckets = buckets.len(),
            entities = entities,
            rows = rows.len(),
            "Built lag features"
        );

        Ok(rows)
    }

    /// Lag-only mode for the search metrics: one row per bucket that has a
    /// previous bucket, with no label.
    ///
    /// The first bucket of each entity is dropped, as is any row where one of
    /// the six lags is absent. Gap and duplicate handling match [`Self::build`].
    pub fn build_trends(&self, buckets: &[TrendBucket]) -> Result<Vec<TrendFeatureRow>, DomainError> {
        let mut sorted: Vec<&TrendBucket> = buckets.iter().collect();
        sorted.sort_by(|a, b| {
            a.entity_id
                .cmp(&b.entity_id)
                .then(a.week_start.cmp(&b.week_start))
        });

        let mut rows = Vec::with_capacity(buckets.len());
        let mut incomplete = 0usize;

        for series in sorted.chunk_by(|a, b| a.entity_id == b.entity_id) {
            let weeks: Vec<NaiveDate> = series.iter().map(|b| b.week_start).collect();
            self.check_series(&series[0].entity_id, &weeks)?;

            for window in series.windows(2) {
                let (previous, current) = (window[0], window[1]);
                let lags = (
                    current.interest,
                    previous.interest,
                    current.intent,
                    previous.intent,
                    current.safety,
                    previous.safety,
                );

                match lags {
                    (Some(i1), Some(i2), Some(n1), Some(n2), Some(s1), Some(s2)) => {
                        rows.push(TrendFeatureRow {
                            entity_id: current.entity_id.clone(),
                            week_start: current.week_start,
                            lag_1_interest: i1,
                            lag_2_interest: i2,
                            lag_1_intent: n1,
                            lag_2_intent: n2,
                            lag_1_safety: s1,
                            lag_2_safety: s2,
                        });
                    }
                    _ => incomplete += 1,
                }
            }
        }

        rows.sort_by(|a, b| {
            a.week_start
                .cmp(&b.week_start)
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });

        debug!(
            buckets = buckets.len(),
            rows = rows.len(),
            incomplete = incomplete,
            "Built search trend lag features"
        );

        Ok(rows)
    }

    fn check_series(&self, entity_id: &str, weeks: &[NaiveDate]) -> Result<(), DomainError> {
        for pair in weeks.windows(2) {
            let days = (pair[1] - pair[0]).num_days();

            if days == 0 {
                return Err(DomainError::validation(format!(
                    "entity '{}' has more than one bucket for week {}",
                    entity_id, pair[0]
                )));
            }

            if days != 7 {
                match self.gap_policy {
                    GapPolicy::Warn => warn!(
                        entity_id = %entity_id,
                        from = %pair[0],
                        to = %pair[1],
                        days = days,
                        "Gap in weekly series; lags are positional across it"
                    ),
                    GapPolicy::Reject => {
                        return Err(DomainError::validation(format!(
                            "entity '{}' skips from {} to {}",
                            entity_id, pair[0], pair[1]
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week(n: u32) -> NaiveDate {
        // Mondays starting 2021-01-04
        NaiveDate::from_ymd_opt(2021, 1, 4).unwrap() + chrono::Days::new(u64::from(n - 1) * 7)
    }

    fn series(entity: &str, values: &[f64]) -> Vec<WeeklyBucket> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| WeeklyBucket::new(entity, week(i as u32 + 1), *v))
            .collect()
    }

    #[test]
    fn test_build_ca_scenario() {
        let buckets = series("CA", &[10.0, 12.0, 9.0, 15.0]);

        let rows = LagFeatureBuilder::default().build(&buckets).unwrap();

        assert_eq!(
            rows,
            vec![
                FeatureRow {
                    entity_id: "CA".into(),
                    week_start: week(2),
                    lag_1: 12.0,
                    lag_2: 10.0,
                    label: 9.0,
                },
                FeatureRow {
                    entity_id: "CA".into(),
                    week_start: week(3),
                    lag_1: 9.0,
                    lag_2: 12.0,
                    label: 15.0,
                },
            ]
        );
    }

    #[test]
    fn test_build_sorts_unordered_input() {
        let mut buckets = series("CA", &[10.0, 12.0, 9.0, 15.0]);
        buckets.reverse();

        let rows = LagFeatureBuilder::default().build(&buckets).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].week_start, week(2));
        assert_eq!(rows[0].lag_2, 10.0);
    }

    #[test]
    fn test_build_drops_boundaries_per_entity() {
        let mut buckets = series("NY", &[1.0, 2.0, 3.0, 4.0, 5.0]);
        buckets.extend(series("CA", &[10.0, 20.0, 30.0]));

        let rows = LagFeatureBuilder::default().build(&buckets).unwrap();

        assert_eq!(rows.len(), 4);
        for entity in ["CA", "NY"] {
            let weeks: Vec<NaiveDate> = rows
                .iter()
                .filter(|r| r.entity_id == entity)
                .map(|r| r.week_start)
                .collect();
            let all: Vec<NaiveDate> = buckets
                .iter()
                .filter(|b| b.entity_id == entity)
                .map(|b| b.week_start)
                .collect();
            assert!(!weeks.contains(all.first().unwrap()));
            assert!(!weeks.contains(all.last().unwrap()));
        }
    }

    #[test]
    fn test_build_orders_by_week_then_entity() {
        let mut buckets = series("NY", &[1.0, 2.0, 3.0, 4.0]);
        buckets.extend(series("CA", &[10.0, 20.0, 30.0, 40.0]));

        let rows = LagFeatureBuilder::default().build(&buckets).unwrap();

        let keys: Vec<(NaiveDate, &str)> = rows
            .iter()
            .map(|r| (r.week_start, r.entity_id.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![(week(2), "CA"), (week(2), "NY"), (week(3), "CA"), (week(3), "NY")]
        );
    }

    #[test]
    fn test_build_lag_and_label_identities() {
        let values = [5.0, 8.0, 13.0, 21.0, 34.0, 55.0];
        let rows = LagFeatureBuilder::default()
            .build(&series("WA", &values))
            .unwrap();

        for (offset, row) in rows.iter().enumerate() {
            let i = offset + 1;
            assert_eq!(row.lag_1, values[i]);
            assert_eq!(row.lag_2, values[i - 1]);
            assert_eq!(row.label, values[i + 1]);
        }
    }

    #[test]
    fn test_build_single_short_entity_is_empty_series() {
        let result = LagFeatureBuilder::default().build(&series("CA", &[1.0, 2.0]));
        assert!(matches!(result, Err(DomainError::EmptySeries { .. })));
    }

    #[test]
    fn test_build_short_entity_among_others_is_dropped() {
        let mut buckets = series("CA", &[1.0, 2.0]);
        buckets.extend(series("NY", &[1.0, 2.0, 3.0]));

        let rows = LagFeatureBuilder::default().build(&buckets).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_id, "NY");
    }

    #[test]
    fn test_build_empty_input() {
        let rows = LagFeatureBuilder::default().build(&[]).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_build_gap_warns_and_stays_positional() {
        let buckets = vec![
            WeeklyBucket::new("CA", week(1), 1.0),
            WeeklyBucket::new("CA", week(2), 2.0),
            WeeklyBucket::new("CA", week(4), 4.0),
        ];

        let rows = LagFeatureBuilder::new(GapPolicy::Warn).build(&buckets).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].label, 4.0);
    }

    #[test]
    fn test_build_gap_rejected() {
        let buckets = vec![
            WeeklyBucket::new("CA", week(1), 1.0),
            WeeklyBucket::new("CA", week(3), 2.0),
            WeeklyBucket::new("CA", week(4), 4.0),
        ];

        let result = LagFeatureBuilder::new(GapPolicy::Reject).build(&buckets);
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_build_duplicate_week_rejected() {
        let buckets = vec![
            WeeklyBucket::new("CA", week(1), 1.0),
            WeeklyBucket::new("CA", week(1), 2.0),
            WeeklyBucket::new("CA", week(2), 4.0),
        ];

        let result = LagFeatureBuilder::default().build(&buckets);
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }

    #[test]
    fn test_gap_policy_from_str() {
        assert_eq!("warn".parse::<GapPolicy>().unwrap(), GapPolicy::Warn);
        assert_eq!("REJECT".parse::<GapPolicy>().unwrap(), GapPolicy::Reject);
        assert!("fill".parse::<GapPolicy>().is_err());
    }

    fn trend_bucket(entity: &str, n: u32, interest: Option<f64>) -> TrendBucket {
        let v = f64::from(n);
        TrendBucket {
            entity_id: entity.to_string(),
            week_start: week(n),
            interest,
            intent: Some(v * 10.0),
            safety: Some(v * 100.0),
        }
    }

    #[test]
    fn test_build_trends_lags_without_label() {
        let buckets = vec![
            trend_bucket("CA", 1, Some(1.0)),
            trend_bucket("CA", 2, Some(2.0)),
            trend_bucket("CA", 3, Some(3.0)),
        ];

        let rows = LagFeatureBuilder::default().build_trends(&buckets).unwrap();

        assert_eq!(
            rows,
            vec![
                TrendFeatureRow {
                    entity_id: "CA".into(),
                    week_start: week(2),
                    lag_1_interest: 2.0,
                    lag_2_interest: 1.0,
                    lag_1_intent: 20.0,
                    lag_2_intent: 10.0,
                    lag_1_safety: 200.0,
                    lag_2_safety: 100.0,
                },
                TrendFeatureRow {
                    entity_id: "CA".into(),
                    week_start: week(3),
                    lag_1_interest: 3.0,
                    lag_2_interest: 2.0,
                    lag_1_intent: 30.0,
                    lag_2_intent: 20.0,
                    lag_1_safety: 300.0,
                    lag_2_safety: 200.0,
                },
            ]
        );
    }

    #[test]
    fn test_build_trends_drops_rows_with_absent_lag() {
        let buckets = vec![
            trend_bucket("NY", 1, Some(1.0)),
            trend_bucket("NY", 2, None),
            trend_bucket("NY", 3, Some(3.0)),
            trend_bucket("NY", 4, Some(4.0)),
            trend_bucket("CA", 3, Some(1.0)),
            trend_bucket("CA", 4, Some(2.0)),
        ];

        let rows = LagFeatureBuilder::default().build_trends(&buckets).unwrap();

        let keys: Vec<(NaiveDate, &str)> = rows
            .iter()
            .map(|r| (r.week_start, r.entity_id.as_str()))
            .collect();
        assert_eq!(keys, vec![(week(4), "CA"), (week(4), "NY")]);
    }

    #[test]
    fn test_build_trends_single_bucket_yields_nothing() {
        let rows = LagFeatureBuilder::default()
            .build_trends(&[trend_bucket("CA", 1, Some(1.0))])
            .unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_build_trends_gap_rejected() {
        let buckets = vec![
            trend_bucket("CA", 1, Some(1.0)),
            trend_bucket("CA", 3, Some(2.0)),
        ];

        let result = LagFeatureBuilder::new(GapPolicy::Reject).build_trends(&buckets);
        assert!(matches!(result, Err(DomainError::Validation { .. })));
    }
}
