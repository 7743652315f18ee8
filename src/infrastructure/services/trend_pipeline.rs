//! Raw search trends to weekly trend feature table

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::series::{
    LagFeatureBuilder, RawSeriesFilter, RawTrendSource, TrendFeatureSink, WeeklyAggregator,
};
use crate::domain::DomainError;

use super::feature_pipeline::FeaturePipelineReport;

/// Source, filter, weekly means, two-week lags, sink.
///
/// Shares the anchor and filter of the count pipeline so both tables key on
/// the same `(entity_id, week_start)` pairs.
pub struct TrendPipeline {
    source: Arc<dyn RawTrendSource>,
    sink: Arc<dyn TrendFeatureSink>,
    filter: RawSeriesFilter,
    aggregator: WeeklyAggregator,
    builder: LagFeatureBuilder,
}

impl std::fmt::Debug for TrendPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrendPipeline")
            .field("source", &self.source.describe())
            .field("filter", &self.filter)
            .field("aggregator", &self.aggregator)
            .field("builder", &self.builder)
            .finish()
    }
}

impl TrendPipeline {
    pub fn new(source: Arc<dyn RawTrendSource>, sink: Arc<dyn TrendFeatureSink>) -> Self {
        Self {
            source,
            sink,
            filter: RawSeriesFilter::default(),
            aggregator: WeeklyAggregator::default(),
            builder: LagFeatureBuilder::default(),
        }
    }

    pub fn with_filter(mut self, filter: RawSeriesFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_aggregator(mut self, aggregator: WeeklyAggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn with_builder(mut self, builder: LagFeatureBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub async fn run(&self) -> Result<FeaturePipelineReport, DomainError> {
        let source = self.source.describe();
        info!(source = %source, "Starting search trend pipeline");

        let raw = self.source.fetch().await?;
        let raw_records = raw.len();

        let kept = self.filter.apply_trends(raw);
        let buckets = self.aggregator.average_trends(&kept)?;
        let rows = self.builder.build_trends(&buckets)?;

        let entities = rows
            .iter()
            .map(|r| r.entity_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        if rows.is_empty() {
            warn!(source = %source, buckets = buckets.len(), "Pipeline produced no trend rows");
        }

        self.sink.write(&rows).await?;

        let report = FeaturePipelineReport {
            source,
            raw_records,
            kept_records: kept.len(),
            buckets: buckets.len(),
            feature_rows: rows.len(),
            entities,
        };

        info!(
            raw_records = report.raw_records,
            kept_records = report.kept_records,
            buckets = report.buckets,
            feature_rows = report.feature_rows,
            entities = report.entities,
            "Search trend pipeline complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    use crate::domain::series::{
        MockRawTrendSource, MockTrendFeatureSink, TrendFeatureRow, TrendRecord,
    };

    fn record(entity: &str, day: u32, interest: f64, intent: f64, safety: f64) -> TrendRecord {
        TrendRecord::new(
            entity,
            Utc.with_ymd_and_hms(2021, 1, day, 0, 0, 0).unwrap(),
            interest,
            intent,
            safety,
        )
    }

    fn source_returning(records: Vec<TrendRecord>) -> MockRawTrendSource {
        let mut source = MockRawTrendSource::new();
        source
            .expect_describe()
            .returning(|| "mock://trends".to_string());
        source
            .expect_fetch()
            .times(1)
            .returning(move || Ok(records.clone()));
        source
    }

    #[tokio::test]
    async fn test_daily_trends_to_lag_table() {
        // Mondays: Jan 4, 11, 18
        let records = vec![
            record("CA", 4, 10.0, 1.0, 0.5),
            record("CA", 6, 20.0, 3.0, 0.5),
            record("CA", 11, 30.0, 4.0, 1.0),
            record("CA", 18, 40.0, 5.0, 2.0),
            record("TX", 4, 7.0, 7.0, 7.0),
        ];
        let expected = vec![
            TrendFeatureRow {
                entity_id: "CA".to_string(),
                week_start: NaiveDate::from_ymd_opt(2021, 1, 11).unwrap(),
                lag_1_interest: 30.0,
                lag_2_interest: 15.0,
                lag_1_intent: 4.0,
                lag_2_intent: 2.0,
                lag_1_safety: 1.0,
                lag_2_safety: 0.5,
            },
            TrendFeatureRow {
                entity_id: "CA".to_string(),
                week_start: NaiveDate::from_ymd_opt(2021, 1, 18).unwrap(),
                lag_1_interest: 40.0,
                lag_2_interest: 30.0,
                lag_1_intent: 5.0,
                lag_2_intent: 4.0,
                lag_1_safety: 2.0,
                lag_2_safety: 1.0,
            },
        ];

        let mut sink = MockTrendFeatureSink::new();
        sink.expect_write()
            .withf(move |rows: &[TrendFeatureRow]| rows == expected.as_slice())
            .times(1)
            .returning(|_| Ok(()));

        let report = TrendPipeline::new(Arc::new(source_returning(records)), Arc::new(sink))
            .run()
            .await
            .unwrap();

        assert_eq!(report.raw_records, 5);
        assert_eq!(report.buckets, 4);
        assert_eq!(report.feature_rows, 2);
        assert_eq!(report.entities, 1);
    }

    #[tokio::test]
    async fn test_filter_drops_excluded_entities() {
        let records = vec![
            record("United States", 4, 1.0, 1.0, 1.0),
            record("United States", 11, 1.0, 1.0, 1.0),
            record("United States", 18, 1.0, 1.0, 1.0),
        ];
        let mut sink = MockTrendFeatureSink::new();
        sink.expect_write()
            .withf(|rows: &[TrendFeatureRow]| rows.is_empty())
            .times(1)
            .returning(|_| Ok(()));

        let report = TrendPipeline::new(Arc::new(source_returning(records)), Arc::new(sink))
            .with_filter(RawSeriesFilter::new().exclude_entity("United States"))
            .run()
            .await
            .unwrap();

        assert_eq!(report.kept_records, 0);
        assert_eq!(report.feature_rows, 0);
    }

    #[tokio::test]
    async fn test_invalid_trend_record_skips_sink() {
        let mut bad = record("CA", 4, 1.0, 1.0, 1.0);
        bad.timestamp = None;
        let mut sink = MockTrendFeatureSink::new();
        sink.expect_write().never();

        let pipeline = TrendPipeline::new(Arc::new(source_returning(vec![bad])), Arc::new(sink));

        assert!(matches!(
            pipeline.run().await,
            Err(DomainError::Validation { .. })
        ));
    }
}
