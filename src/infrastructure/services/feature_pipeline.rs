//! Raw series to weekly lag feature table

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::series::{
    FeatureSink, LagFeatureBuilder, RawSeriesFilter, RawSeriesSource, WeeklyAggregator,
};
use crate::domain::DomainError;

/// Counts from one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeaturePipelineReport {
    pub source: String,
    pub raw_records: usize,
    pub kept_records: usize,
    pub buckets: usize,
    pub feature_rows: usize,
    pub entities: usize,
}

/// Source, filter, weekly aggregation, lag derivation, sink
pub struct FeaturePipeline {
    source: Arc<dyn RawSeriesSource>,
    sink: Arc<dyn FeatureSink>,
    filter: RawSeriesFilter,
    aggregator: WeeklyAggregator,
    builder: LagFeatureBuilder,
}

impl std::fmt::Debug for FeaturePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeaturePipeline")
            .field("source", &self.source.describe())
            .field("filter", &self.filter)
            .field("aggregator", &self.aggregator)
            .field("builder", &self.builder)
            .finish()
    }
}

impl FeaturePipeline {
    pub fn new(source: Arc<dyn RawSeriesSource>, sink: Arc<dyn FeatureSink>) -> Self {
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

    /// Runs the whole pipeline once; the sink is only written if every stage succeeds
    pub async fn run(&self) -> Result<FeaturePipelineReport, DomainError> {
        let source = self.source.describe();
        info!(source = %source, "Starting feature pipeline");

        let raw = self.source.fetch().await?;
        let raw_records = raw.len();

        let kept = self.filter.apply(raw);
        let buckets = self.aggregator.aggregate(&kept)?;
        let rows = self.builder.build(&buckets)?;

        let entities = rows
            .iter()
            .map(|r| r.entity_id.as_str())
            .collect::<HashSet<_>>()
            .len();

        if rows.is_empty() {
            warn!(source = %source, buckets = buckets.len(), "Pipeline produced no feature rows");
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
            "Feature pipeline complete"
        );

        Ok(report)
    }
}
