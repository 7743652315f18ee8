//! Features command - raw series and search trends to weekly lag feature tables

use std::sync::Arc;

use clap::Args;

use crate::config::AppConfig;
use crate::domain::series::{LagFeatureBuilder, RawSeriesSource, WeeklyAggregator};
use crate::infrastructure::series::{
    CsvFeatureTable, CsvRawSource, CsvTrendSource, CsvTrendTable, HttpRawSource,
};
use crate::infrastructure::services::{FeaturePipeline, TrendPipeline};

#[derive(Args, Clone)]
pub struct FeaturesArgs {
    /// Raw CSV path or URL (overrides config)
    #[arg(long)]
    pub source: Option<String>,

    /// Feature table path (overrides config)
    #[arg(long)]
    pub output: Option<String>,

    /// Search trend CSV path (overrides config); enables the trend table
    #[arg(long)]
    pub trends_source: Option<String>,
}

pub async fn run(config: &AppConfig, args: FeaturesArgs) -> anyhow::Result<()> {
    let mut pipeline_config = config.pipeline.clone();
    if let Some(source) = args.source {
        pipeline_config.source = source;
    }
    if let Some(output) = args.output {
        pipeline_config.feature_table = output;
    }
    if let Some(trends) = args.trends_source {
        pipeline_config.trends.source = Some(trends);
    }

    let source: Arc<dyn RawSeriesSource> = if pipeline_config.is_remote_source() {
        Arc::new(HttpRawSource::new(&pipeline_config.source).with_columns(pipeline_config.columns()))
    } else {
        Arc::new(CsvRawSource::new(&pipeline_config.source).with_columns(pipeline_config.columns()))
    };
    let sink = Arc::new(CsvFeatureTable::new(&pipeline_config.feature_table));

    let pipeline = FeaturePipeline::new(source, sink)
        .with_filter(pipeline_config.filter())
        .with_aggregator(WeeklyAggregator::new(pipeline_config.anchor()?))
        .with_builder(LagFeatureBuilder::new(pipeline_config.gap_policy()?));

    let report = pipeline.run().await?;

    println!(
        "wrote {} feature rows for {} entities to {}",
        report.feature_rows, report.entities, pipeline_config.feature_table
    );

    if let Some(trend_source) = &pipeline_config.trends.source {
        let trends = &pipeline_config.trends;
        let pipeline = TrendPipeline::new(
            Arc::new(CsvTrendSource::new(trend_source).with_columns(trends.columns())),
            Arc::new(CsvTrendTable::new(&trends.feature_table)),
        )
        .with_filter(pipeline_config.filter())
        .with_aggregator(WeeklyAggregator::new(pipeline_config.anchor()?))
        .with_builder(LagFeatureBuilder::new(pipeline_config.gap_policy()?));

        let report = pipeline.run().await?;

        println!(
            "wrote {} trend rows for {} entities to {}",
            report.feature_rows, report.entities, trends.feature_table
        );
    }

    Ok(())
}
