//! Predict command - next-week forecast per entity

use std::sync::Arc;

use clap::Args;

use crate::config::AppConfig;
use crate::infrastructure::series::{CsvFeatureTable, CsvTrendTable};
use crate::infrastructure::services::PredictionService;

#[derive(Args, Clone)]
pub struct PredictArgs {
    /// Model version (defaults to latest)
    #[arg(long)]
    pub version: Option<u32>,

    /// Feature table path (overrides config)
    #[arg(long)]
    pub features: Option<String>,
}

pub async fn run(config: &AppConfig, args: PredictArgs) -> anyhow::Result<()> {
    let path = args
        .features
        .unwrap_or_else(|| config.pipeline.feature_table.clone());
    let store = super::open_store(config).await?;

    // only read when the chosen model was trained on search trends
    let trends = CsvTrendTable::new(&config.pipeline.trends.feature_table);
    let service = PredictionService::new(Arc::new(CsvFeatureTable::new(&path)), store)
        .with_trends(Arc::new(trends));

    let Some(report) = service.predict(args.version).await? else {
        anyhow::bail!(
            "model '{}' has no {}",
            config.model_store.model_name,
            args.version
                .map(|v| format!("version {}", v))
                .unwrap_or_else(|| "stored versions".to_string())
        );
    };

    println!("# {} version {}", report.model_name, report.version);
    for p in &report.predictions {
        println!("{}\t{}\t{:.2}", p.target_week, p.entity_id, p.value);
    }

    Ok(())
}
