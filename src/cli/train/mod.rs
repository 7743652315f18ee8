//! Train command - fit, score and publish a model version

use std::sync::Arc;

use clap::Args;

use crate::config::AppConfig;
use crate::infrastructure::series::{CsvFeatureTable, CsvTrendTable};
use crate::infrastructure::services::TrainingService;

#[derive(Args, Clone)]
pub struct TrainArgs {
    /// Feature table path (overrides config)
    #[arg(long)]
    pub features: Option<String>,

    /// Weeks held out for scoring (overrides config)
    #[arg(long)]
    pub holdout_weeks: Option<u32>,

    /// Join the search trend table into the training rows
    #[arg(long)]
    pub with_trends: bool,
}

pub async fn run(config: &AppConfig, args: TrainArgs) -> anyhow::Result<()> {
    let path = args
        .features
        .unwrap_or_else(|| config.pipeline.feature_table.clone());
    let store = super::open_store(config).await?;

    let mut service = TrainingService::new(Arc::new(CsvFeatureTable::new(&path)), store)
        .with_holdout_weeks(args.holdout_weeks.unwrap_or(config.training.holdout_weeks));
    if args.with_trends || config.training.use_search_trends {
        service = service.with_trends(Arc::new(CsvTrendTable::new(
            &config.pipeline.trends.feature_table,
        )));
    }

    let report = match service.train().await {
        Ok(report) => report,
        Err(e) if e.is_version_conflict() => {
            anyhow::bail!("{}; another writer saved first, rerun to publish the next version", e)
        }
        Err(e) => return Err(e.into()),
    };

    if report.unmatched_rows > 0 {
        println!("{} rows had no search trends and were left out", report.unmatched_rows);
    }
    match report.mae {
        Some(mae) => println!(
            "saved {} version {} (train rows {}, holdout rows {}, MAE {:.3})",
            report.model_name, report.version, report.train_rows, report.test_rows, mae
        ),
        None => println!(
            "saved {} version {} (train rows {}, empty holdout)",
            report.model_name, report.version, report.train_rows
        ),
    }

    Ok(())
}
