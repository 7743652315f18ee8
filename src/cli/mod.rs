//! CLI module for the weekly forecast jobs
//!
//! - `features`: raw series to weekly lag feature table
//! - `train`: fit on the feature table and publish a model version
//! - `predict`: forecast next week from a stored version
//! - `versions`, `fetch`, `publish`, `init-repo`: model store maintenance

pub mod features;
pub mod models;
pub mod predict;
pub mod train;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::config::AppConfig;
use crate::domain::model_store::VersionStore;
use crate::infrastructure::logging;
use crate::infrastructure::model_store::ModelStoreFactory;

/// Weekly lag features, baseline forecaster and versioned model store
#[derive(Parser)]
#[command(name = "weekly-forecast")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Model name (overrides config)
    #[arg(long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Build the weekly lag feature table from the raw series
    Features(features::FeaturesArgs),

    /// Train on the feature table and save the next model version
    Train(train::TrainArgs),

    /// Predict next week's value per entity
    Predict(predict::PredictArgs),

    /// List stored model versions
    Versions,

    /// Write a stored model version to a file
    Fetch(models::FetchArgs),

    /// Save an artifact file as a new model version
    Publish(models::PublishArgs),

    /// Create the model repository config blob (blob backends only)
    InitRepo(models::InitRepoArgs),
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let mut config = load_config();
        if let Some(model) = self.model {
            config.model_store.model_name = model;
        }

        match self.command {
            Command::Features(args) => features::run(&config, args).await,
            Command::Train(args) => train::run(&config, args).await,
            Command::Predict(args) => predict::run(&config, args).await,
            Command::Versions => models::versions(&config).await,
            Command::Fetch(args) => models::fetch(&config, args).await,
            Command::Publish(args) => models::publish(&config, args).await,
            Command::InitRepo(args) => models::init_repo(&config, args).await,
        }
    }
}

fn load_config() -> AppConfig {
    dotenvy::dotenv().ok();

    let loaded = AppConfig::load();
    let config = loaded.as_ref().cloned().unwrap_or_default();
    logging::init_logging(&config.logging);

    if let Err(e) = loaded {
        warn!("Falling back to default configuration: {}", e);
    }

    config
}

async fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn VersionStore>> {
    let settings = &config.model_store;
    let store = ModelStoreFactory::create(
        &settings.store_config()?,
        &settings.model_name,
        settings.assignment()?,
    )
    .await?;

    Ok(store)
}
