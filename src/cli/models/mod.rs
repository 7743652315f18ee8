//! Model store commands - versions, fetch, publish, init-repo

use std::path::PathBuf;

use clap::Args;

use crate::config::AppConfig;
use crate::domain::model_store::{ModelArtifact, VersionStore};
use crate::infrastructure::model_store::{BlobPrefixBackend, ModelStoreFactory};

#[derive(Args, Clone)]
pub struct FetchArgs {
    /// Version to fetch (defaults to latest)
    #[arg(long)]
    pub version: Option<u32>,

    /// Destination file
    #[arg(long, short)]
    pub output: PathBuf,
}

#[derive(Args, Clone)]
pub struct PublishArgs {
    /// Artifact file to upload
    pub artifact: PathBuf,

    /// Explicit version number (blob backends only); must be the next free version
    #[arg(long)]
    pub version: Option<u32>,
}

#[derive(Args, Clone)]
pub struct InitRepoArgs {
    /// Repository config to upload (defaults to a minimal config naming the model)
    #[arg(long)]
    pub config_file: Option<PathBuf>,
}

pub async fn versions(config: &AppConfig) -> anyhow::Result<()> {
    let store = super::open_store(config).await?;

    let versions = store.fetch_all().await?;
    if versions.is_empty() {
        println!("model '{}' has no stored versions", store.model_name());
        return Ok(());
    }

    for v in versions {
        println!("{}\t{} bytes\t{}", v.version, v.artifact.len(), v.artifact.checksum());
    }

    Ok(())
}

pub async fn fetch(config: &AppConfig, args: FetchArgs) -> anyhow::Result<()> {
    let store = super::open_store(config).await?;

    let (version, artifact) = match args.version {
        Some(v) => (Some(v), store.fetch_version(v).await?),
        None => match store.latest_version().await? {
            Some(v) => (Some(v), store.fetch_version(v).await?),
            None => (None, None),
        },
    };

    let (Some(version), Some(artifact)) = (version, artifact) else {
        anyhow::bail!("model '{}' has no such version", store.model_name());
    };

    tokio::fs::write(&args.output, artifact.as_bytes()).await?;
    println!(
        "wrote {} version {} ({} bytes) to {}",
        store.model_name(),
        version,
        artifact.len(),
        args.output.display()
    );

    Ok(())
}

pub async fn publish(config: &AppConfig, args: PublishArgs) -> anyhow::Result<()> {
    let artifact = ModelArtifact::from(tokio::fs::read(&args.artifact).await?);

    let version = match args.version {
        Some(v) => blob_backend(config).await?.save_version_as(v, artifact).await?,
        None => super::open_store(config).await?.save_version(artifact).await?,
    };

    println!("saved {} version {}", config.model_store.model_name, version);
    Ok(())
}

pub async fn init_repo(config: &AppConfig, args: InitRepoArgs) -> anyhow::Result<()> {
    let backend = blob_backend(config).await?;

    let text = match args.config_file {
        Some(path) => tokio::fs::read_to_string(path).await?,
        None => format!("name: \"{}\"\n", config.model_store.model_name),
    };

    if backend.ensure_repository(&text).await? {
        println!("created {}", backend.config_path());
    } else {
        println!("{} already exists", backend.config_path());
    }

    Ok(())
}

async fn blob_backend(config: &AppConfig) -> anyhow::Result<BlobPrefixBackend> {
    let settings = &config.model_store;
    let backend = ModelStoreFactory::create_blob_backend(
        &settings.store_config()?,
        &settings.model_name,
        settings.assignment()?,
    )
    .await?;

    Ok(backend)
}
