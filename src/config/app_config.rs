use chrono::{NaiveDate, Weekday};
use serde::Deserialize;

use crate::domain::model_store::VersionAssignment;
use crate::domain::series::{GapPolicy, RawSeriesFilter};
use crate::domain::DomainError;
use crate::infrastructure::blob::S3BlobConfig;
use crate::infrastructure::keyed_collection::RedisCollectionConfig;
use crate::infrastructure::model_store::{BlobLayout, ModelStoreConfig, ModelStoreType};
use crate::infrastructure::series::{RawColumns, TrendColumns};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub pipeline: PipelineConfig,
    pub model_store: ModelStoreSettings,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

/// Raw series source and feature table settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Local CSV path or `http(s)://` URL
    pub source: String,
    pub timestamp_column: String,
    pub entity_column: String,
    pub value_column: String,
    pub excluded_entities: Vec<String>,
    pub min_date: Option<NaiveDate>,
    /// First day of each weekly bucket
    pub week_anchor: String,
    pub gap_policy: String,
    pub feature_table: String,
    pub trends: TrendSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let columns = RawColumns::default();
        Self {
            source: "https://raw.githubusercontent.com/owid/covid-19-data/master/public/data/vaccinations/us_state_vaccinations.csv".to_string(),
            timestamp_column: columns.timestamp,
            entity_column: columns.entity_id,
            value_column: columns.value,
            excluded_entities: vec!["United States".to_string(), "Long Term Care".to_string()],
            min_date: NaiveDate::from_ymd_opt(2021, 1, 1),
            week_anchor: "mon".to_string(),
            gap_policy: "warn".to_string(),
            feature_table: "data/weekly_vaccinations.csv".to_string(),
            trends: TrendSettings::default(),
        }
    }
}

/// Search trend source and trend feature table settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrendSettings {
    /// Local CSV path; unset skips the trend pipeline
    pub source: Option<String>,
    pub timestamp_column: String,
    pub entity_column: String,
    pub interest_column: String,
    pub intent_column: String,
    pub safety_column: String,
    pub feature_table: String,
}

impl Default for TrendSettings {
    fn default() -> Self {
        let columns = TrendColumns::default();
        Self {
            source: None,
            timestamp_column: columns.timestamp,
            entity_column: columns.entity_id,
            interest_column: columns.interest,
            intent_column: columns.intent,
            safety_column: columns.safety,
            feature_table: "data/weekly_search_trends.csv".to_string(),
        }
    }
}

impl TrendSettings {
    pub fn columns(&self) -> TrendColumns {
        TrendColumns {
            timestamp: self.timestamp_column.clone(),
            entity_id: self.entity_column.clone(),
            interest: self.interest_column.clone(),
            intent: self.intent_column.clone(),
            safety: self.safety_column.clone(),
        }
    }
}

impl PipelineConfig {
    pub fn columns(&self) -> RawColumns {
        RawColumns::new(
            &self.timestamp_column,
            &self.entity_column,
            &self.value_column,
        )
    }

    pub fn filter(&self) -> RawSeriesFilter {
        let filter = RawSeriesFilter::new().with_excluded_entities(self.excluded_entities.iter().cloned());
        match self.min_date {
            Some(date) => filter.with_min_date(date),
            None => filter,
        }
    }

    pub fn anchor(&self) -> Result<Weekday, DomainError> {
        self.week_anchor.parse::<Weekday>().map_err(|_| {
            DomainError::configuration(format!("Unknown week anchor: {}", self.week_anchor))
        })
    }

    pub fn gap_policy(&self) -> Result<GapPolicy, DomainError> {
        self.gap_policy.parse()
    }

    pub fn is_remote_source(&self) -> bool {
        self.source.starts_with("http://") || self.source.starts_with("https://")
    }
}

/// Model store backend selection and connection settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelStoreSettings {
    /// `redis`, `s3`, `in_memory_keyed` or `in_memory_blob`
    pub backend: String,
    pub model_name: String,
    /// `conditional` or `single_writer`
    pub assignment: String,
    pub redis: RedisSettings,
    pub s3: S3Settings,
}

impl Default for ModelStoreSettings {
    fn default() -> Self {
        Self {
            backend: "redis".to_string(),
            model_name: "predict-vaccine-counts".to_string(),
            assignment: "conditional".to_string(),
            redis: RedisSettings::default(),
            s3: S3Settings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    /// `host:port`; takes precedence over `host` and `port` when set
    pub connection_string: Option<String>,
    pub host: String,
    pub port: u16,
    pub password: String,
    pub db: i64,
    pub key_prefix: String,
}

impl Default for RedisSettings {
    fn default() -> Self {
        let defaults = RedisCollectionConfig::default();
        Self {
            connection_string: None,
            host: defaults.host,
            port: defaults.port,
            password: defaults.password,
            db: defaults.db,
            key_prefix: "model".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct S3Settings {
    pub bucket: String,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub repo_root: String,
    pub artifact_filename: String,
    pub config_filename: String,
}

impl Default for S3Settings {
    fn default() -> Self {
        let layout = BlobLayout::default();
        Self {
            bucket: "gcp-feast-demo".to_string(),
            region: None,
            endpoint_url: None,
            repo_root: layout.repo_root,
            artifact_filename: "model.json".to_string(),
            config_filename: layout.config_filename,
        }
    }
}

impl S3Settings {
    fn layout(&self) -> BlobLayout {
        BlobLayout::new(&self.repo_root, &self.artifact_filename)
            .with_config_filename(&self.config_filename)
    }
}

impl ModelStoreSettings {
    pub fn assignment(&self) -> Result<VersionAssignment, DomainError> {
        self.assignment.parse()
    }

    /// Resolves the configured backend into a factory configuration
    pub fn store_config(&self) -> Result<ModelStoreConfig, DomainError> {
        let config = match self.backend.parse::<ModelStoreType>()? {
            ModelStoreType::Redis => {
                let mut connection = match &self.redis.connection_string {
                    Some(address) => RedisCollectionConfig::from_connection_string(address)?,
                    None => RedisCollectionConfig::new(&self.redis.host, self.redis.port),
                }
                .with_db(self.redis.db);
                if !self.redis.password.is_empty() {
                    connection = connection.with_password(&self.redis.password);
                }
                ModelStoreConfig::Redis {
                    connection,
                    key_prefix: self.redis.key_prefix.clone(),
                }
            }
            ModelStoreType::S3 => {
                let mut bucket = S3BlobConfig::new(&self.s3.bucket);
                if let Some(region) = &self.s3.region {
                    bucket = bucket.with_region(region);
                }
                if let Some(url) = &self.s3.endpoint_url {
                    bucket = bucket.with_endpoint_url(url);
                }
                ModelStoreConfig::S3 {
                    bucket,
                    layout: self.s3.layout(),
                }
            }
            ModelStoreType::InMemoryKeyed => ModelStoreConfig::InMemoryKeyed,
            ModelStoreType::InMemoryBlob => ModelStoreConfig::InMemoryBlob {
                layout: self.s3.layout(),
            },
        };

        Ok(config)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub holdout_weeks: u32,
    /// Join the search trend table into the training rows
    pub use_search_trends: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            holdout_weeks: 4,
            use_search_trends: false,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
