mod app_config;

pub use app_config::{
    AppConfig, LogFormat, LoggingConfig, ModelStoreSettings, PipelineConfig, RedisSettings,
    S3Settings, TrainingConfig, TrendSettings,
};
