//! S3 blob store implementation

use std::fmt::Debug;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;

use crate::domain::model_store::BlobStore;
use crate::domain::DomainError;

const BACKEND: &str = "s3";

/// Configuration for an S3 (or S3-compatible) bucket
#[derive(Debug, Clone)]
pub struct S3BlobConfig {
    pub bucket: String,
    /// AWS region; falls back to the default provider chain
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible services
    pub endpoint_url: Option<String>,
}

impl S3BlobConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: None,
            endpoint_url: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_endpoint_url(mut self, url: impl Into<String>) -> Self {
        self.endpoint_url = Some(url.into());
        self
    }
}

/// Blob store over one S3 bucket
pub struct S3BlobStore {
    config: S3BlobConfig,
    client: S3Client,
}

impl Debug for S3BlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3BlobStore")
            .field("config", &self.config)
            .finish()
    }
}

impl S3BlobStore {
    /// Creates a client from the default AWS configuration chain
    pub async fn new(config: S3BlobConfig) -> Result<Self, DomainError> {
        if config.bucket.trim().is_empty() {
            return Err(DomainError::configuration("S3 bucket name is empty"));
        }

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(url) = &config.endpoint_url {
            builder = builder.endpoint_url(url).force_path_style(true);
        }

        Ok(Self {
            client: S3Client::from_conf(builder.build()),
            config,
        })
    }

    fn error(action: &str, key: &str, err: impl std::error::Error) -> DomainError {
        DomainError::backend(
            BACKEND,
            format!("Failed to {} '{}': {}", action, key, DisplayErrorContext(err)),
        )
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, DomainError> {
        let result = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let data = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| Self::error("download", key, e))?;
                Ok(Some(data.into_bytes()))
            }
            Err(err) if err.as_service_error().is_some_and(|e| e.is_no_such_key()) => Ok(None),
            Err(err) => Err(Self::error("get", key, err)),
        }
    }

    async fn put(&self, key: &str, body: Bytes) -> Result<(), DomainError> {
        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| Self::error("upload", key, e))?;

        Ok(())
    }

    async fn put_if_absent(&self, key: &str, body: Bytes) -> Result<bool, DomainError> {
        let result = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key)
            .if_none_match("*")
            .body(ByteStream::from(body))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                // 412: object exists; 409: a concurrent conditional write is in flight
                let status = err.raw_response().map(|r| r.status().as_u16());
                if matches!(status, Some(412) | Some(409)) {
                    Ok(false)
                } else {
                    Err(Self::error("conditionally upload", key, err))
                }
            }
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, DomainError> {
        let result = self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(Self::error("stat", key, err)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, DomainError> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        let mut keys = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| Self::error("list", prefix, e))?;
            keys.extend(page.contents().iter().filter_map(|o| o.key().map(String::from)));
        }

        Ok(keys)
    }

    fn backend_name(&self) -> &'static str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = S3BlobConfig::new("gcp-feast-demo")
            .with_region("us-east-1")
            .with_endpoint_url("http://localhost:9000");

        assert_eq!(config.bucket, "gcp-feast-demo");
        assert_eq!(config.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.endpoint_url.as_deref(), Some("http://localhost:9000"));
    }

    #[tokio::test]
    async fn test_rejects_empty_bucket() {
        let result = S3BlobStore::new(S3BlobConfig::new(" ")).await;
        assert!(matches!(result, Err(DomainError::Configuration { .. })));
    }

    #[tokio::test]
    #[ignore = "Requires S3 credentials and a test bucket"]
    async fn test_s3_put_if_absent() {
        let bucket = std::env::var("TEST_S3_BUCKET").unwrap();
        let store = S3BlobStore::new(S3BlobConfig::new(bucket)).await.unwrap();
        let key = "weekly-forecast-test/put_if_absent";

        store.put(key, Bytes::from_static(b"a")).await.unwrap();
        assert!(!store
            .put_if_absent(key, Bytes::from_static(b"b"))
            .await
            .unwrap());
        assert_eq!(store.get(key).await.unwrap(), Some(Bytes::from_static(b"a")));
    }
}
