//! Raw series downloaded over HTTP

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::domain::series::{RawRecord, RawSeriesSource};
use crate::domain::DomainError;

use super::csv_source::{parse_raw_csv, RawColumns};

const BACKEND: &str = "http";

/// Fetches a raw CSV export from a URL on every `fetch`
#[derive(Debug, Clone)]
pub struct HttpRawSource {
    url: String,
    columns: RawColumns,
    client: reqwest::Client,
}

impl HttpRawSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            columns: RawColumns::default(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(url: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            columns: RawColumns::default(),
            client,
        })
    }

    pub fn with_columns(mut self, columns: RawColumns) -> Self {
        self.columns = columns;
        self
    }
}

#[async_trait]
impl RawSeriesSource for HttpRawSource {
    async fn fetch(&self) -> Result<Vec<RawRecord>, DomainError> {
        info!(url = %self.url, "Downloading raw series");

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DomainError::backend(BACKEND, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::backend(
                BACKEND,
                format!("HTTP {}: {}", status, error_body),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| DomainError::backend(BACKEND, format!("Failed to read body: {}", e)))?;

        let records = parse_raw_csv(body.as_ref(), &self.columns)?;
        debug!(url = %self.url, records = records.len(), "Parsed raw series");

        Ok(records)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}
